//! Recursive separator text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! with adjacent chunks sharing up to `overlap` characters of context.
//!
//! # Algorithm
//!
//! 1. Pick the coarsest separator from [`SEPARATORS`] that occurs in the text
//!    (paragraph break, line break, sentence end, space, and finally the empty
//!    string, which cuts between characters).
//! 2. Split on it, keeping the separator attached to the end of each piece so
//!    no text is lost.
//! 3. Pieces that fit are merged greedily into windows of up to `chunk_size`
//!    characters. When a window is emitted, the trailing pieces totalling at
//!    most `overlap` characters are carried into the next window.
//! 4. Pieces that are still too large are split again with the next finer
//!    separator.
//!
//! Sizes are counted in chars, never bytes, so multi-byte text is never cut
//! inside a code point.
//!
//! # Example
//!
//! ```rust
//! use smartdoc_core::chunk::split_text;
//!
//! let pieces = split_text("First paragraph.\n\nSecond paragraph.", 20, 5);
//! assert_eq!(pieces, vec!["First paragraph.", "Second paragraph."]);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Chunk, Document, DocumentMetadata};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Separators in preference order, coarsest first.
pub const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Chunk every document, skipping documents with blank content.
///
/// Chunks inherit their parent's metadata unchanged and receive contiguous
/// `chunk_index` values starting at 0 within each parent.
pub fn chunk_documents(docs: &[Document], chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for doc in docs {
        if doc.is_blank() {
            warn!(
                source = %doc.metadata.source,
                kind = %doc.metadata.kind,
                "skipping document with empty content"
            );
            continue;
        }

        let pieces = split_text(&doc.content, chunk_size, overlap);
        debug!(
            source = %doc.metadata.source,
            chars = doc.content.chars().count(),
            chunks = pieces.len(),
            "chunked document"
        );

        chunks.extend(
            pieces
                .iter()
                .enumerate()
                .map(|(index, text)| make_chunk(&doc.metadata, index, text)),
        );
    }

    chunks
}

/// Split text into trimmed, non-empty windows of at most `chunk_size` chars.
///
/// `chunk_size` is clamped to at least 1 and `overlap` to below `chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);
    let mut out = Vec::new();
    split_recursive(text, &SEPARATORS, chunk_size, overlap, &mut out);
    out
}

fn split_recursive(
    text: &str,
    separators: &[&'static str],
    chunk_size: usize,
    overlap: usize,
    out: &mut Vec<String>,
) {
    let (separator, finer) = pick_separator(text, separators);
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) <= chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            merge_pieces(&pending, chunk_size, overlap, out);
            pending.clear();
        }

        if finer.is_empty() {
            push_trimmed(out, piece);
        } else {
            split_recursive(piece, finer, chunk_size, overlap, out);
        }
    }

    if !pending.is_empty() {
        merge_pieces(&pending, chunk_size, overlap, out);
    }
}

/// Return the first separator present in `text` and the finer ones after it.
fn pick_separator<'a>(
    text: &str,
    separators: &'a [&'static str],
) -> (&'static str, &'a [&'static str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    }
}

/// Greedily merge small pieces into windows, carrying `overlap` chars forward.
fn merge_pieces(pieces: &[&str], chunk_size: usize, overlap: usize, out: &mut Vec<String>) {
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > chunk_size && !window.is_empty() {
            push_trimmed(out, &join_window(&window));
            while total > overlap || (total + len > chunk_size && total > 0) {
                match window.pop_front() {
                    Some((_, front_len)) => total -= front_len,
                    None => break,
                }
            }
        }

        window.push_back((piece, len));
        total += len;
    }

    if !window.is_empty() {
        push_trimmed(out, &join_window(&window));
    }
}

fn join_window(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(metadata: &DocumentMetadata, index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        content: text.to_string(),
        metadata: metadata.clone(),
        chunk_index: index,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentKind;

    fn text_doc(source: &str, content: &str) -> Document {
        Document::new(content, DocumentMetadata::new(source, DocumentKind::Text))
    }

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_small_text_single_chunk() {
        let pieces = split_text("Hello, world!", 1000, 100);
        assert_eq!(pieces, vec!["Hello, world!"]);
    }

    #[test]
    fn test_blank_documents_are_skipped() {
        let docs = vec![
            text_doc("empty.txt", ""),
            text_doc("spaces.txt", "   \n\n\t "),
            text_doc("real.txt", "Some content."),
        ];
        let chunks = chunk_documents(&docs, 1000, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.source, "real.txt");
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = "Alpha paragraph sentence.\n\nBeta paragraph sentence.\n\nGamma paragraph sentence.";
        let pieces = split_text(text, 30, 0);
        assert_eq!(
            pieces,
            vec![
                "Alpha paragraph sentence.",
                "Beta paragraph sentence.",
                "Gamma paragraph sentence."
            ]
        );
    }

    #[test]
    fn test_falls_back_to_sentences_within_long_paragraph() {
        let text = "One short sentence. Two short sentence. Three short sentence.";
        let pieces = split_text(text, 25, 0);
        assert!(pieces.len() >= 3);
        assert_eq!(pieces[0], "One short sentence.");
        for p in &pieces {
            assert!(p.chars().count() <= 25, "piece too long: {:?}", p);
        }
    }

    #[test]
    fn test_chunks_never_exceed_size() {
        let text = format!(
            "{}\n\n{}\n{}",
            numbered_words(400),
            "x".repeat(2500),
            numbered_words(50)
        );
        for size in [10usize, 64, 100, 333, 1000] {
            for piece in split_text(&text, size, size / 10) {
                assert!(
                    piece.chars().count() <= size,
                    "size {} produced piece of {} chars",
                    size,
                    piece.chars().count()
                );
            }
        }
    }

    #[test]
    fn test_hard_cut_for_unbroken_text() {
        let text = "x".repeat(2500);
        let pieces = split_text(&text, 1000, 100);
        assert!(pieces.len() >= 3);
        assert!(pieces.iter().all(|p| p.chars().count() <= 1000));
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let text = numbered_words(300);
        let pieces = split_text(&text, 100, 20);
        assert!(pieces.len() > 2);
        for pair in pieces.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].split_whitespace().any(|w| w == last_word),
                "expected {:?} to carry {:?} forward",
                pair[1],
                last_word
            );
        }
    }

    #[test]
    fn test_zero_overlap_has_no_shared_words() {
        let text = numbered_words(200);
        let pieces = split_text(&text, 50, 0);
        for pair in pieces.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(!pair[1].split_whitespace().any(|w| w == last_word));
        }
    }

    #[test]
    fn test_all_content_is_preserved() {
        let text = format!(
            "Intro line.\n{}\n\nClosing paragraph. It has two sentences.",
            numbered_words(500)
        );
        let pieces = split_text(&text, 120, 15);
        let joined: std::collections::HashSet<&str> =
            pieces.iter().flat_map(|p| p.split_whitespace()).collect();
        for word in text.split_whitespace() {
            assert!(joined.contains(word), "lost word {:?}", word);
        }
    }

    #[test]
    fn test_multibyte_chars_counted_as_chars() {
        let text = "é".repeat(50);
        let pieces = split_text(&text, 10, 2);
        assert!(pieces.iter().all(|p| p.chars().count() <= 10));
        assert!(pieces.len() >= 5);
    }

    #[test]
    fn test_metadata_inherited_and_indices_contiguous() {
        let meta = DocumentMetadata::new("book.xlsx", DocumentKind::Excel).with_sheet("Budget");
        let docs = vec![
            Document::new(numbered_words(200), meta.clone()),
            text_doc("notes.txt", &numbered_words(200)),
        ];
        let chunks = chunk_documents(&docs, 100, 10);

        let sheet_chunks: Vec<_> = chunks
            .iter()
            .filter(|c| c.metadata.source == "book.xlsx")
            .collect();
        assert!(sheet_chunks.len() > 1);
        for (i, c) in sheet_chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.metadata, meta);
        }

        let note_chunks: Vec<_> = chunks
            .iter()
            .filter(|c| c.metadata.source == "notes.txt")
            .collect();
        assert_eq!(note_chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_deterministic() {
        let docs = vec![text_doc("a.txt", "Alpha\n\nBeta\n\nGamma\n\nDelta")];
        let c1 = chunk_documents(&docs, 8, 2);
        let c2 = chunk_documents(&docs, 8, 2);
        assert_eq!(c1.len(), c2.len());
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.content, b.content);
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.chunk_index, b.chunk_index);
            assert_ne!(a.id, b.id);
        }
    }
}

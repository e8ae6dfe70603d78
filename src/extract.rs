//! Text extraction for binary documents (PDF, DOCX, XLSX/XLS).
//!
//! Each extractor takes the raw file bytes and returns plain UTF-8 text in
//! the shape the ingestor needs: one string per PDF page, the paragraph text
//! of a Word document, and one rendered block per spreadsheet sheet.
//! Extraction never panics; malformed input comes back as an
//! [`ExtractError`] and the ingestor reports it against the filename.

use std::io::{Cursor, Read};

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use quick_xml::events::Event;

/// Maximum sheets to process in a workbook.
pub const MAX_SHEETS: usize = 100;
/// Maximum non-empty cells to render per sheet.
pub const MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("spreadsheet extraction failed: {0}")]
    Spreadsheet(String),
    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// A rendered spreadsheet sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetText {
    pub name: String,
    pub content: String,
}

/// Text of every page, in page order. Pages without a text layer come back
/// as empty strings so page numbers stay aligned.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Strict UTF-8 decoding for plain-text files.
pub fn decode_text(bytes: &[u8]) -> Result<String, ExtractError> {
    Ok(std::str::from_utf8(bytes)?.to_string())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Paragraph text of a Word document: every non-empty `w:p` on its own line.
pub fn extract_docx_paragraphs(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, DOCX_BODY, MAX_XML_ENTRY_BYTES)?;
    let paragraphs = docx_paragraphs(&xml)?;
    Ok(paragraphs.join("\n"))
}

fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    // Whitespace inside runs is significant (`xml:space="preserve"`).
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

/// Render every sheet of an `.xlsx`/`.xls` workbook.
///
/// Content is `"Sheet: {name}\n\n"` followed by one line per non-empty row,
/// cells joined with `" | "`. Empty cells are dropped from the row.
pub fn extract_sheets(bytes: &[u8]) -> Result<Vec<SheetText>, ExtractError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ExtractError::Spreadsheet(e.to_string()))?;

    let names = workbook.sheet_names();
    if names.len() > MAX_SHEETS {
        tracing::warn!(
            sheets = names.len(),
            limit = MAX_SHEETS,
            "workbook has too many sheets, extra sheets ignored"
        );
    }

    let mut sheets = Vec::new();
    for name in names.into_iter().take(MAX_SHEETS) {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Spreadsheet(format!("sheet {}: {}", name, e)))?;
        let content = render_sheet(&name, range.rows());
        sheets.push(SheetText { name, content });
    }
    Ok(sheets)
}

fn render_sheet<'a>(name: &str, rows: impl Iterator<Item = &'a [Data]>) -> String {
    let mut out = format!("Sheet: {}\n\n", name);
    let mut cell_count = 0usize;
    let mut lines = Vec::new();
    'rows: for row in rows {
        let mut cells = Vec::new();
        for cell in row {
            if matches!(cell, Data::Empty) {
                continue;
            }
            if cell_count >= MAX_CELLS_PER_SHEET {
                if !cells.is_empty() {
                    lines.push(cells.join(" | "));
                }
                break 'rows;
            }
            let text = cell.to_string();
            if text.trim().is_empty() {
                continue;
            }
            cells.push(text);
            cell_count += 1;
        }
        if !cells.is_empty() {
            lines.push(cells.join(" | "));
        }
    }
    out.push_str(&lines.join("\n"));
    out
}

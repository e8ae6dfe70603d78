//! # SmartDoc Core
//!
//! Shared, WASM-safe logic for SmartDoc: document and chunk models, the
//! recursive chunker, the hash embedder and vector math, and the vector
//! store trait with its in-memory implementation.
//!
//! This crate contains no tokio runtime, sqlx, model inference, or
//! filesystem I/O. Those live in the `smartdoc` app crate.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod store;

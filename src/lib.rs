//! docmill - Resumable document ingestion and text extraction.
//!
//! Mirrors an input directory tree into extracted-Markdown artifacts,
//! routing each file to a format-family strategy (plain text, image OCR,
//! hybrid PDF, spreadsheet, office documents, placeholder). Content-hash
//! caching (BLAKE3) makes reruns cheap and deduplicates identical files;
//! a per-file deadline and fault isolation keep one bad file from taking
//! down a batch.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;
pub mod strategies;

pub use pipeline::{run_app, Pipeline, RunStats};

//! Content extraction, secret redaction and digest rendering for repodigest.
//!
//! This crate turns a scanned tree into the `(summary, tree, content)`
//! triple:
//!
//! - [`content`] reads files, substituting placeholders for empty and
//!   binary files
//! - [`chunk`] splits text into line chunks, the unit stored in the cache
//! - [`redact`] masks secrets
//! - [`formatter`] renders the three sections
//! - [`ingest`] wires scanning, caching, redaction and formatting together
//!
//! # Example
//!
//! ```rust,no_run
//! use repodigest_core::IngestConfig;
//! use repodigest_digest::{ingest, write_digest};
//!
//! let config = IngestConfig::new("/path/to/repo");
//! let digest = ingest(&config, None).unwrap();
//! write_digest(&digest.to_text(), "digest.txt".as_ref(), false).unwrap();
//! ```

pub mod chunk;
pub mod content;
pub mod error;
pub mod formatter;
pub mod ingest;
pub mod output;
pub mod redact;
pub mod tokens;

pub use chunk::{CHUNK_LINES, Chunk, ChunkKind, chunk_text, join_chunks};
pub use content::{
    BINARY_FILE, EMPTY_FILE, FileContent, TOO_LARGE_FILE, load_text, read_content,
};
pub use error::{DigestError, Result};
pub use formatter::{Digest, DigestFormatter, FileText, SEPARATOR, content_block, render_tree};
pub use ingest::{Ingestor, ingest, ingest_chunks};
pub use output::{output_path, write_digest};
pub use redact::{Detector, MASK_CHAR, SecretRedactor, shannon_entropy};
#[cfg(feature = "tiktoken")]
pub use tokens::TiktokenCounter;
pub use tokens::{HeuristicCounter, TokenCounter, default_counter, format_token_count};

//! Reading file text with placeholders for empty and binary files.

use std::fs;
use std::io;
use std::path::Path;

/// Rendered in place of an empty file's content.
pub const EMPTY_FILE: &str = "[Empty file]";
/// Rendered in place of a binary file's content.
pub const BINARY_FILE: &str = "[Binary file]";
/// Rendered in place of a single file larger than `max_file_size`.
pub const TOO_LARGE_FILE: &str = "[Content ignored: file too large]";

/// Number of leading bytes inspected for NUL bytes.
const SNIFF_LEN: usize = 1024;

/// What a file turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Valid UTF-8 text.
    Text(String),
    /// Zero-length file.
    Empty,
    /// NUL bytes near the start, or not valid UTF-8.
    Binary,
}

impl FileContent {
    /// Classify raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return FileContent::Empty;
        }
        let head = &bytes[..bytes.len().min(SNIFF_LEN)];
        if head.contains(&0) {
            return FileContent::Binary;
        }
        match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(_) => FileContent::Binary,
        }
    }

    /// Text to place in the digest.
    pub fn into_text(self) -> String {
        match self {
            FileContent::Text(text) => text,
            FileContent::Empty => EMPTY_FILE.to_string(),
            FileContent::Binary => BINARY_FILE.to_string(),
        }
    }
}

/// Read and classify a file.
pub fn read_content(path: &Path) -> io::Result<FileContent> {
    fs::read(path).map(FileContent::from_bytes)
}

/// Digest text for a file; read errors become an inline message.
pub fn load_text(path: &Path) -> String {
    match read_content(path) {
        Ok(content) => content.into_text(),
        Err(e) => read_error_text(&e),
    }
}

/// Inline message for a file that could not be read.
pub fn read_error_text(cause: &dyn std::fmt::Display) -> String {
    format!("Error reading file: {cause}")
}

//! Line-based chunking. A file's chunk list is also its cache payload.

use serde::{Deserialize, Serialize};

/// Maximum number of lines per chunk.
pub const CHUNK_LINES: usize = 400;

/// How a chunk relates to its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// The whole file in one piece.
    File,
    /// One piece of a file split by line count.
    Lines,
}

/// A contiguous slice of a file's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Path relative to the source, `/`-separated.
    pub path: String,
    /// Position within the file.
    pub index: usize,
    /// Whole file or a slice of its lines.
    pub kind: ChunkKind,
    /// Chunk content, line endings included.
    pub text: String,
}

/// Split `text` into chunks of at most [`CHUNK_LINES`] lines.
///
/// Line endings are kept, so concatenating the chunk texts yields `text`.
pub fn chunk_text(path: &str, text: &str) -> Vec<Chunk> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.len() <= CHUNK_LINES {
        return vec![Chunk {
            path: path.to_string(),
            index: 0,
            kind: ChunkKind::File,
            text: text.to_string(),
        }];
    }

    lines
        .chunks(CHUNK_LINES)
        .enumerate()
        .map(|(index, piece)| Chunk {
            path: path.to_string(),
            index,
            kind: ChunkKind::Lines,
            text: piece.concat(),
        })
        .collect()
}

/// Reassemble a file's text from its chunks.
pub fn join_chunks(chunks: &[Chunk]) -> String {
    chunks.iter().map(|c| c.text.as_str()).collect()
}

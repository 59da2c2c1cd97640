//! Fixed-window text chunking with overlap.
//!
//! Windows are measured in characters and start every
//! `chunk_size - chunk_overlap` characters. Offsets are byte offsets into
//! the source text and always sit on UTF-8 character boundaries, so
//! `&text[chunk.start_offset..chunk.end_offset] == chunk.text`.

use serde::{Deserialize, Serialize};

use folio_core::{Error, Result};

/// A contiguous slice of the source document; the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: i64,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits text into overlapping fixed-size windows.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Create a chunker. Fails unless `chunk_size > chunk_overlap`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".into()));
        }
        if chunk_size <= chunk_overlap {
            return Err(Error::InvalidConfig(format!(
                "chunk size ({}) must exceed overlap ({})",
                chunk_size, chunk_overlap
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Empty text yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char start, plus the end of the text.
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let char_count = boundaries.len();
        boundaries.push(text.len());

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            let (start_offset, end_offset) = (boundaries[start], boundaries[end]);
            chunks.push(Chunk {
                id: chunks.len() as i64,
                text: text[start_offset..end_offset].to_string(),
                start_offset,
                end_offset,
            });
            if end == char_count {
                break;
            }
            start += step;
        }

        chunks
    }
}

//! Program Image Loading
//!
//! A program image is a flat sequence of 32-bit big-endian words with no
//! header; loading is a bare copy into main memory at address 0. This
//! layer converts raw byte streams into word sequences and packs string
//! literals for placement in images.

use crate::error::{RemError, RemResult};

/// A program image ready to be copied into main memory
#[derive(Debug, Clone, Default)]
pub struct ProgramImage {
    pub words: Vec<u32>,
}

impl ProgramImage {
    pub fn from_words(words: Vec<u32>) -> Self {
        ProgramImage { words }
    }

    /// Parse a raw byte stream of big-endian words
    pub fn from_bytes(bytes: &[u8]) -> RemResult<Self> {
        if bytes.len() % 4 != 0 {
            return Err(RemError::TruncatedImage);
        }

        let words = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(ProgramImage { words })
    }

    /// Append a NUL-terminated string literal to the image
    pub fn push_str(&mut self, text: &str) {
        self.words.extend(encode_str(text));
    }
}

/// Pack a string as UTF-8 bytes plus a NUL terminator into big-endian
/// words, zero-padded to a whole word.
pub fn encode_str(text: &str) -> Vec<u32> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }

    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

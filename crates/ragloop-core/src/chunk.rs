//! Fixed-size, overlapping character chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! each starting exactly `chunk_overlap` characters before the previous
//! chunk's end, so the overlap region is duplicated verbatim at every
//! boundary. Sizes are counted in `char`s, never bytes, so multi-byte text
//! is never cut inside a code point.
//!
//! # Algorithm
//!
//! 1. Take a window of `chunk_size` chars starting at `start`.
//! 2. If the window does not reach the end of the text, pull its end back to
//!    just after the last paragraph break (`\n\n`), else line break, else
//!    space, provided that position lies beyond `start + chunk_overlap`.
//!    Otherwise hard-split at the window edge.
//! 3. Emit the window, then continue at `end - chunk_overlap`.
//! 4. Whitespace-only windows are skipped; empty text yields no chunks.
//!
//! Each chunk carries a fresh UUID, used as its vector-store id.
//!
//! # Example
//!
//! ```rust
//! use ragloop_core::chunk::{chunk_text, ChunkingParams};
//!
//! let chunks = chunk_text("doc_0", "Hello world.\n\nSecond paragraph.", &ChunkingParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Break points tried in order when a window has to end early.
const SEPARATORS: &[&[char]] = &[&['\n', '\n'], &['\n'], &[' ']];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    /// Maximum chunk length in chars.
    pub chunk_size: usize,
    /// Chars shared by consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be > 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split `text` into overlapping chunks tagged with `source`.
///
/// # Guarantees
///
/// - Every chunk is at most `chunk_size` chars and is a contiguous
///   substring of `text`.
/// - Consecutive chunks share exactly `chunk_overlap` chars.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
///
/// Callers must pass validated params; an overlap that is not smaller than
/// the size is clamped so the splitter always makes progress.
pub fn chunk_text(source: &str, text: &str, params: &ChunkingParams) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let size = params.chunk_size.max(1);
    let overlap = params.chunk_overlap.min(size - 1);

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let window_end = (start + size).min(total);
        let end = if window_end < total {
            preferred_break(&chars, start + overlap, window_end).unwrap_or(window_end)
        } else {
            total
        };

        let piece: String = chars[start..end].iter().collect();
        if !piece.trim().is_empty() {
            let index = chunks.len() as i64;
            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                source: source.to_string(),
                chunk_index: index,
                text: piece,
            });
        }

        if end >= total {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Last separator end position `p` with `lo < p <= hi`, by separator priority.
fn preferred_break(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    for sep in SEPARATORS {
        let mut p = hi;
        while p > lo {
            if p >= sep.len() && chars[p - sep.len()..p] == **sep {
                return Some(p);
            }
            p -= 1;
        }
    }
    None
}

//! Sliding-window text chunker with sentence-boundary snapping.
//!
//! Splits normalized document text into overlapping windows of at most
//! `max_chars` characters. A window that does not reach the end of the
//! text is cut early at the last sentence or line boundary it contains,
//! but only when that boundary lies more than [`MIN_BOUNDARY_OFFSET`]
//! characters into the window, so chunks never become too short.
//!
//! # Algorithm
//!
//! 1. Normalize line endings to `\n`, collapse runs of 3+ newlines to 2, trim.
//! 2. Return nothing if the text is shorter than `min_chunk_size`.
//! 3. Take the window `[start, start + max_chars)`.
//! 4. If the window stops before the end of the text, find the last
//!    `". "`, `"\n"`, `"? "` or `"! "` inside it and cut just after the
//!    punctuation when its offset exceeds 400.
//! 5. Trim the window; keep it if at least `min_chunk_size` characters remain.
//! 6. Next start is `end - overlap` when that moves forward, otherwise `end`.
//!
//! All lengths and offsets are counted in characters, never bytes.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::{chunk_text, ChunkingParams};
//!
//! let params = ChunkingParams { max_chars: 20, overlap: 5, min_chunk_size: 5 };
//! let chunks = chunk_text("Sentence one. Sentence two. Sentence three.", &params);
//! assert_eq!(chunks[0], "Sentence one. Senten");
//! ```

use serde::{Deserialize, Serialize};

use crate::models::Chunk;

/// A boundary found at or below this offset into the window is ignored.
pub const MIN_BOUNDARY_OFFSET: usize = 400;

const BOUNDARY_MARKERS: [&[char]; 4] = [&['.', ' '], &['\n'], &['?', ' '], &['!', ' ']];

/// Chunking limits, all measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingParams {
    pub max_chars: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_chars: 1200,
            overlap: 150,
            min_chunk_size: 20,
        }
    }
}

/// Normalize line endings, collapse 3+ consecutive newlines to 2, and trim.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut newline_run = 0usize;
    for c in unified.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

/// Split text into chunk strings.
///
/// Convenience wrapper over [`chunk_document`] for callers that only need
/// the text of each segment.
pub fn chunk_text(text: &str, params: &ChunkingParams) -> Vec<String> {
    chunk_document("", text, params)
        .into_iter()
        .map(|c| c.text)
        .collect()
}

/// Split a document's text into [`Chunk`]s with contiguous 0-based indices.
///
/// # Guarantees
///
/// - Every chunk has at most `max_chars` characters and at least
///   `min_chunk_size` characters after trimming.
/// - Consecutive windows overlap by at most `overlap` characters.
/// - The loop always advances, so it terminates for any input.
pub fn chunk_document(document_id: &str, text: &str, params: &ChunkingParams) -> Vec<Chunk> {
    let normalized = normalize_text(text);
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();

    if len == 0 || len < params.min_chunk_size {
        return Vec::new();
    }

    let max_chars = params.max_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + max_chars).min(len);

        if end < len {
            if let Some(offset) = last_boundary(&chars[start..end]) {
                if offset > MIN_BOUNDARY_OFFSET {
                    end = start + offset + 1;
                }
            }
        }

        let window = &chars[start..end];
        let lead = window.iter().take_while(|c| c.is_whitespace()).count();
        let trail = window[lead..]
            .iter()
            .rev()
            .take_while(|c| c.is_whitespace())
            .count();
        let kept = window.len() - lead - trail;

        if kept > 0 && kept >= params.min_chunk_size {
            chunks.push(Chunk {
                document_id: document_id.to_string(),
                chunk_index: chunks.len(),
                text: window[lead..window.len() - trail].iter().collect(),
                start: start + lead,
                end: end - trail,
            });
        }

        if end >= len {
            break;
        }

        let next = end.saturating_sub(params.overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Offset of the last boundary marker that fits entirely inside `window`.
fn last_boundary(window: &[char]) -> Option<usize> {
    (0..window.len()).rev().find(|&pos| {
        BOUNDARY_MARKERS
            .iter()
            .any(|marker| window[pos..].starts_with(marker))
    })
}

//! Bounded, sequence-numbered output history.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::ansi::RESET;
use crate::domain::{NO_SEQ, Seq};

/// Default byte budget per session (5 MiB).
pub const DEFAULT_MAX_BYTES: usize = 5 * 1024 * 1024;

/// One stored piece of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub seq: Seq,
    pub data: String,
}

/// Ring buffer of output chunks bounded by total byte size.
///
/// Sequence numbers increase by one per [`append`](Self::append) and are never
/// reused, not even after [`clear`](Self::clear). When old chunks are evicted
/// the new oldest chunk is prefixed with an SGR reset so a replay never starts
/// inside a dangling style.
#[derive(Debug)]
pub struct RingBuffer {
    chunks: VecDeque<OutputChunk>,
    total_bytes: usize,
    max_bytes: usize,
    next_seq: Seq,
}

impl RingBuffer {
    /// Create a buffer with the given byte budget.
    ///
    /// Budgets smaller than a few reset markers are raised so truncation always
    /// leaves room for content.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_bytes: 0,
            max_bytes: max_bytes.max(RESET.len() * 4),
            next_seq: 0,
        }
    }

    /// Store a chunk and return its sequence number.
    pub fn append(&mut self, data: &str) -> Seq {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.total_bytes += data.len();
        self.chunks.push_back(OutputChunk {
            seq,
            data: data.to_string(),
        });
        self.enforce_budget();

        seq
    }

    /// Every stored chunk with `seq > after_seq`, oldest first.
    ///
    /// Pass [`NO_SEQ`] for a full replay.
    pub fn chunks_since(&self, after_seq: Seq) -> Vec<OutputChunk> {
        // Chunks are contiguous in seq, so skip by offset instead of scanning
        let first = match self.chunks.front() {
            Some(chunk) => chunk.seq,
            None => return Vec::new(),
        };
        let offset = after_seq.saturating_add(1).saturating_sub(first);
        if offset <= 0 {
            return self.chunks.iter().cloned().collect();
        }
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        self.chunks.iter().skip(skip).cloned().collect()
    }

    /// Latest assigned sequence number, or [`NO_SEQ`] if nothing was ever appended.
    pub fn current_seq(&self) -> Seq {
        self.next_seq - 1
    }

    /// Drop all chunks. The sequence counter keeps counting.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    /// Total bytes currently stored.
    pub fn len_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn enforce_budget(&mut self) {
        let mut evicted = false;

        while self.total_bytes > self.max_bytes {
            if self.chunks.len() > 1 {
                if let Some(old) = self.chunks.pop_front() {
                    self.total_bytes -= old.data.len();
                }
                evicted = true;
                continue;
            }

            // A lone chunk over budget keeps its tail
            if let Some(front) = self.chunks.front_mut() {
                let body = tail_within(&front.data, self.max_bytes - RESET.len());
                front.data = format!("{RESET}{}", body.strip_prefix(RESET).unwrap_or(body));
                self.total_bytes = front.data.len();
            }
            return;
        }

        if evicted {
            let needs_marker = self
                .chunks
                .front()
                .is_some_and(|front| !front.data.starts_with(RESET));
            if needs_marker {
                if let Some(front) = self.chunks.front_mut() {
                    front.data.insert_str(0, RESET);
                    self.total_bytes += RESET.len();
                }
                // The marker may push us over again
                self.enforce_budget();
            }
        }
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

/// Full concatenation of the stored chunks.
impl fmt::Display for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in &self.chunks {
            f.write_str(&chunk.data)?;
        }
        Ok(())
    }
}

/// The longest suffix of `s` that fits in `max` bytes, cut on a char boundary.
fn tail_within(s: &str, max: usize) -> &str {
    let mut start = s.len().saturating_sub(max);
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

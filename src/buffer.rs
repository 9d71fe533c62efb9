//! Chunk queue backing the parser.
//!
//! Chunks are kept as they arrived from the transport so that flow reads can forward
//! them without re-slicing. Only the head is ever consumed.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct Buffer {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl Buffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push_back(chunk);
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }

    /// Remove and return the first `n` bytes. Zero-copy when they sit in one chunk.
    pub fn split_to(&mut self, n: usize) -> Bytes {
        debug_assert!(n <= self.len);
        if n == 0 {
            return Bytes::new();
        }

        if let Some(front) = self.chunks.front_mut() {
            if front.len() >= n {
                let head = front.split_to(n);
                if front.is_empty() {
                    self.chunks.pop_front();
                }
                self.len -= n;
                return head;
            }
        }

        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            let needed = n - out.len();
            match self.chunks.front_mut() {
                Some(front) if front.len() <= needed => {
                    out.extend_from_slice(front);
                    self.chunks.pop_front();
                }
                Some(front) => {
                    out.extend_from_slice(&front.split_to(needed));
                }
                None => break,
            }
        }
        self.len -= out.len();
        out.freeze()
    }

    /// Remove the head chunk, split so that it is at most `max` bytes long
    pub fn pop_chunk(&mut self, max: usize) -> Option<Bytes> {
        if max == 0 {
            return None;
        }
        let front = self.chunks.front_mut()?;
        let chunk = if front.len() > max {
            front.split_to(max)
        } else {
            self.chunks.pop_front()?
        };
        self.len -= chunk.len();
        Some(chunk)
    }

    /// Drain everything buffered into one contiguous value
    pub fn take_all(&mut self) -> Bytes {
        let len = self.len;
        self.split_to(len)
    }

    /// Position of the first `byte` at or after `from`
    pub fn position(&self, byte: u8, from: usize) -> Option<usize> {
        let mut offset = 0;
        for chunk in &self.chunks {
            let end = offset + chunk.len();
            if end > from {
                let start = from.saturating_sub(offset);
                if let Some(i) = chunk[start..].iter().position(|&b| b == byte) {
                    return Some(offset + start + i);
                }
            }
            offset = end;
        }
        None
    }

    /// Copy out `start..end` without consuming anything
    pub fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(end.saturating_sub(start));
        let mut offset = 0;
        for chunk in &self.chunks {
            let chunk_end = offset + chunk.len();
            if chunk_end > start && offset < end {
                let lo = start.saturating_sub(offset);
                let hi = (end - offset).min(chunk.len());
                out.extend_from_slice(&chunk[lo..hi]);
            }
            if chunk_end >= end {
                break;
            }
            offset = chunk_end;
        }
        out
    }

    pub fn pop_front(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.len -= chunk.len();
        Some(chunk)
    }
}

//! # Frame Extractor
//!
//! Finds complete SOR..EOR frames inside an accumulating byte stream.
//! Leading garbage is discarded and extraction resynchronises after every
//! frame. A partial frame simply waits for more bytes; no size or time limit
//! is applied here.
//!
//! Escaping guarantees a literal EOR only ever appears as the final byte of
//! a frame, so the first EOR after SOR always closes it.

use bytes::{Buf, Bytes, BytesMut};

use super::protocol::{EOR, SOR};

/// Streaming frame splitter over a growing buffer
#[derive(Debug, Default)]
pub struct FrameExtractor {
    buffer: BytesMut,
    /// Bytes at the front of `buffer` already searched for EOR
    scanned: usize,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly received bytes
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Slice off the next complete (still escaped) frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.discard_until_sor();

        if self.buffer.is_empty() {
            return None;
        }

        match self.buffer[self.scanned..].iter().position(|&b| b == EOR) {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;
                Some(self.buffer.split_to(end + 1).freeze())
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Number of bytes waiting for a frame to close
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }

    fn discard_until_sor(&mut self) {
        match self.buffer.iter().position(|&b| b == SOR) {
            Some(0) => {}
            Some(start) => {
                self.buffer.advance(start);
                self.scanned = self.scanned.saturating_sub(start);
            }
            None => self.clear(),
        }
    }
}

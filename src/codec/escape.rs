//! # Byte Escaping
//!
//! Reserved markers (SOR, EOR, ESC) inside a frame are replaced by
//! `ESC, byte + 0x40`. The first and last bytes of a frame are the real
//! delimiters and are never escaped.

use super::protocol::{EOR, ESC, ESC_OFFSET, SOR};

fn is_reserved(byte: u8) -> bool {
    byte == SOR || byte == EOR || byte == ESC
}

/// Escape a complete pre-escape frame (SOR ... EOR)
///
/// Must run after length and CRC have been patched into the frame.
pub fn escape_bytes(frame: &[u8]) -> Vec<u8> {
    let last = frame.len().saturating_sub(1);
    let mut escaped = Vec::with_capacity(frame.len() + 8);

    for (i, &byte) in frame.iter().enumerate() {
        if is_reserved(byte) && i != 0 && i != last {
            escaped.push(ESC);
            escaped.push(byte.wrapping_add(ESC_OFFSET));
        } else {
            escaped.push(byte);
        }
    }

    escaped
}

/// Reverse [`escape_bytes`]
///
/// An ESC consumes itself and the following byte is reduced by 0x40. A
/// dangling ESC at the very end is dropped.
pub fn unescape_bytes(frame: &[u8]) -> Vec<u8> {
    let mut unescaped = Vec::with_capacity(frame.len());
    let mut escaped = false;

    for &byte in frame {
        if escaped {
            unescaped.push(byte.wrapping_sub(ESC_OFFSET));
            escaped = false;
        } else if byte == ESC {
            escaped = true;
        } else {
            unescaped.push(byte);
        }
    }

    unescaped
}

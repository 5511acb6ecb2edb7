//! # LapRF Protocol Module
//!
//! Implementation of the LapRF binary record protocol.
//!
//! This module handles:
//! - CRC-16 calculation with a construction-time self-test
//! - Escaping of reserved marker bytes inside frames
//! - Frame extraction from an accumulating byte stream
//! - Record decoding into the device model
//! - Command encoding for every outgoing request

pub mod protocol;
pub mod crc;
pub mod escape;
pub mod extractor;
pub mod decoder;
pub mod encoder;

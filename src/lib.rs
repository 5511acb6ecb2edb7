//! # LapRF Library
//!
//! Streaming codec and device model for the LapRF lap-timing binary protocol.
//!
//! This library provides frame extraction, CRC-checked record decoding into a
//! per-device model, command encoding, and thin serial/TCP adapters for
//! talking to LapRF pucks and 8-way timers.

pub mod codec;
pub mod config;
pub mod connection;
pub mod device;
pub mod error;
pub mod event;
pub mod transport;

pub use codec::crc::Crc16;
pub use connection::{ByteSink, ConnectionOptions, LapRfConnection};
pub use device::{Device, GateState, PassingRecord, RfSetup};
pub use error::{FrameError, LapRfError, Result};
pub use event::Event;

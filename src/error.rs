//! # Error Types
//!
//! Custom error types for the LapRF codec using `thiserror`.

use thiserror::Error;

/// Main error type for the LapRF crate
#[derive(Debug, Error)]
pub enum LapRfError {
    /// The CRC engine failed its construction self-test
    #[error("CRC-16 self-test failed: expected 0x{expected:04X}, computed 0x{computed:04X}")]
    CrcSelfTest { expected: u16, computed: u16 },

    /// Slot index outside the device's slot range
    #[error("Slot index {0} is out of range (max {max})", max = crate::device::MAX_SLOTS - 1)]
    InvalidSlot(usize),

    /// A write command was issued on a read-only connection
    #[error("Connection is read-only")]
    ReadOnly,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial ports could be opened
    #[error("No LapRF serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Outbound channel to the transport has been closed
    #[error("Transport closed")]
    TransportClosed,
}

/// Result type alias for the LapRF crate
pub type Result<T> = std::result::Result<T, LapRfError>;

/// Reasons a single frame is rejected by the record decoder
///
/// These never reach the caller of the ingest path; the frame is logged and
/// dropped and extraction carries on with the next frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("frame does not start with SOR: 0x{0:02X}")]
    MissingStart(u8),

    #[error("CRC mismatch: frame carries 0x{received:04X}, computed 0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },

    #[error("unknown record type 0x{0:04X}")]
    UnknownRecordType(u16),

    #[error("field 0x{tag:02X} declares {declared} bytes but only {remaining} remain")]
    TruncatedField {
        tag: u8,
        declared: usize,
        remaining: usize,
    },

    #[error("slot index {0} is out of range")]
    SlotOutOfRange(usize),
}

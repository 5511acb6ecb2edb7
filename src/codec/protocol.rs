//! # LapRF Protocol Constants and Types
//!
//! Core protocol definitions for the LapRF binary record protocol.
//!
//! Frame structure (pre-escape):
//!
//! ```text
//! +-----+--------+--------+--------+---------------------+-----+
//! | SOR | length | crc16  | type   | TLV fields ...      | EOR |
//! | 1   | 2 (LE) | 2 (LE) | 2 (LE) | tag(1) len(1) value | 1   |
//! +-----+--------+--------+--------+---------------------+-----+
//! ```

use crate::error::FrameError;

/// Start of record marker
pub const SOR: u8 = 0x5A;

/// End of record marker
pub const EOR: u8 = 0x5B;

/// Escape marker
pub const ESC: u8 = 0x5C;

/// Offset added to an escaped byte
pub const ESC_OFFSET: u8 = 0x40;

/// Header size: SOR(1) + length(2) + crc(2) + type(2)
pub const HEADER_SIZE: usize = 7;

/// Smallest frame the decoder accepts: header + EOR
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 1;

/// Byte offsets inside an unescaped frame
pub const LENGTH_OFFSET: usize = 1;
pub const CRC_OFFSET: usize = 3;
pub const TYPE_OFFSET: usize = 5;

/// ASCII command that switches a LapRF puck into binary protocol mode.
/// The puck must be restarted afterwards.
pub const ENABLE_BINARY_PROTOCOL: [u8; 5] = [0x55, 0x70, 0x70, 0x0D, 0x0A];

/// Number of slots queried by a broadcast RF setup request
pub const RF_SETUP_QUERY_SLOTS: u8 = 8;

/// RSSI packet rate the device falls back to when custom rate is disabled
pub const DEFAULT_RSSI_PACKET_RATE_MS: u32 = 1000;

/// Record type codes carried in bytes 5-6 of every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordType {
    Rssi = 0xDA01,
    RfSetup = 0xDA02,
    StateControl = 0xDA04,
    Settings = 0xDA07,
    Descriptor = 0xDA08,
    Passing = 0xDA09,
    Status = 0xDA0A,
    Time = 0xDA0C,
    Error = 0xFFFF,
}

impl RecordType {
    /// Wire code of this record type
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for RecordType {
    type Error = FrameError;

    fn try_from(code: u16) -> Result<Self, FrameError> {
        match code {
            0xDA01 => Ok(Self::Rssi),
            0xDA02 => Ok(Self::RfSetup),
            0xDA04 => Ok(Self::StateControl),
            0xDA07 => Ok(Self::Settings),
            0xDA08 => Ok(Self::Descriptor),
            0xDA09 => Ok(Self::Passing),
            0xDA0A => Ok(Self::Status),
            0xDA0C => Ok(Self::Time),
            0xFFFF => Ok(Self::Error),
            other => Err(FrameError::UnknownRecordType(other)),
        }
    }
}

/// Slot index tag, shared by every slot-addressed record
pub const FIELD_SLOT_INDEX: u8 = 0x01;

/// RSSI record (0xDA01) field tags
pub mod rssi_field {
    pub const SLOT_INDEX: u8 = super::FIELD_SLOT_INDEX;
    pub const MIN_RSSI: u8 = 0x20;
    pub const MAX_RSSI: u8 = 0x21;
    pub const MEAN_RSSI: u8 = 0x22;
    pub const CUSTOM_RATE: u8 = 0x24;
    pub const PACKET_RATE: u8 = 0x25;
}

/// RF setup record (0xDA02) field tags
pub mod rf_setup_field {
    pub const SLOT_INDEX: u8 = super::FIELD_SLOT_INDEX;
    pub const ENABLED: u8 = 0x20;
    pub const CHANNEL: u8 = 0x21;
    pub const BAND: u8 = 0x22;
    pub const THRESHOLD: u8 = 0x23;
    pub const GAIN: u8 = 0x24;
    pub const FREQUENCY: u8 = 0x25;
}

/// State control record (0xDA04) field tags
pub mod state_control_field {
    pub const GATE_STATE: u8 = 0x20;
}

/// Settings record (0xDA07) field tags
pub mod settings_field {
    pub const STATUS_INTERVAL: u8 = 0x22;
    pub const MIN_LAP_TIME: u8 = 0x26;
}

/// Passing record (0xDA09) field tags
pub mod passing_field {
    pub const SLOT_INDEX: u8 = super::FIELD_SLOT_INDEX;
    pub const RTC_TIME: u8 = 0x02;
    pub const DECODER_ID: u8 = 0x20;
    pub const PASSING_NUMBER: u8 = 0x21;
    pub const PEAK_HEIGHT: u8 = 0x22;
    pub const FLAGS: u8 = 0x23;
}

/// Status record (0xDA0A) field tags
pub mod status_field {
    pub const SLOT_INDEX: u8 = super::FIELD_SLOT_INDEX;
    pub const FLAGS: u8 = 0x03;
    pub const BATTERY_VOLTAGE: u8 = 0x21;
    pub const LAST_RSSI: u8 = 0x22;
    pub const GATE_STATE: u8 = 0x23;
    pub const DETECTION_COUNT: u8 = 0x24;
}

/// Time record (0xDA0C) field tags
pub mod time_field {
    pub const RTC_TIME: u8 = 0x02;
    pub const TIME_RTC_TIME: u8 = 0x20;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_constants() {
        assert_eq!(SOR, 0x5A);
        assert_eq!(EOR, 0x5B);
        assert_eq!(ESC, 0x5C);
        assert_eq!(ESC_OFFSET, 0x40);
        assert_eq!(MIN_FRAME_SIZE, 8);
    }

    #[test]
    fn test_record_type_codes_round_trip() {
        for record_type in [
            RecordType::Rssi,
            RecordType::RfSetup,
            RecordType::StateControl,
            RecordType::Settings,
            RecordType::Descriptor,
            RecordType::Passing,
            RecordType::Status,
            RecordType::Time,
            RecordType::Error,
        ] {
            assert_eq!(RecordType::try_from(record_type.code()).unwrap(), record_type);
        }
    }

    #[test]
    fn test_unknown_record_type() {
        assert_eq!(
            RecordType::try_from(0xDA03),
            Err(FrameError::UnknownRecordType(0xDA03))
        );
    }
}

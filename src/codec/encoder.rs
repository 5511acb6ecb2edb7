//! # LapRF Command Encoder
//!
//! Builds outgoing frames. Fields are appended as TLVs, EOR is appended,
//! then length and CRC are patched into the header (CRC computed with its
//! own two bytes zeroed) and the whole frame is escaped last.

use std::sync::Arc;

use super::crc::Crc16;
use super::escape::escape_bytes;
use super::protocol::*;
use crate::device::{Device, GateState, RfSetup, MAX_SLOTS};
use crate::error::{LapRfError, Result};

/// A value that can be written as a little-endian TLV field
pub trait TlvValue {
    /// Append `[tag, width, value...]` to `out`
    fn write_tlv(&self, tag: u8, out: &mut Vec<u8>);
}

macro_rules! impl_tlv_value {
    ($($ty:ty),*) => {
        $(
            impl TlvValue for $ty {
                fn write_tlv(&self, tag: u8, out: &mut Vec<u8>) {
                    let bytes = self.to_le_bytes();
                    out.push(tag);
                    out.push(bytes.len() as u8);
                    out.extend_from_slice(&bytes);
                }
            }
        )*
    };
}

impl_tlv_value!(u8, u16, u32, u64, f32);

/// Accumulates one pre-escape frame
#[derive(Debug)]
pub struct FrameBuilder<'a> {
    crc: &'a Crc16,
    bytes: Vec<u8>,
}

impl<'a> FrameBuilder<'a> {
    /// Start a frame with a zeroed length/CRC header
    ///
    /// # Arguments
    ///
    /// * `crc` - Verified CRC engine used by [`finish`](Self::finish)
    /// * `record_type` - Record type written into the header
    ///
    /// # Returns
    ///
    /// * `FrameBuilder` - Builder holding the 7-byte header
    pub fn new(crc: &'a Crc16, record_type: RecordType) -> Self {
        let [type_low, type_high] = record_type.code().to_le_bytes();
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&[SOR, 0, 0, 0, 0, type_low, type_high]);
        Self { crc, bytes }
    }

    /// Append one TLV field
    ///
    /// The width byte is the value's size: 1, 2, 4 or 8 bytes for integers,
    /// 4 for `f32`.
    ///
    /// # Arguments
    ///
    /// * `tag` - Field signature
    /// * `value` - Value written little-endian
    ///
    /// # Returns
    ///
    /// * `&mut Self` - The builder, for chaining
    ///
    /// # Examples
    ///
    /// ```
    /// use laprf::codec::crc::Crc16;
    /// use laprf::codec::encoder::FrameBuilder;
    /// use laprf::codec::protocol::{settings_field, RecordType};
    ///
    /// let crc = Crc16::new().unwrap();
    /// let mut builder = FrameBuilder::new(&crc, RecordType::Settings);
    /// builder.field(settings_field::MIN_LAP_TIME, 3000u32);
    /// let frame = builder.finish();
    /// assert_eq!(frame[0], 0x5A);
    /// assert_eq!(frame[frame.len() - 1], 0x5B);
    /// ```
    pub fn field<T: TlvValue>(&mut self, tag: u8, value: T) -> &mut Self {
        value.write_tlv(tag, &mut self.bytes);
        self
    }

    /// Append pre-encoded field bytes verbatim
    #[cfg(test)]
    pub(crate) fn raw(&mut self, fields: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(fields);
        self
    }

    /// Close the frame, patch length and CRC, and escape it
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Wire-ready frame (SOR ... EOR, interior bytes escaped)
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(EOR);

        let length = self.bytes.len() as u16;
        self.bytes[LENGTH_OFFSET..LENGTH_OFFSET + 2].copy_from_slice(&length.to_le_bytes());

        let crc = self.crc.compute(&self.bytes);
        self.bytes[CRC_OFFSET..CRC_OFFSET + 2].copy_from_slice(&crc.to_le_bytes());

        escape_bytes(&self.bytes)
    }
}

/// Convert a 0-based slot to its 1-based wire index
fn wire_slot(slot: usize) -> Result<u8> {
    if slot >= MAX_SLOTS {
        return Err(LapRfError::InvalidSlot(slot));
    }
    Ok((slot + 1) as u8)
}

fn append_rf_setup(builder: &mut FrameBuilder<'_>, wire_index: u8, config: &RfSetup) {
    builder
        .field(rf_setup_field::SLOT_INDEX, wire_index)
        .field(rf_setup_field::ENABLED, config.enabled)
        .field(rf_setup_field::CHANNEL, config.channel)
        .field(rf_setup_field::BAND, config.band)
        .field(rf_setup_field::THRESHOLD, config.threshold)
        .field(rf_setup_field::GAIN, config.gain)
        .field(rf_setup_field::FREQUENCY, config.frequency);
}

/// The raw ASCII command that switches a puck into binary mode
///
/// This is not a framed record; the puck must be restarted afterwards.
///
/// # Returns
///
/// * `Vec<u8>` - The 5 ASCII bytes `Upp\r\n`
pub fn enable_binary_protocol() -> Vec<u8> {
    ENABLE_BINARY_PROTOCOL.to_vec()
}

/// Encoder for every outgoing LapRF command
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    crc: Arc<Crc16>,
}

impl CommandEncoder {
    /// Create an encoder sharing a verified CRC engine
    ///
    /// # Arguments
    ///
    /// * `crc` - Engine returned by [`Crc16::new`]
    pub fn new(crc: Arc<Crc16>) -> Self {
        Self { crc }
    }

    fn frame(&self, record_type: RecordType) -> FrameBuilder<'_> {
        FrameBuilder::new(&self.crc, record_type)
    }

    /// Ask the device for its descriptor record
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Empty Descriptor frame
    pub fn request_descriptor(&self) -> Vec<u8> {
        self.frame(RecordType::Descriptor).finish()
    }

    /// Ask for the RF setup of slots 1-8
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - RF-setup frame carrying eight slot-index fields
    pub fn request_rf_setup(&self) -> Vec<u8> {
        let mut builder = self.frame(RecordType::RfSetup);
        for wire_index in 1..=RF_SETUP_QUERY_SLOTS {
            builder.field(rf_setup_field::SLOT_INDEX, wire_index);
        }
        builder.finish()
    }

    /// Ask for the RF setup of one 0-based slot
    ///
    /// # Arguments
    ///
    /// * `slot` - 0-based slot, written as `slot + 1`
    ///
    /// # Errors
    ///
    /// Returns [`LapRfError::InvalidSlot`] if `slot >= MAX_SLOTS`
    pub fn request_rf_setup_for_slot(&self, slot: usize) -> Result<Vec<u8>> {
        let mut builder = self.frame(RecordType::RfSetup);
        builder.field(rf_setup_field::SLOT_INDEX, wire_slot(slot)?);
        Ok(builder.finish())
    }

    /// Ask for the device settings
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Settings frame with a zero min-lap-time placeholder
    pub fn request_settings(&self) -> Vec<u8> {
        let mut builder = self.frame(RecordType::Settings);
        builder.field(settings_field::MIN_LAP_TIME, 0u8);
        builder.finish()
    }

    /// Write the RF configuration of one 0-based slot
    ///
    /// # Arguments
    ///
    /// * `slot` - 0-based slot, written as `slot + 1`
    /// * `config` - Enabled, channel, band, threshold, gain and frequency
    ///
    /// # Errors
    ///
    /// Returns [`LapRfError::InvalidSlot`] if `slot >= MAX_SLOTS`
    pub fn configure_pilot_slot(&self, slot: usize, config: &RfSetup) -> Result<Vec<u8>> {
        let mut builder = self.frame(RecordType::RfSetup);
        append_rf_setup(&mut builder, wire_slot(slot)?, config);
        Ok(builder.finish())
    }

    /// Write the RF configuration of slots `0..slots.len()` in one frame
    ///
    /// # Arguments
    ///
    /// * `slots` - One configuration per slot, starting at slot 0
    ///
    /// # Errors
    ///
    /// Returns [`LapRfError::InvalidSlot`] if more than `MAX_SLOTS` are given
    pub fn configure_pilot_slots(&self, slots: &[RfSetup]) -> Result<Vec<u8>> {
        if slots.len() > MAX_SLOTS {
            return Err(LapRfError::InvalidSlot(slots.len() - 1));
        }

        let mut builder = self.frame(RecordType::RfSetup);
        for (slot, config) in slots.iter().enumerate() {
            append_rf_setup(&mut builder, wire_slot(slot)?, config);
        }
        Ok(builder.finish())
    }

    /// Ask for the device RTC and remember when the request left
    ///
    /// # Arguments
    ///
    /// * `device` - Model that records the pending request
    /// * `now` - Host wall-clock time in seconds; the answer is correlated
    ///   against it by the decoder
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Time frame requesting the RTC
    pub fn request_rtc_time(&self, device: &mut Device, now: f64) -> Vec<u8> {
        device.mark_rtc_time_requested(now);

        let mut builder = self.frame(RecordType::Time);
        builder.field(time_field::RTC_TIME, 0u8);
        builder.finish()
    }

    /// Reset the device RTC to zero
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Time frame writing a zero time-rtc-time
    pub fn reset_rtc_time(&self) -> Vec<u8> {
        let mut builder = self.frame(RecordType::Time);
        builder.field(time_field::TIME_RTC_TIME, 0u64);
        builder.finish()
    }

    /// Command a gate state
    ///
    /// # Arguments
    ///
    /// * `state` - Requested state, written as its 1-byte wire value
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - State-control frame
    pub fn set_gate_state(&self, state: GateState) -> Vec<u8> {
        let mut builder = self.frame(RecordType::StateControl);
        builder.field(state_control_field::GATE_STATE, state.to_wire());
        builder.finish()
    }

    /// Set the minimum lap time
    ///
    /// # Arguments
    ///
    /// * `milliseconds` - Passings closer together than this are ignored by the device
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Settings frame with a 4-byte min-lap-time field
    pub fn set_min_lap_time(&self, milliseconds: u32) -> Vec<u8> {
        let mut builder = self.frame(RecordType::Settings);
        builder.field(settings_field::MIN_LAP_TIME, milliseconds);
        builder.finish()
    }

    /// Set the RSSI streaming interval; 0 disables the custom rate and the
    /// device falls back to 1000 ms
    ///
    /// # Arguments
    ///
    /// * `milliseconds` - Streaming interval, or 0 for the device default
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - RSSI frame with custom-rate flag and rate fields
    pub fn set_rssi_packet_rate(&self, milliseconds: u32) -> Vec<u8> {
        let (custom, rate) = match milliseconds {
            0 => (0u8, DEFAULT_RSSI_PACKET_RATE_MS),
            ms => (1u8, ms),
        };

        let mut builder = self.frame(RecordType::Rssi);
        builder
            .field(rssi_field::CUSTOM_RATE, custom)
            .field(rssi_field::PACKET_RATE, rate);
        builder.finish()
    }

    /// Set the interval at which status records are streamed
    ///
    /// # Arguments
    ///
    /// * `milliseconds` - Status interval
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Settings frame with a 2-byte status-interval field
    pub fn set_status_message_interval(&self, milliseconds: u16) -> Vec<u8> {
        let mut builder = self.frame(RecordType::Settings);
        builder.field(settings_field::STATUS_INTERVAL, milliseconds);
        builder.finish()
    }
}

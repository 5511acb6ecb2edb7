//! # LapRF Record Decoder
//!
//! Validates one extracted frame (length, SOR, CRC, record type), walks its
//! TLV fields and applies them to the [`Device`] model.
//!
//! A field whose declared length runs past the end of the frame aborts the
//! frame. Mutations already applied from earlier fields of that frame stay
//! in place.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::crc::Crc16;
use super::escape::unescape_bytes;
use super::protocol::*;
use crate::device::{Device, GateState, PassingRecord, MAX_SLOTS};
use crate::error::FrameError;
use crate::event::Event;

/// One TLV field borrowed from an unescaped frame
#[derive(Debug, Clone, Copy)]
struct Field<'a> {
    tag: u8,
    value: &'a [u8],
}

impl<'a> Field<'a> {
    /// Little-endian unsigned integer of the declared width (1..=8 bytes)
    fn uint(&self) -> Option<u64> {
        if self.value.is_empty() || self.value.len() > 8 {
            return None;
        }

        Some(
            self.value
                .iter()
                .rev()
                .fold(0u64, |acc, &byte| (acc << 8) | byte as u64),
        )
    }

    fn u8(&self) -> Option<u8> {
        self.uint().map(|v| v as u8)
    }

    fn u16(&self) -> Option<u16> {
        self.uint().map(|v| v as u16)
    }

    fn u32(&self) -> Option<u32> {
        self.uint().map(|v| v as u32)
    }

    fn u64(&self) -> Option<u64> {
        self.uint()
    }

    /// IEEE-754 single precision, little-endian
    fn f32(&self) -> Option<f32> {
        let bytes: [u8; 4] = self.value.try_into().ok()?;
        Some(f32::from_le_bytes(bytes))
    }

    /// Convert a 1-based wire slot index to a 0-based model index
    fn slot(&self) -> Result<Option<usize>, FrameError> {
        match self.uint() {
            Some(wire) => {
                let slot = wire.saturating_sub(1) as usize;
                if slot >= MAX_SLOTS {
                    return Err(FrameError::SlotOutOfRange(slot));
                }
                Ok(Some(slot))
            }
            None => Ok(None),
        }
    }
}

/// Per-frame decoding state
#[derive(Debug, Default)]
struct FrameState {
    /// Last slot index seen in this frame
    slot: Option<usize>,
    /// Passing record under construction (passing frames only)
    passing: Option<PassingRecord>,
    /// Record committed by this frame
    committed: Option<PassingRecord>,
}

impl FrameState {
    fn slot_or_first(&self) -> usize {
        self.slot.unwrap_or(0)
    }
}

/// Decoder for complete LapRF frames
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    crc: Arc<Crc16>,
}

impl RecordDecoder {
    /// Create a decoder sharing a verified CRC engine
    ///
    /// # Arguments
    ///
    /// * `crc` - Engine returned by [`Crc16::new`]
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use laprf::codec::crc::Crc16;
    /// use laprf::codec::decoder::RecordDecoder;
    ///
    /// let decoder = RecordDecoder::new(Arc::new(Crc16::new().unwrap()));
    /// ```
    pub fn new(crc: Arc<Crc16>) -> Self {
        Self { crc }
    }

    /// Decode one raw (still escaped) frame and apply it to `device`
    ///
    /// # Arguments
    ///
    /// * `raw` - One extracted frame, SOR through EOR, still escaped
    /// * `device` - Model the frame's fields are applied to
    /// * `now` - Host wall-clock time in seconds, used to correlate RTC
    ///   answers with the host clock
    ///
    /// # Returns
    ///
    /// * `Event` - What the frame changed
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] describing why the frame was rejected. The
    /// caller is expected to log and drop it.
    pub fn decode(&self, raw: &[u8], device: &mut Device, now: f64) -> Result<Event, FrameError> {
        let mut packet = unescape_bytes(raw);

        if packet.len() < MIN_FRAME_SIZE {
            return Err(FrameError::TooShort(packet.len()));
        }

        if packet[0] != SOR {
            return Err(FrameError::MissingStart(packet[0]));
        }

        let declared_length =
            u16::from_le_bytes([packet[LENGTH_OFFSET], packet[LENGTH_OFFSET + 1]]);
        let received_crc = u16::from_le_bytes([packet[CRC_OFFSET], packet[CRC_OFFSET + 1]]);
        packet[CRC_OFFSET] = 0;
        packet[CRC_OFFSET + 1] = 0;

        let computed_crc = self.crc.compute(&packet);
        if computed_crc != received_crc {
            return Err(FrameError::CrcMismatch {
                received: received_crc,
                computed: computed_crc,
            });
        }

        let type_code = u16::from_le_bytes([packet[TYPE_OFFSET], packet[TYPE_OFFSET + 1]]);
        let record_type = RecordType::try_from(type_code)?;

        trace!(
            "Decoding {:?} record (declared length {}, actual {})",
            record_type,
            declared_length,
            packet.len()
        );

        let mut state = FrameState::default();
        if record_type == RecordType::Passing {
            state.passing = Some(PassingRecord::default());
        }

        // Body still carries the trailing EOR; a field needs more than 3 bytes left
        let body = &packet[HEADER_SIZE..];
        let mut pos = 0;
        while body.len() - pos > 3 {
            let tag = body[pos];
            let declared = body[pos + 1] as usize;
            pos += 2;

            let remaining = body.len() - pos;
            if declared > remaining {
                return Err(FrameError::TruncatedField {
                    tag,
                    declared,
                    remaining,
                });
            }

            let field = Field {
                tag,
                value: &body[pos..pos + declared],
            };
            pos += declared;

            let known = match record_type {
                RecordType::Rssi => apply_rssi(field, device, &mut state)?,
                RecordType::RfSetup => apply_rf_setup(field, device, &mut state)?,
                RecordType::StateControl => apply_state_control(field, device),
                RecordType::Settings => apply_settings(field, device),
                RecordType::Passing => apply_passing(field, device, &mut state),
                RecordType::Status => apply_status(field, device, &mut state)?,
                RecordType::Time => apply_time(field, device, now),
                RecordType::Descriptor => {
                    trace!("Descriptor field 0x{:02X}: {:02X?}", field.tag, field.value);
                    true
                }
                RecordType::Error => true,
            };

            if !known {
                debug!(
                    "Record type 0x{:04X}: unknown field 0x{:02X} ({} bytes) skipped",
                    type_code,
                    field.tag,
                    field.value.len()
                );
            }
        }

        Ok(match record_type {
            RecordType::Rssi => Event::RssiUpdated {
                slot: state.slot_or_first(),
            },
            RecordType::RfSetup => Event::RfSetupRead {
                slot: state.slot_or_first(),
            },
            RecordType::Settings => Event::SettingsUpdated,
            RecordType::Time => Event::TimeUpdated,
            RecordType::Status | RecordType::StateControl => Event::StatusUpdated,
            RecordType::Passing => match state.committed {
                Some(record) => Event::PassingRecordRead { record },
                None => Event::NoOp,
            },
            RecordType::Descriptor | RecordType::Error => Event::NoOp,
        })
    }
}

/// Store a decoded value, logging fields whose width does not fit the target
fn set<T>(target: &mut T, value: Option<T>, field: Field<'_>) {
    match value {
        Some(value) => *target = value,
        None => debug!(
            "Field 0x{:02X} has unusable width {}",
            field.tag,
            field.value.len()
        ),
    }
}

fn apply_rssi(
    field: Field<'_>,
    device: &mut Device,
    state: &mut FrameState,
) -> Result<bool, FrameError> {
    let rssi = &mut device.rssi_per_slot[state.slot_or_first()];
    match field.tag {
        rssi_field::SLOT_INDEX => state.slot = field.slot()?.or(state.slot),
        rssi_field::MIN_RSSI => set(&mut rssi.min_rssi, field.f32(), field),
        rssi_field::MAX_RSSI => set(&mut rssi.max_rssi, field.f32(), field),
        rssi_field::MEAN_RSSI => set(&mut rssi.mean_rssi, field.f32(), field),
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_rf_setup(
    field: Field<'_>,
    device: &mut Device,
    state: &mut FrameState,
) -> Result<bool, FrameError> {
    let setup = &mut device.rf_setup_per_slot[state.slot_or_first()];
    match field.tag {
        rf_setup_field::SLOT_INDEX => state.slot = field.slot()?.or(state.slot),
        rf_setup_field::ENABLED => set(&mut setup.enabled, field.u16(), field),
        rf_setup_field::CHANNEL => set(&mut setup.channel, field.u16(), field),
        rf_setup_field::BAND => set(&mut setup.band, field.u16(), field),
        rf_setup_field::THRESHOLD => set(&mut setup.threshold, field.f32(), field),
        rf_setup_field::GAIN => set(&mut setup.gain, field.u16(), field),
        rf_setup_field::FREQUENCY => set(&mut setup.frequency, field.u16(), field),
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_state_control(field: Field<'_>, device: &mut Device) -> bool {
    match field.tag {
        state_control_field::GATE_STATE => {
            set(&mut device.gate_state, field.u8().map(GateState::from_wire), field)
        }
        _ => return false,
    }
    true
}

fn apply_settings(field: Field<'_>, device: &mut Device) -> bool {
    match field.tag {
        settings_field::MIN_LAP_TIME => set(&mut device.min_lap_time, field.u32(), field),
        // Only ever written by the host
        settings_field::STATUS_INTERVAL => {}
        _ => return false,
    }
    true
}

fn apply_passing(field: Field<'_>, device: &mut Device, state: &mut FrameState) -> bool {
    let known = matches!(
        field.tag,
        passing_field::SLOT_INDEX
            | passing_field::RTC_TIME
            | passing_field::DECODER_ID
            | passing_field::PASSING_NUMBER
            | passing_field::PEAK_HEIGHT
            | passing_field::FLAGS
    );
    if !known {
        return false;
    }

    // The builder is consumed when RTC time arrives; later fields in the
    // same frame have nowhere to go.
    let Some(record) = state.passing.as_mut() else {
        debug!(
            "Passing field 0x{:02X} after record commit dropped",
            field.tag
        );
        return true;
    };

    match field.tag {
        passing_field::SLOT_INDEX => set(
            &mut record.pilot_id,
            field.u8().map(|wire| wire.saturating_sub(1)),
            field,
        ),
        passing_field::DECODER_ID => set(&mut record.decoder_id, field.u32(), field),
        passing_field::PASSING_NUMBER => set(&mut record.passing_number, field.u32(), field),
        passing_field::PEAK_HEIGHT => set(&mut record.peak_height, field.u16(), field),
        passing_field::FLAGS => set(&mut record.flags, field.u16(), field),
        passing_field::RTC_TIME => {
            set(&mut record.rtc_time, field.u64(), field);
            if let Some(record) = state.passing.take() {
                state.committed = Some(device.commit_passing_record(record));
            }
        }
        _ => {}
    }
    true
}

fn apply_status(
    field: Field<'_>,
    device: &mut Device,
    state: &mut FrameState,
) -> Result<bool, FrameError> {
    match field.tag {
        status_field::SLOT_INDEX => state.slot = field.slot()?.or(state.slot),
        status_field::FLAGS => set(&mut device.status_flags, field.u16(), field),
        status_field::BATTERY_VOLTAGE => set(
            &mut device.battery_voltage,
            field.u16().map(|millivolts| millivolts as f32 / 1000.0),
            field,
        ),
        status_field::LAST_RSSI => match state.slot {
            Some(slot) => set(&mut device.rssi_per_slot[slot].last_rssi, field.f32(), field),
            None => debug!("Status last RSSI without a preceding slot index skipped"),
        },
        status_field::GATE_STATE => {
            set(&mut device.gate_state, field.u8().map(GateState::from_wire), field)
        }
        status_field::DETECTION_COUNT => set(&mut device.detection_count, field.u32(), field),
        _ => return Ok(false),
    }
    Ok(true)
}

fn apply_time(field: Field<'_>, device: &mut Device, now: f64) -> bool {
    match field.tag {
        time_field::RTC_TIME => match field.u64() {
            Some(rtc_time) => device.update_rtc_time(rtc_time, now),
            None => debug!("Time field 0x{:02X} has unusable width", field.tag),
        },
        // Reported alongside the RTC; never used for correlation
        time_field::TIME_RTC_TIME => set(&mut device.time_rtc_time, field.u64(), field),
        _ => return false,
    }
    true
}

/// Log a rejected frame at a level matching its cause
pub(crate) fn log_rejected(error: &FrameError, raw: &[u8]) {
    match error {
        FrameError::UnknownRecordType(_) => warn!("Dropping frame: {}", error),
        _ => debug!("Dropping frame: {} ({} bytes)", error, raw.len()),
    }
}

//! # Events
//!
//! One event is produced for every frame that decodes successfully, in frame
//! arrival order.

use serde::Serialize;

use crate::device::PassingRecord;

/// Semantic outcome of one decoded frame
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// RSSI statistics changed for a slot (0-based)
    RssiUpdated { slot: usize },
    /// RF setup was reported for a slot (0-based)
    RfSetupRead { slot: usize },
    /// Device RTC was reported
    TimeUpdated,
    /// Device settings were reported
    SettingsUpdated,
    /// A passing record was committed
    PassingRecordRead { record: PassingRecord },
    /// Status fields (battery, gate state, counters, last RSSI) changed
    StatusUpdated,
    /// Frame decoded but carried nothing to report
    NoOp,
}

impl Event {
    /// Slot the event refers to, if any
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::RssiUpdated { slot } | Self::RfSetupRead { slot } => Some(*slot),
            Self::PassingRecordRead { record } => Some(record.pilot_id as usize),
            _ => None,
        }
    }
}

//! # Device Model
//!
//! Mutable state of one LapRF timer as seen through the protocol. The
//! decoder writes it field by field; commands read from it. Slot indices
//! here are 0-based; conversion from the 1-based wire form happens in the
//! codec.

use serde::Serialize;

/// Number of RF slots tracked per device
pub const MAX_SLOTS: usize = 16;

/// Device RTC ticks per second (the RTC counts microseconds)
pub const RTC_TICKS_PER_SECOND: f64 = 1_000_000.0;

/// Coarse device operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    #[default]
    Idle,
    Active,
    Crashed,
    Shutdown,
}

impl GateState {
    /// Map a wire value; anything unrecognised is treated as idle
    pub fn from_wire(value: u8) -> Self {
        match value {
            1 => Self::Active,
            2 => Self::Crashed,
            3 => Self::Shutdown,
            _ => Self::Idle,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Active => 1,
            Self::Crashed => 2,
            Self::Shutdown => 3,
        }
    }
}

/// Transmitter power class of the pilots racing on a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePower {
    Tx25mw,
    Tx200mw,
    Tx350mw,
    Tx600mw,
}

impl RacePower {
    fn base_gain(self) -> i32 {
        match self {
            Self::Tx25mw => 58,
            Self::Tx200mw => 44,
            Self::Tx350mw => 40,
            Self::Tx600mw => 34,
        }
    }
}

/// Gain adjustment applied on top of the race power base gain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    SubSub,
    Sub,
    Normal,
    Add,
    AddAdd,
}

impl Sensitivity {
    fn offset(self) -> i32 {
        match self {
            Self::SubSub => -4,
            Self::Sub => -2,
            Self::Normal => 0,
            Self::Add => 2,
            Self::AddAdd => 4,
        }
    }
}

/// Per-slot RF configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RfSetup {
    pub enabled: u16,
    pub channel: u16,
    pub band: u16,
    pub gain: u16,
    pub threshold: f32,
    /// Receiver frequency in MHz
    pub frequency: u16,
}

impl RfSetup {
    /// Receiver gain for a race power class and sensitivity, floored at 0
    pub fn calculate_gain(race_power: RacePower, sensitivity: Sensitivity) -> u16 {
        (race_power.base_gain() + sensitivity.offset()).max(0) as u16
    }
}

impl Default for RfSetup {
    fn default() -> Self {
        Self {
            enabled: 0,
            channel: 0,
            band: 0,
            gain: Self::calculate_gain(RacePower::Tx25mw, Sensitivity::Normal),
            threshold: 900.0,
            frequency: 0,
        }
    }
}

/// Per-slot RSSI statistics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RssiRecord {
    pub min_rssi: f32,
    pub max_rssi: f32,
    pub mean_rssi: f32,
    pub last_rssi: f32,
}

/// One completed gate passing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PassingRecord {
    /// 0-based slot of the pilot
    pub pilot_id: u8,
    pub passing_number: u32,
    /// Device RTC in microseconds
    pub rtc_time: u64,
    pub decoder_id: u32,
    pub peak_height: u16,
    pub flags: u16,
    /// Host-correlated passing time in seconds, fixed at commit
    pub local_time: f64,
}

/// State of one LapRF device for the lifetime of a connection
#[derive(Debug, Clone)]
pub struct Device {
    pub rf_setup_per_slot: [RfSetup; MAX_SLOTS],
    pub rssi_per_slot: [RssiRecord; MAX_SLOTS],
    pub passing_records: Vec<PassingRecord>,
    pub gate_state: GateState,
    /// Battery voltage in volts
    pub battery_voltage: f32,
    pub detection_count: u32,
    /// Minimum lap time in milliseconds
    pub min_lap_time: u32,
    pub status_flags: u16,
    /// Device RTC in microseconds, as last reported
    pub rtc_time: u64,
    /// Device-reported time-rtc-time value (tag 0x20), microseconds
    pub time_rtc_time: u64,
    /// Offset (seconds) that maps device RTC seconds onto host wall-clock seconds
    pub rtc_time_local_seconds: f64,
    rtc_time_requested_at: Option<f64>,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            rf_setup_per_slot: [RfSetup::default(); MAX_SLOTS],
            rssi_per_slot: [RssiRecord::default(); MAX_SLOTS],
            passing_records: Vec::new(),
            gate_state: GateState::Idle,
            battery_voltage: 0.0,
            detection_count: 0,
            min_lap_time: 0,
            status_flags: 0,
            rtc_time: 0,
            time_rtc_time: 0,
            rtc_time_local_seconds: 0.0,
            rtc_time_requested_at: None,
        }
    }
}

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember when an RTC time request left the host (wall-clock seconds)
    pub fn mark_rtc_time_requested(&mut self, now: f64) {
        self.rtc_time_requested_at = Some(now);
    }

    /// Whether an RTC time request is still waiting for its answer
    pub fn rtc_time_request_pending(&self) -> bool {
        self.rtc_time_requested_at.is_some()
    }

    /// Store a reported RTC value and, if a request is pending, correlate it
    /// with the host clock using half the round trip as the latency estimate.
    pub fn update_rtc_time(&mut self, rtc_time: u64, now: f64) {
        self.rtc_time = rtc_time;

        if let Some(requested_at) = self.rtc_time_requested_at.take() {
            let latency = (now - requested_at) * 0.5;
            self.rtc_time_local_seconds = (now - latency) - rtc_seconds(rtc_time);
        }
    }

    /// Append a passing record, stamping it with the current correlation
    pub fn commit_passing_record(&mut self, mut record: PassingRecord) -> PassingRecord {
        record.local_time = rtc_seconds(record.rtc_time) + self.rtc_time_local_seconds;
        self.passing_records.push(record);
        record
    }
}

/// Convert device RTC microseconds to seconds
pub fn rtc_seconds(rtc_time: u64) -> f64 {
    rtc_time as f64 / RTC_TICKS_PER_SECOND
}

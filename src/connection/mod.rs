//! # Connection Module
//!
//! Glue between a byte transport and the codec.
//!
//! This module handles:
//! - Accumulating received bytes and extracting frames
//! - Decoding frames into the device model and producing events
//! - Keeping a bounded last-RSSI history per slot
//! - Encoding commands and handing them to a [`ByteSink`]
//!
//! Nothing here locks; calls must be serialised by the caller.

mod history;
pub mod sink;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec::crc::Crc16;
use crate::codec::decoder::{log_rejected, RecordDecoder};
use crate::codec::encoder::{enable_binary_protocol, CommandEncoder};
use crate::codec::extractor::FrameExtractor;
use crate::device::{Device, GateState, RfSetup};
use crate::error::{LapRfError, Result};
use crate::event::Event;

pub use history::{RssiHistory, RSSI_HISTORY_CAPACITY};
pub use sink::ByteSink;

/// Default cap on bytes buffered while waiting for a frame to close
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 4096;

/// Behaviour switches for a [`LapRfConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Refuse commands that change device configuration
    pub read_only: bool,
    /// Discard the accumulation buffer once it grows past this size; 0 disables the cap
    pub max_buffer_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }
}

/// Host wall-clock time in seconds
pub fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// One logical LapRF device reached through a byte transport
#[derive(Debug)]
pub struct LapRfConnection<S: ByteSink> {
    name: String,
    device: Device,
    extractor: FrameExtractor,
    decoder: RecordDecoder,
    encoder: CommandEncoder,
    rssi_history: RssiHistory,
    sink: S,
    options: ConnectionOptions,
}

impl<S: ByteSink> LapRfConnection<S> {
    /// Create a connection sharing an already verified CRC engine
    pub fn new(name: impl Into<String>, sink: S, crc: Arc<Crc16>, options: ConnectionOptions) -> Self {
        Self {
            name: name.into(),
            device: Device::new(),
            extractor: FrameExtractor::new(),
            decoder: RecordDecoder::new(Arc::clone(&crc)),
            encoder: CommandEncoder::new(crc),
            rssi_history: RssiHistory::default(),
            sink,
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn options(&self) -> ConnectionOptions {
        self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Last-RSSI samples for a 0-based slot, oldest first
    pub fn last_rssi(&self, slot: usize) -> Option<&std::collections::VecDeque<f32>> {
        self.rssi_history.slot(slot)
    }

    /// Ingest bytes from the transport, returning one event per decoded frame
    pub fn on_bytes_received(&mut self, bytes: &[u8]) -> Vec<Event> {
        self.on_bytes_received_at(bytes, now_seconds())
    }

    /// As [`on_bytes_received`](Self::on_bytes_received) with an explicit receive time
    pub fn on_bytes_received_at(&mut self, bytes: &[u8], now: f64) -> Vec<Event> {
        self.extractor.extend(bytes);

        let mut events = Vec::new();
        while let Some(frame) = self.extractor.next_frame() {
            match self.decoder.decode(&frame, &mut self.device, now) {
                Ok(event) => {
                    if let Event::RssiUpdated { slot } = event {
                        let last = self.device.rssi_per_slot[slot].last_rssi;
                        self.rssi_history.push(slot, last);
                    }
                    events.push(event);
                }
                Err(e) => log_rejected(&e, &frame),
            }
        }

        let cap = self.options.max_buffer_bytes;
        if cap > 0 && self.extractor.len() > cap {
            warn!(
                "{}: {} bytes buffered without a frame end, discarding",
                self.name,
                self.extractor.len()
            );
            self.extractor.clear();
        }

        events
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        debug!("{}: sending {} bytes", self.name, bytes.len());
        self.sink.send(bytes)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.options.read_only {
            return Err(LapRfError::ReadOnly);
        }
        Ok(())
    }

    /// Switch the puck into binary protocol mode (restart required)
    ///
    /// A mode switch rather than a configuration write, so it is allowed on
    /// read-only connections.
    pub fn enable_binary_protocol(&mut self) -> Result<()> {
        info!("{}: enabling binary protocol", self.name);
        self.send(&enable_binary_protocol())
    }

    pub fn request_descriptor(&mut self) -> Result<()> {
        let bytes = self.encoder.request_descriptor();
        self.send(&bytes)
    }

    pub fn request_rf_setup(&mut self) -> Result<()> {
        let bytes = self.encoder.request_rf_setup();
        self.send(&bytes)
    }

    pub fn request_rf_setup_for_slot(&mut self, slot: usize) -> Result<()> {
        let bytes = self.encoder.request_rf_setup_for_slot(slot)?;
        self.send(&bytes)
    }

    pub fn request_settings(&mut self) -> Result<()> {
        let bytes = self.encoder.request_settings();
        self.send(&bytes)
    }

    pub fn request_rtc_time(&mut self) -> Result<()> {
        self.request_rtc_time_at(now_seconds())
    }

    /// Request the device RTC, recording `now` as the send time
    pub fn request_rtc_time_at(&mut self, now: f64) -> Result<()> {
        let bytes = self.encoder.request_rtc_time(&mut self.device, now);
        self.send(&bytes)
    }

    pub fn reset_rtc_time(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.reset_rtc_time();
        self.send(&bytes)
    }

    pub fn configure_pilot_slot(&mut self, slot: usize, config: &RfSetup) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.configure_pilot_slot(slot, config)?;
        self.send(&bytes)
    }

    pub fn configure_pilot_slots(&mut self, slots: &[RfSetup]) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.configure_pilot_slots(slots)?;
        self.send(&bytes)
    }

    /// Command a gate state; the model is updated without waiting for the device
    pub fn set_gate_state(&mut self, state: GateState) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.set_gate_state(state);
        self.device.gate_state = state;
        self.send(&bytes)
    }

    pub fn set_min_lap_time(&mut self, milliseconds: u32) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.set_min_lap_time(milliseconds);
        self.send(&bytes)
    }

    pub fn set_rssi_packet_rate(&mut self, milliseconds: u32) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.set_rssi_packet_rate(milliseconds);
        self.send(&bytes)
    }

    pub fn set_status_message_interval(&mut self, milliseconds: u16) -> Result<()> {
        self.ensure_writable()?;
        let bytes = self.encoder.set_status_message_interval(milliseconds);
        self.send(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::sink::MockByteSink;
    use super::*;
    use crate::codec::protocol::{EOR, SOR};

    fn crc() -> Arc<Crc16> {
        Arc::new(Crc16::new().unwrap())
    }

    fn loopback(options: ConnectionOptions) -> LapRfConnection<Vec<u8>> {
        LapRfConnection::new("test", Vec::new(), crc(), options)
    }

    fn encoder() -> CommandEncoder {
        CommandEncoder::new(crc())
    }

    /// A status frame carrying one slot's last RSSI
    fn status_frame(wire_slot: u8, last_rssi: f32) -> Vec<u8> {
        let crc = crc();
        let mut builder =
            crate::codec::encoder::FrameBuilder::new(&crc, crate::codec::protocol::RecordType::Status);
        builder
            .field(0x01, wire_slot)
            .field(0x22, last_rssi);
        builder.finish()
    }

    #[test]
    fn test_two_back_to_back_frames() {
        let mut connection = loopback(ConnectionOptions::default());
        let mut bytes = encoder().configure_pilot_slot(0, &RfSetup::default()).unwrap();
        bytes.extend(encoder().set_min_lap_time(3000));

        let events = connection.on_bytes_received_at(&bytes, 0.0);

        assert_eq!(
            events,
            vec![Event::RfSetupRead { slot: 0 }, Event::SettingsUpdated]
        );
        assert_eq!(connection.device().min_lap_time, 3000);
        assert!(connection.extractor.is_empty());
    }

    #[test]
    fn test_garbage_then_frame() {
        let mut connection = loopback(ConnectionOptions::default());
        let mut bytes = vec![0x00, 0x13, EOR, 0xFF, 0x42];
        bytes.extend(encoder().set_min_lap_time(1500));

        let events = connection.on_bytes_received_at(&bytes, 0.0);

        assert_eq!(events, vec![Event::SettingsUpdated]);
        assert_eq!(connection.device().min_lap_time, 1500);
    }

    #[test]
    fn test_corrupt_frame_dropped_next_frame_decoded() {
        let mut connection = loopback(ConnectionOptions::default());
        let mut corrupt = encoder().set_min_lap_time(1000);
        let last = corrupt.len() - 2;
        corrupt[last] ^= 0x01;

        let mut bytes = corrupt;
        bytes.extend(encoder().set_min_lap_time(2000));

        let events = connection.on_bytes_received_at(&bytes, 0.0);
        assert_eq!(events, vec![Event::SettingsUpdated]);
        assert_eq!(connection.device().min_lap_time, 2000);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut connection = loopback(ConnectionOptions::default());
        let frame = encoder().set_min_lap_time(4000);
        let (head, tail) = frame.split_at(5);

        assert!(connection.on_bytes_received_at(head, 0.0).is_empty());
        assert_eq!(
            connection.on_bytes_received_at(tail, 0.0),
            vec![Event::SettingsUpdated]
        );
    }

    #[test]
    fn test_buffer_cap_discards_unterminated_frame() {
        let mut connection = loopback(ConnectionOptions {
            read_only: false,
            max_buffer_bytes: 16,
        });

        let mut bytes = vec![SOR];
        bytes.extend(std::iter::repeat(0x11).take(32));
        assert!(connection.on_bytes_received_at(&bytes, 0.0).is_empty());
        assert!(connection.extractor.is_empty());

        let events = connection.on_bytes_received_at(&encoder().set_min_lap_time(10), 0.0);
        assert_eq!(events, vec![Event::SettingsUpdated]);
    }

    #[test]
    fn test_rssi_history_follows_rssi_events() {
        let mut connection = loopback(ConnectionOptions::default());

        connection.on_bytes_received_at(&status_frame(2, 321.0), 0.0);
        // Self-consumed RSSI rate command decodes as an RSSI record for slot 0
        connection.on_bytes_received_at(&encoder().set_rssi_packet_rate(100), 0.0);

        let crc = crc();
        let mut builder =
            crate::codec::encoder::FrameBuilder::new(&crc, crate::codec::protocol::RecordType::Rssi);
        builder.field(0x01, 2u8).field(0x20, 10.0f32);
        let events = connection.on_bytes_received_at(&builder.finish(), 0.0);

        assert_eq!(events, vec![Event::RssiUpdated { slot: 1 }]);
        assert_eq!(connection.last_rssi(1).unwrap().iter().copied().collect::<Vec<_>>(), vec![321.0]);
        assert_eq!(connection.last_rssi(0).unwrap().len(), 1);
    }

    #[test]
    fn test_self_consumed_rssi_rate_command_does_not_panic() {
        let mut connection = loopback(ConnectionOptions::default());
        let bytes = encoder().set_rssi_packet_rate(0);
        let events = connection.on_bytes_received_at(&bytes, 0.0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_rtc_round_trip_correlation() {
        let mut connection = loopback(ConnectionOptions::default());
        connection.request_rtc_time_at(100.0).unwrap();
        assert!(connection.device().rtc_time_request_pending());

        let crc = crc();
        let mut builder =
            crate::codec::encoder::FrameBuilder::new(&crc, crate::codec::protocol::RecordType::Time);
        builder.field(0x02, 60_000_000u64);
        let events = connection.on_bytes_received_at(&builder.finish(), 100.4);

        assert_eq!(events, vec![Event::TimeUpdated]);
        // (100.4 - 0.2) - 60
        assert!((connection.device().rtc_time_local_seconds - 40.2).abs() < 1e-9);
    }

    #[test]
    fn test_read_only_refuses_writes_but_allows_requests() {
        let mut connection = loopback(ConnectionOptions {
            read_only: true,
            ..Default::default()
        });

        assert!(matches!(connection.set_min_lap_time(1000), Err(LapRfError::ReadOnly)));
        assert!(matches!(
            connection.set_gate_state(GateState::Active),
            Err(LapRfError::ReadOnly)
        ));
        assert!(matches!(connection.reset_rtc_time(), Err(LapRfError::ReadOnly)));
        assert!(connection.sink().is_empty());
        assert_eq!(connection.device().gate_state, GateState::Idle);

        connection.request_rf_setup().unwrap();
        connection.request_settings().unwrap();
        assert!(!connection.sink().is_empty());
    }

    #[test]
    fn test_set_gate_state_updates_model() {
        let mut connection = loopback(ConnectionOptions::default());
        connection.set_gate_state(GateState::Active).unwrap();
        assert_eq!(connection.device().gate_state, GateState::Active);
        assert_eq!(connection.sink(), &encoder().set_gate_state(GateState::Active));
    }

    #[test]
    fn test_commands_reach_sink() {
        let expected = encoder().configure_pilot_slot(3, &RfSetup::default()).unwrap();

        let mut sink = MockByteSink::new();
        sink.expect_send()
            .withf(move |bytes: &[u8]| bytes == expected.as_slice())
            .times(1)
            .returning(|_| Ok(()));

        let mut connection =
            LapRfConnection::new("mock", sink, crc(), ConnectionOptions::default());
        connection.configure_pilot_slot(3, &RfSetup::default()).unwrap();
    }

    #[test]
    fn test_sink_error_propagates() {
        let mut sink = MockByteSink::new();
        sink.expect_send()
            .returning(|_| Err(LapRfError::TransportClosed));

        let mut connection =
            LapRfConnection::new("mock", sink, crc(), ConnectionOptions::default());
        assert!(matches!(
            connection.request_descriptor(),
            Err(LapRfError::TransportClosed)
        ));
    }

    #[test]
    fn test_invalid_slot_not_sent() {
        let mut sink = MockByteSink::new();
        sink.expect_send().times(0);

        let mut connection =
            LapRfConnection::new("mock", sink, crc(), ConnectionOptions::default());
        assert!(matches!(
            connection.request_rf_setup_for_slot(99),
            Err(LapRfError::InvalidSlot(99))
        ));
    }

    #[test]
    fn test_enable_binary_protocol_sends_ascii() {
        let mut connection = loopback(ConnectionOptions::default());
        connection.enable_binary_protocol().unwrap();
        assert_eq!(connection.sink().as_slice(), b"Upp\r\n");
    }

    #[test]
    fn test_enable_binary_protocol_allowed_when_read_only() {
        let mut connection = loopback(ConnectionOptions {
            read_only: true,
            ..Default::default()
        });
        connection.enable_binary_protocol().unwrap();
        assert_eq!(connection.sink().as_slice(), b"Upp\r\n");
    }
}

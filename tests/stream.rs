//! End-to-end byte streams through a loopback connection

use std::sync::Arc;

use laprf::codec::encoder::{CommandEncoder, FrameBuilder};
use laprf::codec::protocol::{passing_field, status_field, time_field, RecordType, EOR, SOR};
use laprf::{ConnectionOptions, Crc16, Event, GateState, LapRfConnection, RfSetup};

fn crc() -> Arc<Crc16> {
    Arc::new(Crc16::new().unwrap())
}

fn connection() -> LapRfConnection<Vec<u8>> {
    LapRfConnection::new("loopback", Vec::new(), crc(), ConnectionOptions::default())
}

fn passing_frame(wire_slot: u8, passing_number: u32, rtc_time: u64) -> Vec<u8> {
    let crc = crc();
    let mut builder = FrameBuilder::new(&crc, RecordType::Passing);
    builder
        .field(passing_field::SLOT_INDEX, wire_slot)
        .field(passing_field::DECODER_ID, 0x0001_0203u32)
        .field(passing_field::PASSING_NUMBER, passing_number)
        .field(passing_field::PEAK_HEIGHT, 1200u16)
        .field(passing_field::FLAGS, 0u16)
        .field(passing_field::RTC_TIME, rtc_time);
    builder.finish()
}

fn time_frame(rtc_time: u64) -> Vec<u8> {
    let crc = crc();
    let mut builder = FrameBuilder::new(&crc, RecordType::Time);
    builder.field(time_field::RTC_TIME, rtc_time);
    builder.finish()
}

#[test]
fn race_session_stream() {
    let mut connection = connection();

    // Sync the clock: request at 1000.0 s, answer 0.5 s later reporting 10 s of RTC
    connection.request_rtc_time_at(1000.0).unwrap();
    let events = connection.on_bytes_received_at(&time_frame(10_000_000), 1000.5);
    assert_eq!(events, vec![Event::TimeUpdated]);

    let mut stream = Vec::new();
    stream.extend(passing_frame(3, 1, 12_500_000));
    stream.extend([0x00, 0xFF, EOR]);
    stream.extend(passing_frame(5, 2, 14_000_000));

    // Feed one byte at a time
    let mut events = Vec::new();
    for byte in &stream {
        events.extend(connection.on_bytes_received_at(std::slice::from_ref(byte), 1005.0));
    }

    assert_eq!(events.len(), 2);
    let records: Vec<_> = events
        .iter()
        .map(|event| match event {
            Event::PassingRecordRead { record } => *record,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();

    assert_eq!(records[0].pilot_id, 2);
    assert_eq!(records[0].passing_number, 1);
    assert_eq!(records[0].decoder_id, 0x0001_0203);
    assert_eq!(records[0].peak_height, 1200);
    assert_eq!(records[1].pilot_id, 4);
    assert_eq!(records[1].rtc_time, 14_000_000);

    // Offset = (1000.5 - 0.25) - 10.0 = 990.25
    assert!((records[0].local_time - 1002.75).abs() < 1e-6);
    assert!((records[1].local_time - 1004.25).abs() < 1e-6);
    assert_eq!(connection.device().passing_records.len(), 2);
}

#[test]
fn configuration_loopback_updates_every_slot() {
    let mut connection = connection();

    let setups: Vec<RfSetup> = (0..8u16)
        .map(|i| RfSetup {
            enabled: 1,
            channel: i + 1,
            band: 4,
            frequency: 5658 + i * 37,
            ..RfSetup::default()
        })
        .collect();

    connection.configure_pilot_slots(&setups).unwrap();
    let sent = connection.sink().clone();

    let events = connection.on_bytes_received_at(&sent, 0.0);
    assert_eq!(events, vec![Event::RfSetupRead { slot: 7 }]);

    for (slot, setup) in setups.iter().enumerate() {
        assert_eq!(&connection.device().rf_setup_per_slot[slot], setup);
    }
}

#[test]
fn status_and_gate_state() {
    let mut connection = connection();
    connection.set_gate_state(GateState::Active).unwrap();

    let crc = crc();
    let mut builder = FrameBuilder::new(&crc, RecordType::Status);
    builder
        .field(status_field::BATTERY_VOLTAGE, 4100u16)
        .field(status_field::GATE_STATE, GateState::Crashed.to_wire())
        .field(status_field::DETECTION_COUNT, 17u32)
        .field(status_field::SLOT_INDEX, 1u8)
        .field(status_field::LAST_RSSI, 880.5f32)
        .field(status_field::SLOT_INDEX, 2u8)
        .field(status_field::LAST_RSSI, 901.0f32);

    let events = connection.on_bytes_received_at(&builder.finish(), 0.0);
    assert_eq!(events, vec![Event::StatusUpdated]);

    let device = connection.device();
    assert!((device.battery_voltage - 4.1).abs() < 1e-6);
    assert_eq!(device.gate_state, GateState::Crashed);
    assert_eq!(device.detection_count, 17);
    assert_eq!(device.rssi_per_slot[0].last_rssi, 880.5);
    assert_eq!(device.rssi_per_slot[1].last_rssi, 901.0);
}

#[test]
fn bad_frames_do_not_stop_the_stream() {
    let mut connection = connection();
    let encoder = CommandEncoder::new(crc());

    let mut stream = Vec::new();
    // Unknown record type with a valid CRC
    let mut unknown = vec![SOR, 0x09, 0x00, 0x00, 0x00, 0x34, 0x12, 0x00, EOR];
    let checksum = Crc16::new().unwrap().compute(&unknown);
    unknown[3..5].copy_from_slice(&checksum.to_le_bytes());
    stream.extend(laprf::codec::escape::escape_bytes(&unknown));
    // Too short
    stream.extend([SOR, 0x01, EOR]);
    // Valid
    stream.extend(encoder.set_min_lap_time(7000));

    let events = connection.on_bytes_received_at(&stream, 0.0);
    assert_eq!(events, vec![Event::SettingsUpdated]);
    assert_eq!(connection.device().min_lap_time, 7000);
}

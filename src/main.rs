//! # LapRF Monitor
//!
//! Connects to a LapRF timer over USB serial or TCP and prints every decoded
//! event until Ctrl+C or disconnect.
//!
//! # Usage
//!
//! ```bash
//! laprf-monitor [config.toml]
//! ```
//!
//! Without a configuration file the defaults are used: serial transport,
//! auto-detected port, 115200 baud.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use laprf::config::{Config, DeviceConfig, LoggingConfig, TransportKind};
use laprf::connection::{ByteSink, LapRfConnection};
use laprf::transport::{connect_tcp, run_transport, SerialTransport};
use laprf::{Crc16, Event};

type QueuedConnection = LapRfConnection<mpsc::UnboundedSender<Vec<u8>>>;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading {}", path))?,
        None => Config::default(),
    };

    let _guard = init_logging(&config.logging)?;
    info!("LapRF Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let crc = Arc::new(Crc16::new()?);
    let (tx, mut rx) = mpsc::unbounded_channel();

    match config.connection.transport {
        TransportKind::Serial => {
            let transport = if config.connection.serial_port.is_empty() {
                SerialTransport::open(config.connection.baud_rate)?
            } else {
                SerialTransport::open_with_paths(
                    &[config.connection.serial_port.as_str()],
                    config.connection.baud_rate,
                )?
            };
            let name = transport.device_path().to_string();
            let mut connection =
                LapRfConnection::new(name, tx, crc, config.connection.options());
            monitor(transport.into_stream(), &mut connection, &mut rx, &config).await
        }
        TransportKind::Tcp => {
            let stream = connect_tcp(&config.connection.tcp_host, config.connection.tcp_port).await?;
            let name = format!("{}:{}", config.connection.tcp_host, config.connection.tcp_port);
            let mut connection =
                LapRfConnection::new(name, tx, crc, config.connection.options());
            monitor(stream, &mut connection, &mut rx, &config).await
        }
    }
}

/// Set up console logging plus optional daily-rotated files
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log level")?;

    // Events go to stdout; keep logs on stderr so the two can be separated
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "laprf-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            Ok(None)
        }
    }
}

async fn monitor<T>(
    stream: T,
    connection: &mut QueuedConnection,
    rx: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    config: &Config,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite,
{
    if config.connection.enable_binary_protocol {
        connection.enable_binary_protocol()?;
    }
    send_on_connect(connection, &config.device)?;

    let json = config.logging.json_events;
    let chunk = config.connection.max_write_chunk;

    info!("Monitoring {} (Ctrl+C to exit)", connection.name());

    tokio::select! {
        result = run_transport(stream, connection, rx, chunk, |event| print_event(event, json)) => {
            result?;
            info!("Device disconnected");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}

/// Queue the configured startup commands
fn send_on_connect<S: ByteSink>(
    connection: &mut LapRfConnection<S>,
    device: &DeviceConfig,
) -> laprf::Result<()> {
    if let Some(interval) = device.status_interval_ms {
        connection.set_status_message_interval(interval)?;
    }
    if let Some(rate) = device.rssi_packet_rate_ms {
        connection.set_rssi_packet_rate(rate)?;
    }
    if let Some(min_lap_time) = device.min_lap_time_ms {
        connection.set_min_lap_time(min_lap_time)?;
    }
    if device.request_rf_setup_on_connect {
        connection.request_rf_setup()?;
    }
    if device.request_rtc_time_on_connect {
        connection.request_rtc_time()?;
    }
    Ok(())
}

fn print_event(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialise event: {}", e),
        }
        return;
    }

    match event {
        Event::PassingRecordRead { record } => info!(
            "Passing #{} slot {} at {:.3}s (peak {})",
            record.passing_number,
            record.pilot_id + 1,
            record.local_time,
            record.peak_height
        ),
        Event::NoOp => {}
        other => info!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laprf::codec::encoder::CommandEncoder;
    use laprf::connection::ConnectionOptions;

    fn connection(read_only: bool) -> LapRfConnection<Vec<u8>> {
        let crc = Arc::new(Crc16::new().unwrap());
        LapRfConnection::new(
            "test",
            Vec::new(),
            crc,
            ConnectionOptions {
                read_only,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_on_connect_defaults_request_rf_setup_and_time() {
        let mut connection = connection(false);
        send_on_connect(&mut connection, &DeviceConfig::default()).unwrap();

        let encoder = CommandEncoder::new(Arc::new(Crc16::new().unwrap()));
        let mut expected = encoder.request_rf_setup();
        let mut device = laprf::Device::new();
        expected.extend(encoder.request_rtc_time(&mut device, 0.0));

        assert_eq!(connection.sink(), &expected);
        assert!(connection.device().rtc_time_request_pending());
    }

    #[test]
    fn test_on_connect_configuration_refused_when_read_only() {
        let mut connection = connection(true);
        let device = DeviceConfig {
            min_lap_time_ms: Some(2000),
            ..DeviceConfig::default()
        };

        assert!(matches!(
            send_on_connect(&mut connection, &device),
            Err(laprf::LapRfError::ReadOnly)
        ));
    }
}

//! # Serial Transport
//!
//! USB serial link to a LapRF puck.

use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

use crate::error::{LapRfError, Result};

/// Default LapRF baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Baud rates the puck firmware accepts
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9_600, 19_200, 38_400, 57_600, 115_200, 230_400];

/// Device paths tried when none is configured (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Open serial connection to a LapRF device
pub struct SerialTransport {
    port: SerialStream,
    device_path: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open the first default device path that works
    ///
    /// # Errors
    ///
    /// Returns [`LapRfError::SerialPortNotFound`] if no path could be opened
    pub fn open(baud_rate: u32) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, baud_rate)
    }

    /// Open the first of `paths` that works
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyACM0"])
    /// * `baud_rate` - Line speed
    ///
    /// # Returns
    ///
    /// * `Result<SerialTransport>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened LapRF device at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(LapRfError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open one port as 8N1 without flow control and assert DTR and RTS
    fn open_port(path: &str, baud_rate: u32) -> Result<SerialStream> {
        let mut port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| LapRfError::Serial(format!("Failed to open {}: {}", path, e)))?;

        // The puck stays silent until the host raises both lines
        port.write_data_terminal_ready(true)
            .map_err(|e| LapRfError::Serial(format!("Failed to set DTR on {}: {}", path, e)))?;
        port.write_request_to_send(true)
            .map_err(|e| LapRfError::Serial(format!("Failed to set RTS on {}: {}", path, e)))?;

        Ok(port)
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Hand over the async stream for pumping
    pub fn into_stream(self) -> SerialStream {
        self.port
    }
}

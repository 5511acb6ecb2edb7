//! # Transport Module
//!
//! Byte transports for reaching a LapRF device.
//!
//! This module handles:
//! - Opening the USB serial port (8N1, DTR/RTS asserted)
//! - Connecting to a network bridge over TCP
//! - Pumping bytes between a transport and a [`LapRfConnection`](crate::connection::LapRfConnection)

pub mod pump;
pub mod serial;
pub mod tcp;

pub use pump::run_transport;
pub use serial::SerialTransport;
pub use tcp::connect_tcp;

//! # Transport Pump
//!
//! Drives one transport: received bytes go to the connection, queued
//! command bytes go to the wire. Writes are split into chunks when the
//! transport limits write sizes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::connection::{ByteSink, LapRfConnection};
use crate::error::Result;
use crate::event::Event;

/// Bytes read from the transport per call
const READ_BUFFER_SIZE: usize = 1024;

/// Run until the transport reaches end of stream
///
/// # Arguments
///
/// * `stream` - Serial port, TCP socket or any other byte stream
/// * `connection` - Receives every byte read
/// * `outbound` - Command bytes to write, usually fed by the connection's sink
/// * `max_write_chunk` - Largest single write; 0 writes each message whole
/// * `on_event` - Called for every decoded event, in arrival order
///
/// # Errors
///
/// Returns [`LapRfError::Io`](crate::error::LapRfError::Io) if a read or write fails
pub async fn run_transport<T, S, F>(
    stream: T,
    connection: &mut LapRfConnection<S>,
    outbound: &mut UnboundedReceiver<Vec<u8>>,
    max_write_chunk: usize,
    mut on_event: F,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite,
    S: ByteSink,
    F: FnMut(&Event),
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut outbound_open = true;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    info!("{}: transport closed", connection.name());
                    return Ok(());
                }

                for event in connection.on_bytes_received(&buf[..n]) {
                    on_event(&event);
                }
            }

            message = outbound.recv(), if outbound_open => {
                match message {
                    Some(bytes) => write_chunked(&mut writer, &bytes, max_write_chunk).await?,
                    None => {
                        debug!("{}: command queue closed", connection.name());
                        outbound_open = false;
                    }
                }
            }
        }
    }
}

/// Write `bytes` in pieces of at most `max_chunk` bytes (0 = unlimited)
async fn write_chunked<W>(writer: &mut W, bytes: &[u8], max_chunk: usize) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if max_chunk == 0 {
        writer.write_all(bytes).await?;
    } else {
        for chunk in bytes.chunks(max_chunk) {
            writer.write_all(chunk).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

//! Outbound byte sink abstraction

use tokio::sync::mpsc::UnboundedSender;

use crate::error::{LapRfError, Result};

/// Fire-and-forget destination for encoded command bytes
///
/// Transports that limit write sizes split the bytes themselves.
#[cfg_attr(test, mockall::automock)]
pub trait ByteSink {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Collects everything sent; handy for loopback and inspection
impl ByteSink for Vec<u8> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Queues bytes for a transport task
impl ByteSink for UnboundedSender<Vec<u8>> {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        UnboundedSender::send(self, bytes.to_vec()).map_err(|_| LapRfError::TransportClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_vec_sink_appends() {
        let mut sink: Vec<u8> = Vec::new();
        sink.send(&[1, 2]).unwrap();
        sink.send(&[3]).unwrap();
        assert_eq!(sink, vec![1, 2, 3]);
    }

    #[test]
    fn test_channel_sink_queues_messages() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        ByteSink::send(&mut tx, &[0x5A, 0x5B]).unwrap();
        assert_eq!(rx.try_recv().unwrap(), vec![0x5A, 0x5B]);
    }

    #[test]
    fn test_channel_sink_closed() {
        let (mut tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        drop(rx);
        let result = ByteSink::send(&mut tx, &[0x01]);
        assert!(matches!(result, Err(LapRfError::TransportClosed)));
    }
}

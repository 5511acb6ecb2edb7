//! TCP link to a LapRF network bridge

use tokio::net::TcpStream;
use tracing::info;

use crate::error::Result;

/// Port the LapRF 8-way listens on
pub const DEFAULT_TCP_PORT: u16 = 5403;

/// Connect to `host:port` with Nagle disabled
///
/// # Errors
///
/// Returns [`LapRfError::Io`](crate::error::LapRfError::Io) if the connection fails
pub async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream> {
    let stream = TcpStream::connect((host, port)).await?;
    stream.set_nodelay(true)?;
    info!("Connected to LapRF at {}:{}", host, port);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_and_exchange_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(&[0x5A, 0x5B]).await.unwrap();
        });

        let mut stream = connect_tcp("127.0.0.1", port).await.unwrap();
        let mut buf = [0u8; 2];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [0x5A, 0x5B]);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(connect_tcp("127.0.0.1", port).await.is_err());
    }
}

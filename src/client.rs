#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[test]
    fn test_client_creation() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let client = SessionClient::new(addr);
        assert_eq!(client.addr, addr);
        assert_eq!(client.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_client_with_timeout() {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let client = SessionClient::new(addr).with_timeout(Duration::from_secs(1));
        assert_eq!(client.timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_round_trip_against_echoing_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            write_half.write_all(line.as_bytes()).await.unwrap();
        });

        let client = SessionClient::new(addr);
        let reply = client.round_trip("ping").await.unwrap();
        assert_eq!(reply, "ping");
    }

    #[tokio::test]
    async fn test_connect_failure_is_error() {
        // Nothing listens on this freshly vacated port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = SessionClient::new(addr).with_timeout(Duration::from_secs(1));
        let result = client.round_trip("ping").await;
        assert!(result.is_err());
    }
}

use crate::error::{Result, WardendError};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Line-oriented test client for a worker session. Originating connections
/// is otherwise out of the daemon's hands; this exists for the integration
/// tests and as a minimal usage example.
pub struct SessionClient {
    pub addr: SocketAddr,
    pub timeout: Duration,
}

impl SessionClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connect, send one line, read one line back.
    pub async fn round_trip(&self, request: &str) -> Result<String> {
        let stream = self.connect().await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let request_data = format!("{request}\n");
        timeout(self.timeout, write_half.write_all(request_data.as_bytes()))
            .await
            .map_err(|_| WardendError::Connection("Timeout sending request".to_string()))?
            .map_err(|e| WardendError::Connection(format!("Failed to send request: {e}")))?;

        let mut line = String::new();
        timeout(self.timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| WardendError::Connection("Timeout reading response".to_string()))?
            .map_err(|e| WardendError::Connection(format!("Failed to read response: {e}")))?;

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// True if something accepts connections at the address.
    pub async fn is_server_accepting(&self) -> bool {
        self.connect().await.is_ok()
    }

    async fn connect(&self) -> Result<TcpStream> {
        timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| WardendError::Connection("Timeout connecting to server".to_string()))?
            .map_err(|e| {
                WardendError::Connection(format!("Failed to connect to {}: {e}", self.addr))
            })
    }
}

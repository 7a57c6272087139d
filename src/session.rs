//! Placeholder worker session: a newline-delimited echo exchange.
//!
//! The real protocol a deployment speaks (negotiation, authentication, API
//! dispatch) is intentionally not specified here; this keeps the isolation
//! path exercisable end-to-end. Swap `handle_session` out to change it.


use crate::error::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Serve one connection until the peer disconnects or asks to quit.
pub async fn handle_session(stream: TcpStream) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            debug!("Peer disconnected");
            return Ok(());
        }

        let request = line.trim_end_matches(['\r', '\n']);
        debug!(bytes = bytes_read, request = request, "Session request");

        if request == "quit" {
            write_half.write_all(b"bye\n").await?;
            write_half.shutdown().await?;
            return Ok(());
        }

        write_half.write_all(request.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
    }
}

//! Carriage-return framed transport to the receiver.
//!
//! The control protocol terminates records with a bare `\r` (0x0D) in
//! both directions. The halves are boxed trait objects so a session can
//! run over a real TCP stream or an in-memory duplex pipe in tests.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{AvrError, AvrResult};

/// Record terminator on the wire; there is no trailing newline.
pub const FRAME_DELIMITER: u8 = b'\r';

/// Reading half: yields one payload per `\r`-terminated record.
pub struct LineReader {
    inner: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
}

/// Writing half: appends the delimiter and flushes before returning.
pub struct LineWriter {
    inner: Box<dyn AsyncWrite + Send + Unpin>,
}

impl LineReader {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self { inner: BufReader::new(Box::new(reader)) }
    }

    /// Reads up to the next `\r`, returning the payload without the
    /// delimiter. `Ok(None)` signals EOF from the peer.
    pub async fn read_line(&mut self) -> AvrResult<Option<String>> {
        let mut buf: Vec<u8> = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            let n = self.inner.read(&mut byte).await?;
            if n == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                // Partial record at EOF still gets delivered.
                break;
            }
            if byte[0] == FRAME_DELIMITER {
                break;
            }
            buf.push(byte[0]);
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }
}

impl LineWriter {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self { inner: Box::new(writer) }
    }

    /// Writes `payload` followed by the delimiter and drains the socket.
    pub async fn write_line(&mut self, payload: &str) -> AvrResult<()> {
        self.inner.write_all(payload.as_bytes()).await?;
        self.inner.write_all(&[FRAME_DELIMITER]).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shuts the writing half down; repeated calls are harmless.
    pub async fn close(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}

/// Opens a TCP connection to the receiver and splits it into framed
/// halves. A connect that exceeds `timeout` maps to
/// [`AvrError::ConnectTimeout`]; any other failure is a transport error.
pub async fn connect(
    host: &str,
    port: u16,
    timeout: Duration,
) -> AvrResult<(LineReader, LineWriter)> {
    let addr = format!("{host}:{port}");
    let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| AvrError::ConnectTimeout(addr.clone()))??;
    let (r, w) = stream.into_split();
    Ok((LineReader::new(r), LineWriter::new(w)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_cr_delimited_records() {
        let (client, mut server) = tokio::io::duplex(256);
        let (r, _w) = tokio::io::split(client);
        let mut reader = LineReader::new(r);

        tokio::io::AsyncWriteExt::write_all(&mut server, b"PWON\rMV425\r")
            .await
            .unwrap();
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PWON"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("MV425"));
    }

    #[tokio::test]
    async fn eof_yields_none() {
        let (client, server) = tokio::io::duplex(64);
        let (r, _w) = tokio::io::split(client);
        let mut reader = LineReader::new(r);
        drop(server);
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn partial_record_at_eof_is_delivered() {
        let (client, mut server) = tokio::io::duplex(64);
        let (r, _w) = tokio::io::split(client);
        let mut reader = LineReader::new(r);

        tokio::io::AsyncWriteExt::write_all(&mut server, b"PWSTAND")
            .await
            .unwrap();
        drop(server);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PWSTAND"));
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_line_appends_delimiter() {
        let (client, server) = tokio::io::duplex(256);
        let (_r, w) = tokio::io::split(client);
        let mut writer = LineWriter::new(w);
        let (mut sr, _sw) = tokio::io::split(server);

        writer.write_line("MV425").await.unwrap();
        let mut buf = [0u8; 6];
        tokio::io::AsyncReadExt::read_exact(&mut sr, &mut buf)
            .await
            .unwrap();
        assert_eq!(&buf, b"MV425\r");
    }

}

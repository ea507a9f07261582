//! Serial port transport built on tokio-serial.

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::{self, Instant};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use super::Transport;
use crate::config::SerialConfig;
use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Largest single read handed to the port.
const READ_CHUNK: usize = 256;

/// A serial port opened for exclusive use. The port is closed when the
/// transport is dropped.
pub struct SerialTransport {
    port: SerialStream,
    path: String,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open the port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = tokio_serial::new(config.port_path.as_str(), config.baud_rate)
            .open_native_async()
            .map_err(|source| Error::TransportUnavailable {
                path: config.port_path.clone(),
                source,
            })?;

        debug!(
            port = %config.port_path,
            baud = config.baud_rate,
            timeout_ms = config.read_timeout.as_millis() as u64,
            "Opened serial port"
        );

        Ok(Self {
            port,
            path: config.port_path.clone(),
            read_timeout: config.read_timeout,
        })
    }

    /// Path the port was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes).await?;
        self.port.flush().await?;
        Ok(())
    }

    async fn read_up_to(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(READ_CHUNK));
        let mut chunk = [0u8; READ_CHUNK];
        let deadline = Instant::now() + self.read_timeout;

        while buf.len() < len {
            let want = (len - buf.len()).min(READ_CHUNK);
            match time::timeout_at(deadline, self.port.read(&mut chunk[..want])).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    trace!(port = %self.path, filled = buf.len(), len, "Read timed out");
                    break;
                }
            }
        }

        Ok(buf)
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_port_is_unavailable() {
        let result = SerialTransport::open(&SerialConfig::control("/nonexistent/tty"));
        match result {
            Err(e @ Error::TransportUnavailable { .. }) => {
                assert!(!e.is_recoverable());
                assert!(e.to_string().contains("/nonexistent/tty"));
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("opened a port that does not exist"),
        }
    }
}

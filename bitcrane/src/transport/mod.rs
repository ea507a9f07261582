//! Physical transport layer for the control bridge and ASIC ports.
//!
//! A transport is a plain full-duplex byte channel with a read timeout. It
//! has no protocol knowledge: framing, ID checking and retries (there are
//! none) live in the layers above.

use async_trait::async_trait;

use crate::error::Result;

pub mod serial;

#[cfg(test)]
pub(crate) mod mock;

pub use serial::SerialTransport;

/// Byte-oriented serial channel.
///
/// Implementations are not safe to share between concurrent callers: the
/// bridge correlates responses only by a fixed-length read, so interleaved
/// requests would corrupt framing. Every method takes `&mut self`.
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes and flush.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read until `len` bytes have arrived or the read timeout elapses,
    /// returning whatever arrived (possibly nothing).
    async fn read_up_to(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Discard any bytes waiting in the input buffer.
    async fn clear_input(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes).await
    }

    async fn read_up_to(&mut self, len: usize) -> Result<Vec<u8>> {
        (**self).read_up_to(len).await
    }

    async fn clear_input(&mut self) -> Result<()> {
        (**self).clear_input().await
    }
}

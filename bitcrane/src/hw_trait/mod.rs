//! Hardware abstraction layer traits.
//!
//! Peripheral drivers are written against these traits rather than against
//! the control bridge directly, so they can be exercised with an in-memory
//! register model in tests.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::tracing::prelude::*;

/// Byte-wise register access to I2C devices.
///
/// The bridge moves one byte per transaction, so multi-byte helpers are
/// loops that stop at the first failure. They are not atomic: bytes already
/// written stay written, and bytes already read are consumed from the device
/// even though the caller gets only the error.
#[async_trait]
pub trait I2c: Send {
    /// Write one byte to `register` of the device at `address`.
    async fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<()>;

    /// Read `len` bytes from the device at `address`. With a register the
    /// read is preceded by a register select; without one the device's
    /// current read pointer is used.
    async fn read(&mut self, address: u8, register: Option<u8>, len: usize) -> Result<Vec<u8>>;

    /// Read a single byte.
    async fn read_byte(&mut self, address: u8, register: Option<u8>) -> Result<u8> {
        let data = self.read(address, register, 1).await?;
        data.first().copied().ok_or(Error::ShortRead {
            expected: 1,
            actual: 0,
        })
    }

    /// Write `bytes` one transaction at a time to the same register.
    async fn write_bytes(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<()> {
        for (index, &byte) in bytes.iter().enumerate() {
            if let Err(e) = self.write_byte(address, register, byte).await {
                warn!(
                    address,
                    register,
                    index,
                    byte,
                    "I2C write sequence aborted: {}",
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Read `count` bytes one transaction at a time. Returns nothing unless
    /// every byte was read.
    async fn read_bytes(&mut self, address: u8, count: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(count);
        for index in 0..count {
            match self.read_byte(address, None).await {
                Ok(byte) => data.push(byte),
                Err(e) => {
                    warn!(address, index, count, "I2C read sequence aborted: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(data)
    }
}

#[async_trait]
impl<I: I2c + ?Sized> I2c for &mut I {
    async fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<()> {
        (**self).write_byte(address, register, value).await
    }

    async fn read(&mut self, address: u8, register: Option<u8>, len: usize) -> Result<Vec<u8>> {
        (**self).read(address, register, len).await
    }

    async fn read_byte(&mut self, address: u8, register: Option<u8>) -> Result<u8> {
        (**self).read_byte(address, register).await
    }

    async fn write_bytes(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(address, register, bytes).await
    }

    async fn read_bytes(&mut self, address: u8, count: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, count).await
    }
}

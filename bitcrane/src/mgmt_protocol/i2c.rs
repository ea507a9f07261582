//! I2C register bridge over the control protocol.
//!
//! Each bridge transaction moves a single data byte (or a short register
//! read). The same opcodes serve both the board I2C page and the PSU-I2C
//! page; only the page byte differs.

use async_trait::async_trait;

use super::channel::ControlChannel;
use super::frame::{Packet, Page};
use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::transport::Transport;

/// Opcodes of the I2C pages.
pub mod opcode {
    /// `[address, register, value]`
    pub const WRITE: u8 = 0x20;
    /// `[address, len]`, reads from the current pointer
    pub const READ: u8 = 0x30;
    /// `[address, register, len]`, register select then read
    pub const READ_WRITE: u8 = 0x40;
}

/// Transaction ID used for writes unless overridden.
pub const DEFAULT_WRITE_ID: u8 = 0xBC;

/// Transaction ID used for reads unless overridden.
pub const DEFAULT_READ_ID: u8 = 0xAB;

/// Bytes of payload in a write acknowledgement.
const WRITE_ACK_LEN: usize = 1;

/// I2C access through one page of the control bridge.
pub struct I2cBridge<'a, T> {
    channel: &'a mut ControlChannel<T>,
    page: Page,
    write_id: u8,
    read_id: u8,
}

impl<'a, T: Transport> I2cBridge<'a, T> {
    pub fn new(channel: &'a mut ControlChannel<T>, page: Page) -> Self {
        Self {
            channel,
            page,
            write_id: DEFAULT_WRITE_ID,
            read_id: DEFAULT_READ_ID,
        }
    }

    /// Use different transaction IDs for writes and reads.
    pub fn with_ids(mut self, write_id: u8, read_id: u8) -> Self {
        self.write_id = write_id;
        self.read_id = read_id;
        self
    }

    pub fn page(&self) -> Page {
        self.page
    }
}

#[async_trait]
impl<T: Transport> I2c for I2cBridge<'_, T> {
    async fn write_byte(&mut self, address: u8, register: u8, value: u8) -> Result<()> {
        let packet = Packet::new(
            self.write_id,
            self.page,
            opcode::WRITE,
            vec![address, register, value],
        );
        self.channel.transact(&packet, WRITE_ACK_LEN).await?;
        Ok(())
    }

    async fn read(&mut self, address: u8, register: Option<u8>, len: usize) -> Result<Vec<u8>> {
        let size = u8::try_from(len)
            .ok()
            .filter(|&size| size > 0)
            .ok_or_else(|| Error::InvalidArgument(format!("I2C read of {len} bytes")))?;

        let packet = match register {
            Some(register) => Packet::new(
                self.read_id,
                self.page,
                opcode::READ_WRITE,
                vec![address, register, size],
            ),
            None => Packet::new(self.read_id, self.page, opcode::READ, vec![address, size]),
        };
        self.channel.transact(&packet, len).await
    }
}

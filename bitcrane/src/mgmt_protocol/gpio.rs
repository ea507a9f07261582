//! GPIO page helpers and hashboard pin mapping.

use std::time::Duration;
use tokio::time;

use super::channel::ControlChannel;
use super::frame::{Packet, Page};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Transaction ID for GPIO writes unless overridden.
pub const DEFAULT_ID: u8 = 0xAB;

/// Bytes of payload in a GPIO acknowledgement.
const ACK_LEN: usize = 1;

/// Logic level of an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    Low = 0x00,
    High = 0x01,
}

impl From<bool> for PinValue {
    fn from(high: bool) -> Self {
        if high {
            PinValue::High
        } else {
            PinValue::Low
        }
    }
}

/// A hashboard slot of a multi-board system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hashboard(u8);

impl Hashboard {
    pub const COUNT: u8 = 3;

    /// Validate a hashboard index (0-2).
    pub fn new(index: u8) -> Result<Self> {
        if index < Self::COUNT {
            Ok(Self(index))
        } else {
            Err(Error::InvalidArgument(format!(
                "hashboard {index} (must be 0-{})",
                Self::COUNT - 1
            )))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Active-low reset line: 0x00, 0x10, 0x20.
    pub fn reset_pin(self) -> u8 {
        self.0 << 4
    }

    /// Plug-detect line: 0x01, 0x11, 0x21.
    pub fn plug_pin(self) -> u8 {
        (self.0 << 4) | 0x01
    }
}

/// GPIO access through the control bridge.
pub struct Gpio<'a, T> {
    channel: &'a mut ControlChannel<T>,
    id: u8,
    ack: bool,
}

impl<'a, T: Transport> Gpio<'a, T> {
    pub fn new(channel: &'a mut ControlChannel<T>) -> Self {
        Self {
            channel,
            id: DEFAULT_ID,
            ack: true,
        }
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Whether each write waits for the bridge's ack. On by default.
    pub fn expect_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    /// Drive `pin` to `value`.
    pub async fn set(&mut self, pin: u8, value: PinValue) -> Result<()> {
        debug!(pin, value = ?value, ack = self.ack, "GPIO write");
        let packet = Packet::new(self.id, Page::Gpio, pin, vec![value as u8]);
        if self.ack {
            self.channel.transact(&packet, ACK_LEN).await?;
        } else {
            self.channel.send(&packet).await?;
        }
        Ok(())
    }

    /// Switch the PSU on or off through its active-low enable pin.
    pub async fn set_psu_enable(&mut self, pin: u8, enable: bool) -> Result<()> {
        info!(pin, enable, "Setting PSU enable");
        self.set(pin, PinValue::from(!enable)).await
    }

    /// Pulse the reset line of `board` low for `pulse`, then release it.
    pub async fn reset_hashboard(&mut self, board: Hashboard, pulse: Duration) -> Result<()> {
        let pin = board.reset_pin();
        debug!(hashboard = board.index(), pin, "Resetting hashboard ASICs");
        self.set(pin, PinValue::Low).await?;
        time::sleep(pulse).await;
        self.set(pin, PinValue::High).await
    }
}

//! Status LED page.

use super::channel::ControlChannel;
use super::frame::{Packet, Page};
use crate::error::Result;
use crate::transport::Transport;

/// Transaction ID for LED writes unless overridden.
pub const DEFAULT_ID: u8 = 0x00;

const SET_COLOR: u8 = 0x10;

/// RGB status LED on the bridge board.
///
/// Colour writes are fire-and-forget unless an ack is requested.
pub struct Led<'a, T> {
    channel: &'a mut ControlChannel<T>,
    id: u8,
    ack: bool,
}

impl<'a, T: Transport> Led<'a, T> {
    pub fn new(channel: &'a mut ControlChannel<T>) -> Self {
        Self {
            channel,
            id: DEFAULT_ID,
            ack: false,
        }
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Wait for and check a one-byte ack after each write.
    pub fn expect_ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    pub async fn set_color(&mut self, red: u8, green: u8, blue: u8) -> Result<()> {
        let packet = Packet::new(self.id, Page::Led, SET_COLOR, vec![red, green, blue]);
        if self.ack {
            self.channel.transact(&packet, 1).await?;
        } else {
            self.channel.send(&packet).await?;
        }
        Ok(())
    }
}

//! Fan page helpers.
//!
//! Four fan channels, each with its own speed and tachometer opcode.

use super::channel::ControlChannel;
use super::frame::{Packet, Page};
use crate::error::{Error, Result};
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Transaction ID for fan commands unless overridden.
pub const DEFAULT_ID: u8 = 0xAB;

/// Number of fan channels.
pub const CHANNELS: u8 = 4;

/// Speed opcode of channel 1; channel n uses `SPEED_BASE + n`.
const SPEED_BASE: u8 = 0x10;

/// Tach opcode of channel 1; channel n uses `TACH_BASE + n`.
const TACH_BASE: u8 = 0x20;

fn check_channel(channel: u8) -> Result<()> {
    if (1..=CHANNELS).contains(&channel) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "fan channel {channel} (must be 1-{CHANNELS})"
        )))
    }
}

/// Speed-set opcode for a fan channel (1-4).
pub fn speed_opcode(channel: u8) -> Result<u8> {
    check_channel(channel)?;
    Ok(SPEED_BASE + channel)
}

/// Tachometer-read opcode for a fan channel (1-4).
pub fn tach_opcode(channel: u8) -> Result<u8> {
    check_channel(channel)?;
    Ok(TACH_BASE + channel)
}

/// Fan control through the bridge.
pub struct Fans<'a, T> {
    channel: &'a mut ControlChannel<T>,
    id: u8,
}

impl<'a, T: Transport> Fans<'a, T> {
    pub fn new(channel: &'a mut ControlChannel<T>) -> Self {
        Self {
            channel,
            id: DEFAULT_ID,
        }
    }

    pub fn with_id(mut self, id: u8) -> Self {
        self.id = id;
        self
    }

    /// Set the PWM duty of fan `channel` to `percent` (0-100).
    pub async fn set_speed(&mut self, channel: u8, percent: u8) -> Result<()> {
        let command = speed_opcode(channel)?;
        if percent > 100 {
            return Err(Error::InvalidArgument(format!(
                "fan speed {percent}% (must be 0-100)"
            )));
        }

        debug!(channel, percent, "Setting fan speed");
        let packet = Packet::new(self.id, Page::Fan, command, vec![percent]);
        self.channel.transact(&packet, 1).await?;
        Ok(())
    }

    /// Read the tachometer of fan `channel` in RPM.
    pub async fn read_rpm(&mut self, channel: u8) -> Result<u16> {
        let command = tach_opcode(channel)?;
        let packet = Packet::new(self.id, Page::Fan, command, Vec::new());
        let data = self.channel.transact(&packet, 2).await?;
        let rpm = u16::from_le_bytes([data[0], data[1]]);
        trace!(channel, rpm, "Fan tach");
        Ok(rpm)
    }
}

//! ADC page: voltage domain readback.

use strum::{Display, FromRepr};

use super::channel::ControlChannel;
use super::frame::{Packet, Page};
use crate::error::Result;
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Transaction ID for ADC reads unless overridden.
pub const DEFAULT_ID: u8 = 0xAB;

/// Measured supply domains. The discriminant is the ADC page opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr)]
#[repr(u8)]
pub enum Domain {
    #[strum(to_string = "domain1")]
    Domain1 = 0x50,
    #[strum(to_string = "domain2")]
    Domain2 = 0x51,
    #[strum(to_string = "domain3")]
    Domain3 = 0x52,
}

/// ADC access through the control bridge.
pub struct Adc<'a, T> {
    channel: &'a mut ControlChannel<T>,
    id: u8,
}

impl<'a, T: Transport> Adc<'a, T> {
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

    /// Read a domain voltage in millivolts.
    pub async fn read_millivolts(&mut self, domain: Domain) -> Result<u16> {
        let packet = Packet::new(self.id, Page::Adc, domain as u8, Vec::new());
        let data = self.channel.transact(&packet, 2).await?;
        let millivolts = u16::from_le_bytes([data[0], data[1]]);
        trace!(%domain, millivolts, "ADC read");
        Ok(millivolts)
    }
}

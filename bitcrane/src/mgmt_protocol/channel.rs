//! Control channel for the bridge protocol.
//!
//! The channel owns the control transport and performs one request/response
//! round trip per call. It does not allocate transaction IDs: callers pick
//! them, following the conventions of each peripheral helper.

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use super::frame::{parse_response, ControlCodec, Packet, RESPONSE_HEADER_LEN};
use super::{adc::Adc, fan::Fans, gpio::Gpio, i2c::I2cBridge, led::Led, Page};
use crate::error::Result;
use crate::hexfmt::HexBytes;
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Exclusive handle on the control bridge.
///
/// Requests are strictly sequential; `&mut self` on every call keeps two
/// requests from sharing the wire.
pub struct ControlChannel<T> {
    transport: T,
    codec: ControlCodec,
}

impl<T: Transport> ControlChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            codec: ControlCodec,
        }
    }

    /// Send `packet` without waiting for a response.
    ///
    /// The input buffer is cleared first: responses have no
    /// resynchronization marker, so a stale byte would shift every later
    /// response. An ack the bridge sends anyway is dropped by the next
    /// request's clear.
    pub async fn send(&mut self, packet: &Packet) -> Result<()> {
        let mut frame = BytesMut::with_capacity(packet.encoded_len());
        self.codec.encode(packet, &mut frame)?;

        self.transport.clear_input().await?;
        trace!(page = %packet.page, "ctrl tx: [{}]", HexBytes(&frame));
        self.transport.write(&frame).await
    }

    /// Send `packet` and read a response carrying `reply_len` payload bytes.
    pub async fn transact(&mut self, packet: &Packet, reply_len: usize) -> Result<Vec<u8>> {
        self.send(packet).await?;

        let rx = self
            .transport
            .read_up_to(reply_len.saturating_add(RESPONSE_HEADER_LEN))
            .await?;
        trace!(page = %packet.page, "ctrl rx: [{}]", HexBytes(&rx));

        match parse_response(&rx, packet.id, reply_len) {
            Ok(payload) => Ok(payload.to_vec()),
            Err(e) => {
                warn!(
                    page = %packet.page,
                    command = packet.command,
                    "Control transaction failed: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// I2C bridge on `page` (`Page::I2c` for board sensors,
    /// `Page::PsuI2c` for the power supply).
    pub fn i2c(&mut self, page: Page) -> I2cBridge<'_, T> {
        I2cBridge::new(self, page)
    }

    pub fn gpio(&mut self) -> Gpio<'_, T> {
        Gpio::new(self)
    }

    pub fn fans(&mut self) -> Fans<'_, T> {
        Fans::new(self)
    }

    pub fn led(&mut self) -> Led<'_, T> {
        Led::new(self)
    }

    pub fn adc(&mut self) -> Adc<'_, T> {
        Adc::new(self)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

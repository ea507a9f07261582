//! APW-series PSU driver.
//!
//! The PSU microcontroller speaks a small checksummed packet protocol which
//! is tunneled through the PSU-I2C page one byte at a time: every byte of a
//! command is written to the same register and individually acknowledged,
//! and the reply is collected by single-byte pointer reads after the
//! firmware has had time to process the command.
//!
//! Packet layout:
//!
//! ```text
//! 55 AA len op fields... csLo csHi
//! ```
//!
//! `len` counts itself, the opcode, the fields and the two checksum bytes.
//! The checksum is the 16-bit sum of every byte from `len` through the last
//! field, little-endian.

use std::fmt;
use tokio::time;

use crate::config::PsuConfig;
use crate::error::{Error, Result};
use crate::hexfmt::HexBytes;
use crate::hw_trait::I2c;
use crate::tracing::prelude::*;

/// Packet preamble.
pub const PREAMBLE: [u8; 2] = [0x55, 0xAA];

/// PSU opcodes.
pub mod opcode {
    pub const GET_HW_VERSION: u8 = 0x02;
    pub const GET_VOLTAGE: u8 = 0x03;
    pub const MEASURE_VOLTAGE: u8 = 0x04;
    pub const CONFIG_WATCHDOG: u8 = 0x81;
    pub const SET_VOLTAGE: u8 = 0x83;
}

/// Output voltage at raw setting 0.
const VOLTAGE_OFFSET: f32 = 15.092;

/// Volts per raw step. Higher raw values mean lower voltage.
const VOLTAGE_STEP: f32 = -0.013;

/// Reply byte carrying the voltage setting.
const VOLTAGE_INDEX: usize = 4;

/// Largest body (opcode plus fields) whose length still fits the length byte.
const MAX_BODY_LEN: usize = u8::MAX as usize - 3;

/// 16-bit additive checksum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Build a complete command packet for `opcode` with `fields`.
pub fn build_packet(opcode: u8, fields: &[u8]) -> Result<Vec<u8>> {
    let body_len = fields.len() + 1;
    if body_len > MAX_BODY_LEN {
        return Err(Error::InvalidArgument(format!(
            "PSU packet body of {body_len} bytes"
        )));
    }

    let mut packet = Vec::with_capacity(body_len + 5);
    packet.extend_from_slice(&PREAMBLE);
    packet.push((body_len + 3) as u8);
    packet.push(opcode);
    packet.extend_from_slice(fields);
    let sum = checksum(&packet[PREAMBLE.len()..]);
    packet.extend_from_slice(&sum.to_le_bytes());
    Ok(packet)
}

/// Encode a target output voltage as the PSU's raw setting.
///
/// Targets that do not map onto 0..=255 are rejected.
pub fn voltage_to_raw(volts: f32) -> Result<u8> {
    let raw = ((volts - VOLTAGE_OFFSET) / VOLTAGE_STEP).round();
    if raw.is_finite() && (0.0..=255.0).contains(&raw) {
        Ok(raw as u8)
    } else {
        Err(Error::InvalidArgument(format!(
            "PSU voltage {volts:.3} V (must be {:.3}-{:.3} V)",
            raw_to_voltage(u8::MAX),
            raw_to_voltage(0)
        )))
    }
}

/// Decode a raw voltage setting.
pub fn raw_to_voltage(raw: u8) -> f32 {
    VOLTAGE_OFFSET + f32::from(raw) * VOLTAGE_STEP
}

/// A raw PSU reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsuReply(Vec<u8>);

impl PsuReply {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    fn byte(&self, index: usize) -> Result<u8> {
        self.0.get(index).copied().ok_or(Error::ShortRead {
            expected: index + 1,
            actual: self.0.len(),
        })
    }

    /// Output voltage setting, as reported by a get-voltage reply.
    pub fn voltage(&self) -> Result<f32> {
        Ok(raw_to_voltage(self.byte(VOLTAGE_INDEX)?))
    }

    /// Raw 16-bit measurement from a measure-voltage reply.
    pub fn measurement(&self) -> Result<u16> {
        Ok(u16::from_le_bytes([
            self.byte(VOLTAGE_INDEX)?,
            self.byte(VOLTAGE_INDEX + 1)?,
        ]))
    }
}

impl fmt::Display for PsuReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HexBytes(&self.0))
    }
}

/// APW PSU behind an I2C bridge.
pub struct ApwPsu<I2C> {
    i2c: I2C,
    config: PsuConfig,
}

impl<I2C: I2c> ApwPsu<I2C> {
    pub fn new(i2c: I2C, config: PsuConfig) -> Self {
        Self { i2c, config }
    }

    pub fn config(&self) -> &PsuConfig {
        &self.config
    }

    pub fn into_inner(self) -> I2C {
        self.i2c
    }

    /// Write `packet` byte by byte. Stops at the first unacknowledged byte.
    pub async fn send_command(&mut self, packet: &[u8]) -> Result<()> {
        debug!("PSU tx: [{}]", HexBytes(packet));
        self.i2c
            .write_bytes(self.config.address, self.config.register, packet)
            .await
            .map_err(|e| Error::CommandSendFailed {
                source: Box::new(e),
            })
    }

    /// Read a full reply. Nothing is returned unless every byte arrived.
    pub async fn receive_reply(&mut self) -> Result<PsuReply> {
        let expected = self.config.reply_len;
        let bytes = self
            .i2c
            .read_bytes(self.config.address, expected)
            .await
            .map_err(|e| Error::ReplyIncomplete {
                expected,
                source: Box::new(e),
            })?;
        let reply = PsuReply::new(bytes);
        debug!("PSU rx: [{}]", reply);
        Ok(reply)
    }

    /// Send a command, wait the settle delay, read the reply.
    pub async fn command(&mut self, opcode: u8, fields: &[u8]) -> Result<PsuReply> {
        let packet = build_packet(opcode, fields)?;
        self.send_command(&packet).await?;
        time::sleep(self.config.settle_delay).await;
        self.receive_reply().await
    }

    pub async fn get_hw_version(&mut self) -> Result<PsuReply> {
        self.command(opcode::GET_HW_VERSION, &[]).await
    }

    /// Enable (`true`) or disable the PSU watchdog.
    pub async fn config_watchdog(&mut self, enable: bool) -> Result<PsuReply> {
        self.command(opcode::CONFIG_WATCHDOG, &[u8::from(enable), 0x00])
            .await
    }

    /// Program the output voltage.
    pub async fn set_voltage(&mut self, volts: f32) -> Result<PsuReply> {
        let raw = voltage_to_raw(volts)?;
        info!(volts, raw, "Setting PSU voltage");
        self.set_voltage_raw(raw).await
    }

    /// Program an already-encoded voltage setting.
    pub async fn set_voltage_raw(&mut self, raw: u8) -> Result<PsuReply> {
        self.command(opcode::SET_VOLTAGE, &[raw, 0x00]).await
    }

    /// Read back the programmed output voltage in volts.
    pub async fn get_voltage(&mut self) -> Result<f32> {
        let reply = self.command(opcode::GET_VOLTAGE, &[]).await?;
        let volts = reply.voltage()?;
        debug!(volts, "PSU voltage");
        Ok(volts)
    }

    /// Raw output measurement.
    pub async fn measure_voltage(&mut self) -> Result<u16> {
        let reply = self.command(opcode::MEASURE_VOLTAGE, &[]).await?;
        reply.measurement()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::fake::FakeI2c;
    use std::time::Duration;

    fn quick_config() -> PsuConfig {
        PsuConfig {
            settle_delay: Duration::ZERO,
            ..PsuConfig::default()
        }
    }

    fn sent(i2c: &FakeI2c) -> Vec<u8> {
        i2c.writes.iter().map(|&(_, _, b)| b).collect()
    }

    #[test]
    fn set_voltage_packet() {
        assert_eq!(
            build_packet(opcode::SET_VOLTAGE, &[0xff, 0x00]).unwrap(),
            vec![0x55, 0xaa, 0x06, 0x83, 0xff, 0x00, 0x88, 0x01]
        );
    }

    #[test]
    fn hw_version_packet() {
        assert_eq!(
            build_packet(opcode::GET_HW_VERSION, &[]).unwrap(),
            vec![0x55, 0xaa, 0x04, 0x02, 0x06, 0x00]
        );
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[0xff; 300]), (0xff * 300u32 % 65536) as u16);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn oversize_body_rejected() {
        assert!(build_packet(0x01, &[0; MAX_BODY_LEN - 1]).is_ok());
        assert!(matches!(
            build_packet(0x01, &[0; MAX_BODY_LEN]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn voltage_encoding() {
        assert_eq!(voltage_to_raw(12.00).unwrap(), 238);
        assert_eq!(voltage_to_raw(15.092).unwrap(), 0);
        assert!((raw_to_voltage(100) - 13.792).abs() < 0.001);
    }

    #[test]
    fn voltage_out_of_range_rejected() {
        assert!(matches!(voltage_to_raw(16.0), Err(Error::InvalidArgument(_))));
        assert!(matches!(voltage_to_raw(10.0), Err(Error::InvalidArgument(_))));
        assert!(matches!(voltage_to_raw(f32::NAN), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn reply_decoding() {
        let reply = PsuReply::new(vec![0x55, 0xaa, 0x08, 0x03, 0x64, 0x01, 0x00, 0x00]);
        assert!((reply.voltage().unwrap() - 13.792).abs() < 0.001);
        assert_eq!(reply.measurement().unwrap(), 0x0164);
        assert_eq!(reply.to_string(), "55 AA 08 03 64 01 00 00");

        let short = PsuReply::new(vec![0; 5]);
        assert!(short.voltage().is_ok());
        assert!(matches!(
            short.measurement(),
            Err(Error::ShortRead { expected: 6, actual: 5 })
        ));
    }

    #[tokio::test]
    async fn get_voltage_round_trip() {
        let i2c = FakeI2c::with_read_data(&[0x55, 0xaa, 0x08, 0x03, 0x64, 0x00, 0x70, 0x01]);
        let mut psu = ApwPsu::new(i2c, quick_config());

        let volts = psu.get_voltage().await.unwrap();
        assert!((volts - 13.792).abs() < 0.001);

        let i2c = psu.into_inner();
        assert_eq!(sent(&i2c), vec![0x55, 0xaa, 0x04, 0x03, 0x07, 0x00]);
        assert!(i2c.writes.iter().all(|&(a, r, _)| a == 0x10 && r == 0x11));
        assert_eq!(i2c.reads, vec![(0x10, None, 1); 8]);
    }

    #[tokio::test]
    async fn watchdog_and_raw_voltage_fields() {
        let mut psu = ApwPsu::new(FakeI2c::with_read_data(&[0; 16]), quick_config());
        psu.config_watchdog(true).await.unwrap();
        psu.set_voltage(12.0).await.unwrap();

        let bytes = sent(&psu.into_inner());
        assert_eq!(&bytes[..8], &[0x55, 0xaa, 0x06, 0x81, 0x01, 0x00, 0x88, 0x00]);
        assert_eq!(&bytes[8..12], &[0x55, 0xaa, 0x06, 0x83]);
        assert_eq!(bytes[12], 238);
    }

    #[tokio::test]
    async fn unacknowledged_byte_is_command_send_failed() {
        let i2c = FakeI2c {
            fail_write_at: Some(3),
            ..FakeI2c::with_read_data(&[0; 8])
        };
        let mut psu = ApwPsu::new(i2c, quick_config());

        let result = psu.get_hw_version().await;
        assert!(matches!(result, Err(Error::CommandSendFailed { .. })));
        assert!(result.unwrap_err().is_recoverable());

        let i2c = psu.into_inner();
        assert_eq!(i2c.writes.len(), 3);
        assert!(i2c.reads.is_empty());
    }

    #[tokio::test]
    async fn short_reply_is_reply_incomplete() {
        let mut psu = ApwPsu::new(FakeI2c::with_read_data(&[0x55, 0xaa, 0x08]), quick_config());
        assert!(matches!(
            psu.measure_voltage().await,
            Err(Error::ReplyIncomplete { expected: 8, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_between_command_and_reply() {
        let mut psu = ApwPsu::new(FakeI2c::with_read_data(&[0; 8]), PsuConfig::default());
        let start = time::Instant::now();
        psu.get_hw_version().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn out_of_range_voltage_sends_nothing() {
        let mut psu = ApwPsu::new(FakeI2c::default(), quick_config());
        assert!(matches!(
            psu.set_voltage(20.0).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(psu.into_inner().writes.is_empty());
    }
}

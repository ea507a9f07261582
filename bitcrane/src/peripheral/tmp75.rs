//! TMP75 temperature sensor driver.
//!
//! Hashboards carry two sensors on the board I2C bus. The temperature
//! register holds a left-justified 12-bit two's-complement value in
//! 1/16 °C steps.

use crate::error::{Error, Result};
use crate::hw_trait::I2c;
use crate::tracing::prelude::*;

/// Sensor addresses, indexed by sensor number.
pub const ADDRESSES: [u8; 2] = [0x4C, 0x48];

pub mod register {
    pub const TEMPERATURE: u8 = 0x00;
    pub const CONFIG: u8 = 0x01;
    pub const T_LOW: u8 = 0x02;
    pub const T_HIGH: u8 = 0x03;
}

/// Convert a raw temperature register value to °C.
pub fn decode_temperature(raw: [u8; 2]) -> f32 {
    f32::from(i16::from_be_bytes(raw) >> 4) / 16.0
}

/// Sensor address for `index` (0 or 1).
pub fn address(index: u8) -> Result<u8> {
    ADDRESSES
        .get(usize::from(index))
        .copied()
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "temperature sensor {index} (must be 0-{})",
                ADDRESSES.len() - 1
            ))
        })
}

pub struct Tmp75<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Tmp75<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Sensor by board index.
    pub fn by_index(i2c: I2C, index: u8) -> Result<Self> {
        Ok(Self::new(i2c, address(index)?))
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read the temperature in °C.
    pub async fn read_temperature(&mut self) -> Result<f32> {
        let data = self
            .i2c
            .read(self.address, Some(register::TEMPERATURE), 2)
            .await?;
        let raw = match data.as_slice() {
            &[msb, lsb] => [msb, lsb],
            _ => {
                return Err(Error::ShortRead {
                    expected: 2,
                    actual: data.len(),
                })
            }
        };
        let celsius = decode_temperature(raw);
        trace!(address = self.address, raw = ?raw, celsius, "TMP75 temperature");
        Ok(celsius)
    }

    pub async fn read_config(&mut self) -> Result<u8> {
        let config = self
            .i2c
            .read_byte(self.address, Some(register::CONFIG))
            .await?;
        debug!(address = self.address, "TMP75 config register: 0x{:02X}", config);
        Ok(config)
    }
}

//! Board management protocol spoken by the UART control bridge.
//!
//! Requests are fixed-header frames addressed to a page (I2C, GPIO, ADC,
//! fan, LED, PSU-I2C) and a page-specific command byte. The bridge echoes
//! the caller's transaction ID in a short response whose length is known
//! from the request. Peripheral helpers borrow the [`ControlChannel`] for
//! the duration of each call.

pub mod adc;
pub mod channel;
pub mod fan;
pub mod frame;
pub mod gpio;
pub mod i2c;
pub mod led;

pub use channel::ControlChannel;
pub use frame::{build_frame, parse_response, ControlCodec, Packet, Page};
pub use gpio::{Hashboard, PinValue};
pub use i2c::I2cBridge;

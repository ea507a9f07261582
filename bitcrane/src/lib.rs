//! Bench-test control harness for mining hardware.
//!
//! A bench is a control bridge (paged register protocol over UART) plus an
//! optional ASIC data port. The bridge fronts GPIO, fans, ADC, an RGB LED
//! and two I2C buses, one of which reaches an APW power supply.

pub mod asic;
pub mod config;
pub mod error;
pub mod hexfmt;
pub mod hw_trait;
pub mod mgmt_protocol;
pub mod peripheral;
pub mod tracing;
pub mod transport;

pub use error::{Error, Result};

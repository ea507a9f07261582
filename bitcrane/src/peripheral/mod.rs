//! Drivers for devices reached through the I2C bridge.

pub mod apw_psu;
pub mod tmp75;

pub use apw_psu::{ApwPsu, PsuReply};
pub use tmp75::Tmp75;

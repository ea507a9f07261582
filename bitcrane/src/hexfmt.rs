//! Hex formatting for diagnostic dumps.

use std::fmt;

/// Wrapper for formatting byte slices as space-separated upper-case hex,
/// e.g. `55 AA 06 83`.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Wrapper for formatting a byte stream of ASIC word pairs as 9-bit hex
/// values, e.g. `1FA 0F0 042`. A trailing odd byte is not shown.
pub struct HexWords<'a>(pub &'a [u8]);

impl fmt::Display for HexWords<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pair) in self.0.chunks_exact(2).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            let value = (u16::from(pair[1] & 0x01) << 8) | u16::from(pair[0]);
            write!(f, "{:03X}", value)?;
        }
        Ok(())
    }
}

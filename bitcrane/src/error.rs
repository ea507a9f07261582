//! Common error types for bitcrane.
//!
//! Every protocol-layer failure is returned as a value of this enum rather
//! than aborting the process, so polling loops and multi-byte sequences can
//! decide for themselves whether to give up or carry on.

use thiserror::Error;

/// Main error type for bitcrane operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The serial port could not be opened.
    #[error("Transport unavailable: {path}: {source}")]
    TransportUnavailable {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Fewer bytes than expected arrived before the read timeout.
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Nothing arrived before the read timeout.
    #[error("No data received")]
    NoData,

    /// The response carried a different transaction ID than the request.
    #[error("ID mismatch: expected {expected:02X}, got {actual:02X}")]
    IdMismatch { expected: u8, actual: u8 },

    /// A word buffer had the wrong size.
    #[error("Length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Caller supplied an argument outside the accepted range. Raised before
    /// any I/O takes place.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// One of the bytes of a PSU command packet was not acknowledged.
    #[error("PSU command send failed: {source}")]
    CommandSendFailed {
        #[source]
        source: Box<Error>,
    },

    /// The PSU reply could not be read in full.
    #[error("PSU reply incomplete ({expected} bytes expected): {source}")]
    ReplyIncomplete {
        expected: usize,
        #[source]
        source: Box<Error>,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
}

impl Error {
    /// True for failures a caller may reasonably retry: timeouts, short
    /// reads, ID mismatches and the PSU errors built on them.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::ShortRead { .. }
            | Error::NoData
            | Error::IdMismatch { .. }
            | Error::LengthMismatch { .. }
            | Error::CommandSendFailed { .. }
            | Error::ReplyIncomplete { .. } => true,
            Error::TransportUnavailable { .. }
            | Error::InvalidArgument(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Serial(_) => false,
        }
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(Error::NoData.is_recoverable());
        assert!(Error::IdMismatch { expected: 0xAB, actual: 0x00 }.is_recoverable());
        assert!(Error::ReplyIncomplete {
            expected: 8,
            source: Box::new(Error::ShortRead { expected: 4, actual: 2 }),
        }
        .is_recoverable());
        assert!(!Error::InvalidArgument("fan channel 5".into()).is_recoverable());
        assert!(!Error::Config("missing port".into()).is_recoverable());
    }

    #[test]
    fn id_mismatch_message_is_hex() {
        let e = Error::IdMismatch { expected: 0xBC, actual: 0x0A };
        assert_eq!(e.to_string(), "ID mismatch: expected BC, got 0A");
    }
}

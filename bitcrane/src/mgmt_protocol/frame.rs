//! Control-bridge frame codec.
//!
//! Every request to the bridge has the same shape:
//!
//! ```text
//! offset 0-1: length         u16 LE, total frame length including itself
//! offset 2:   transaction ID echoed in the response
//! offset 3:   bus            always 0
//! offset 4:   page           peripheral subsystem
//! offset 5:   command        page-specific opcode
//! offset 6+:  payload
//! ```
//!
//! Responses are `[lenLo, lenHi, id, payload...]` and are read with a fixed
//! size chosen by the caller; the payload is the suffix of that read.

use bytes::{BufMut, BytesMut};
use strum::{Display, FromRepr};
use tokio_util::codec::Encoder;

use crate::error::{Error, Result};

/// Bytes in front of the payload of a request.
pub const HEADER_LEN: usize = 6;

/// Bytes in front of the payload of a response.
pub const RESPONSE_HEADER_LEN: usize = 3;

/// Offset of the transaction ID in both requests and responses.
pub const ID_OFFSET: usize = 2;

/// Peripheral namespace a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum Page {
    PsuI2c = 0x04,
    I2c = 0x05,
    Gpio = 0x06,
    Adc = 0x07,
    Led = 0x08,
    Fan = 0x09,
}

/// An outbound bridge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: u8,
    pub page: Page,
    pub command: u8,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(id: u8, page: Page, command: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            page,
            command,
            data: data.into(),
        }
    }

    /// Total length on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.data.len()
    }

    /// Serialize into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        build_frame(self.page, self.command, self.id, &self.data)
    }
}

/// Build a request frame.
///
/// Fails with `InvalidArgument` if the frame would not fit the 16-bit
/// length field.
pub fn build_frame(page: Page, command: u8, transaction_id: u8, payload: &[u8]) -> Result<Vec<u8>> {
    let mut dst = BytesMut::with_capacity(HEADER_LEN + payload.len());
    put_frame(page, command, transaction_id, payload, &mut dst)?;
    Ok(dst.to_vec())
}

fn put_frame(
    page: Page,
    command: u8,
    transaction_id: u8,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let length = u16::try_from(HEADER_LEN + payload.len()).map_err(|_| {
        Error::InvalidArgument(format!("payload of {} bytes is too long", payload.len()))
    })?;

    dst.reserve(length as usize);
    dst.put_u16_le(length);
    dst.put_u8(transaction_id);
    dst.put_u8(0x00);
    dst.put_u8(page as u8);
    dst.put_u8(command);
    dst.put_slice(payload);
    Ok(())
}

/// Validate a fixed-size response and return its payload.
///
/// The checks run in wire order: nothing at all is `NoData`; too few bytes
/// to hold an ID is `ShortRead`; a foreign ID is `IdMismatch`; and a
/// truncated payload is `ShortRead`.
pub fn parse_response(bytes: &[u8], expected_id: u8, expected_payload_len: usize) -> Result<&[u8]> {
    let expected = expected_payload_len.saturating_add(RESPONSE_HEADER_LEN);

    if bytes.is_empty() {
        return Err(Error::NoData);
    }
    if bytes.len() <= ID_OFFSET {
        return Err(Error::ShortRead {
            expected,
            actual: bytes.len(),
        });
    }
    if bytes[ID_OFFSET] != expected_id {
        return Err(Error::IdMismatch {
            expected: expected_id,
            actual: bytes[ID_OFFSET],
        });
    }
    if bytes.len() < expected {
        return Err(Error::ShortRead {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(&bytes[bytes.len() - expected_payload_len..])
}

/// Encoder the control channel writes packets through.
#[derive(Debug, Default)]
pub struct ControlCodec;

impl<'a> Encoder<&'a Packet> for ControlCodec {
    type Error = Error;

    fn encode(&mut self, packet: &'a Packet, dst: &mut BytesMut) -> Result<()> {
        put_frame(packet.page, packet.command, packet.id, &packet.data, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexfmt::HexBytes;

    fn assert_bytes(actual: &[u8], expect: &[u8]) {
        if actual != expect {
            panic!(
                "mismatch!\nexpected: {}\nactual: {}",
                HexBytes(expect),
                HexBytes(actual)
            )
        }
    }

    #[test]
    fn gpio_set_frame() {
        // Deassert ASIC reset: 07 00 00 00 06 00 01
        let frame = build_frame(Page::Gpio, 0x00, 0x00, &[0x01]).unwrap();
        assert_bytes(&frame, &[0x07, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01]);
    }

    #[test]
    fn i2c_write_frame() {
        let frame = build_frame(Page::PsuI2c, 0x20, 0xbc, &[0x10, 0x11, 0x55]).unwrap();
        assert_bytes(&frame, &[0x09, 0x00, 0xbc, 0x00, 0x04, 0x20, 0x10, 0x11, 0x55]);
    }

    #[test]
    fn fan_tach_frame_has_no_payload() {
        let frame = build_frame(Page::Fan, 0x21, 0xab, &[]).unwrap();
        assert_bytes(&frame, &[0x06, 0x00, 0xab, 0x00, 0x09, 0x21]);
    }

    #[test]
    fn length_field_counts_whole_frame() {
        for len in [0usize, 1, 17, 250, 300] {
            let payload = vec![0x5a; len];
            let frame = build_frame(Page::I2c, 0x40, 0x01, &payload).unwrap();
            assert_eq!(frame.len(), len + HEADER_LEN);
            assert_eq!(u16::from_le_bytes([frame[0], frame[1]]) as usize, frame.len());
            assert_eq!(&frame[HEADER_LEN..], &payload[..]);
        }
    }

    #[test]
    fn oversized_payload_rejected() {
        let payload = vec![0; u16::MAX as usize];
        assert!(matches!(
            build_frame(Page::I2c, 0x20, 0, &payload),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn packet_encoder_matches_build_frame() {
        let packet = Packet::new(0x42, Page::Led, 0x10, vec![0xff, 0x80, 0x00]);
        let mut dst = BytesMut::new();
        ControlCodec.encode(&packet, &mut dst).unwrap();
        assert_eq!(&dst[..], &packet.to_bytes().unwrap()[..]);
        assert_eq!(dst.len(), packet.encoded_len());
    }

    #[test]
    fn packet_encoder_rejects_oversize_without_writing() {
        let packet = Packet::new(0x01, Page::I2c, 0x20, vec![0; u16::MAX as usize]);
        let mut dst = BytesMut::new();
        assert!(matches!(
            ControlCodec.encode(&packet, &mut dst),
            Err(Error::InvalidArgument(_))
        ));
        assert!(dst.is_empty());
    }

    #[test]
    fn parse_returns_payload_suffix() {
        let rx = [0x05, 0x00, 0xab, 0x34, 0x12];
        assert_eq!(parse_response(&rx, 0xab, 2).unwrap(), &[0x34, 0x12]);
    }

    #[test]
    fn parse_header_only_response() {
        let rx = [0x04, 0x00, 0xbc, 0x00];
        assert_eq!(parse_response(&rx, 0xbc, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(parse_response(&[], 0xab, 1), Err(Error::NoData)));
        assert!(matches!(
            parse_response(&[0x04, 0x00], 0xab, 1),
            Err(Error::ShortRead { expected: 4, actual: 2 })
        ));
        assert!(matches!(
            parse_response(&[0x04, 0x00, 0xab], 0xab, 1),
            Err(Error::ShortRead { expected: 4, actual: 3 })
        ));
        assert!(matches!(
            parse_response(&[0x04, 0x00, 0xcd, 0x7f], 0xab, 1),
            Err(Error::IdMismatch { expected: 0xab, actual: 0xcd })
        ));
    }

    #[test]
    fn mismatched_id_always_rejected() {
        for len in [0usize, 1, 8, 250] {
            for (sent, echoed) in [(0x00u8, 0x01u8), (0xab, 0xba), (0xff, 0x00)] {
                let mut rx = vec![0u8; len + RESPONSE_HEADER_LEN];
                rx[ID_OFFSET] = echoed;
                assert!(matches!(
                    parse_response(&rx, sent, len),
                    Err(Error::IdMismatch { .. })
                ));
                rx[ID_OFFSET] = sent;
                assert_eq!(parse_response(&rx, sent, len).unwrap().len(), len);
            }
        }
    }

    #[test]
    fn page_from_repr() {
        assert_eq!(Page::from_repr(0x04), Some(Page::PsuI2c));
        assert_eq!(Page::from_repr(0x09), Some(Page::Fan));
        assert_eq!(Page::from_repr(0x01), None);
        assert_eq!(Page::Gpio.to_string(), "Gpio");
    }
}

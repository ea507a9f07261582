//! 9-bit ASIC word codec.
//!
//! The ASIC data port carries 9-bit words as byte pairs: the low eight bits
//! first, then bit 8 in the least significant position of the second byte.

use crate::error::{Error, Result};

/// Largest value a word can carry.
pub const WORD_MAX: u16 = 0x1FF;

/// Bytes per word on the wire.
pub const WORD_BYTES: usize = 2;

/// Encode `words` into wire pairs, in order. Bits above bit 8 are dropped.
pub fn encode_words(words: &[u16]) -> Vec<u8> {
    words
        .iter()
        .flat_map(|&w| [(w & 0xFF) as u8, ((w >> 8) & 0x01) as u8])
        .collect()
}

/// Decode wire pairs into words.
///
/// Fails with `LengthMismatch` if `bytes` has an odd length, or does not
/// hold exactly `expected` words when a count is given. A count whose byte
/// length overflows `usize` never matches. Bits 1-7 of each second byte are
/// ignored.
pub fn decode_words(bytes: &[u8], expected: Option<usize>) -> Result<Vec<u16>> {
    let want = match expected {
        Some(count) => count.checked_mul(WORD_BYTES).unwrap_or(usize::MAX),
        None => bytes.len() + bytes.len() % WORD_BYTES,
    };
    if bytes.len() != want {
        return Err(Error::LengthMismatch {
            expected: want,
            actual: bytes.len(),
        });
    }

    Ok(bytes
        .chunks_exact(WORD_BYTES)
        .map(|pair| (u16::from(pair[1] & 0x01) << 8) | u16::from(pair[0]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_pairs() {
        assert_eq!(
            encode_words(&[0x1FA, 0x0F0, 0x042]),
            vec![0xfa, 0x01, 0xf0, 0x00, 0x42, 0x00]
        );
        assert!(encode_words(&[]).is_empty());
    }

    #[test]
    fn encode_drops_high_bits() {
        assert_eq!(encode_words(&[0xFFFF]), vec![0xff, 0x01]);
    }

    #[test]
    fn decode_ignores_upper_bits_of_second_byte() {
        assert_eq!(decode_words(&[0x34, 0xfe, 0x12, 0xff], None).unwrap(), vec![0x034, 0x112]);
    }

    #[test]
    fn decode_is_inverse_of_encode() {
        let words: Vec<u16> = (0..=WORD_MAX).collect();
        let bytes = encode_words(&words);
        assert_eq!(decode_words(&bytes, Some(words.len())).unwrap(), words);
    }

    #[test]
    fn odd_length_rejected() {
        assert!(matches!(
            decode_words(&[0x01, 0x00, 0x02], None),
            Err(Error::LengthMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn count_mismatch_rejected() {
        assert!(matches!(
            decode_words(&[0x01, 0x00], Some(2)),
            Err(Error::LengthMismatch { expected: 4, actual: 2 })
        ));
        assert!(decode_words(&[], Some(0)).unwrap().is_empty());
    }

    #[test]
    fn huge_count_is_length_mismatch() {
        assert!(matches!(
            decode_words(&[], Some(usize::MAX)),
            Err(Error::LengthMismatch { expected: usize::MAX, actual: 0 })
        ));
        assert!(matches!(
            decode_words(&[0x01, 0x00], Some(usize::MAX / 2 + 1)),
            Err(Error::LengthMismatch { actual: 2, .. })
        ));
    }
}

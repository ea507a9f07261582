//! ASIC data port.

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use super::bm13xx::{Command, FrameCodec};
use super::word::{decode_words, encode_words, WORD_BYTES};
use crate::error::{Error, Result};
use crate::hexfmt::{HexBytes, HexWords};
use crate::tracing::prelude::*;
use crate::transport::Transport;

/// Response frame length seen from S19j Pro hashboards.
pub const PING_RESPONSE_LEN: usize = 11;

/// Serial link to a hashboard's ASIC chain.
pub struct AsicPort<T> {
    transport: T,
    codec: FrameCodec,
}

impl<T: Transport> AsicPort<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            codec: FrameCodec,
        }
    }

    /// Discard anything the chain sent that nobody read.
    pub async fn clear_input(&mut self) -> Result<()> {
        self.transport.clear_input().await
    }

    /// Send 9-bit words. Pending input is discarded first.
    pub async fn write_words(&mut self, words: &[u16]) -> Result<()> {
        let bytes = encode_words(words);
        self.transport.clear_input().await?;
        trace!("asic tx: [{}]", HexBytes(&bytes));
        debug!("asic tx9: [{}]", HexWords(&bytes));
        self.transport.write(&bytes).await
    }

    /// Read exactly `count` words.
    pub async fn read_words(&mut self, count: usize) -> Result<Vec<u16>> {
        let len = count
            .checked_mul(WORD_BYTES)
            .ok_or_else(|| Error::InvalidArgument(format!("cannot read {count} words")))?;
        let bytes = self.transport.read_up_to(len).await?;
        debug!("asic rx9: [{}]", HexWords(&bytes));
        decode_words(&bytes, Some(count)).inspect_err(|e| warn!("ASIC read failed: {}", e))
    }

    /// Send bytes exactly as given.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        debug!("asic tx: [{}]", HexBytes(bytes));
        self.transport.write(bytes).await
    }

    /// Send a BM13xx command frame.
    pub async fn send_command(&mut self, command: Command) -> Result<()> {
        let mut frame = BytesMut::new();
        self.codec.encode(command, &mut frame)?;
        self.write_raw(&frame).await
    }

    /// Give the first `count` chips of the chain the addresses `0`,
    /// `interval`, `2 * interval`, ... Forwarding is stopped first so each
    /// SetChipAddress lands on the next unaddressed chip.
    pub async fn assign_addresses(&mut self, count: usize, interval: u8) -> Result<Vec<u8>> {
        let addresses = (0..count)
            .map(|i| {
                u8::try_from(i * usize::from(interval)).map_err(|_| {
                    Error::InvalidArgument(format!(
                        "{count} chips at interval {interval} exceed the address space"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.send_command(Command::ChainInactive).await?;
        for &address in &addresses {
            self.send_command(Command::SetChipAddress { address }).await?;
        }
        debug!(chips = count, interval, "Assigned chip addresses");
        Ok(addresses)
    }

    /// Read `frame_len`-byte responses until the chain goes quiet or `max`
    /// frames have arrived. A trailing partial frame is returned as is.
    pub async fn collect_responses(&mut self, frame_len: usize, max: usize) -> Result<Vec<Vec<u8>>> {
        let mut frames = Vec::new();
        while frames.len() < max {
            let frame = self.transport.read_up_to(frame_len).await?;
            if frame.is_empty() {
                break;
            }
            debug!(index = frames.len(), "asic rx: [{}]", HexBytes(&frame));
            let partial = frame.len() < frame_len;
            frames.push(frame);
            if partial {
                break;
            }
        }
        Ok(frames)
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn write_words_clears_then_sends_pairs() {
        let mut mock = MockTransport::new();
        mock.feed(&[0xaa, 0x55]);
        let mut port = AsicPort::new(mock);

        port.write_words(&[0x1fa, 0x042]).await.unwrap();

        let mock = port.into_inner();
        assert_eq!(mock.clears, 1);
        assert_eq!(mock.pending_input(), 0);
        assert_eq!(mock.written, vec![vec![0xfa, 0x01, 0x42, 0x00]]);
    }

    #[tokio::test]
    async fn read_words_decodes() {
        let mut mock = MockTransport::new();
        mock.feed(&[0x34, 0x01, 0x12, 0x00, 0x99]);
        let mut port = AsicPort::new(mock);
        assert_eq!(port.read_words(2).await.unwrap(), vec![0x134, 0x012]);
    }

    #[tokio::test]
    async fn short_read_is_length_mismatch() {
        let mut mock = MockTransport::new();
        mock.feed(&[0x34, 0x01, 0x12]);
        let mut port = AsicPort::new(mock);
        assert!(matches!(
            port.read_words(2).await,
            Err(Error::LengthMismatch { expected: 4, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn huge_word_count_rejected_before_io() {
        let mut mock = MockTransport::new();
        mock.feed(&[0x34, 0x01]);
        let mut port = AsicPort::new(mock);
        assert!(matches!(
            port.read_words(usize::MAX).await,
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(port.into_inner().pending_input(), 2);
    }

    #[tokio::test]
    async fn assign_addresses_stops_forwarding_first() {
        let mut port = AsicPort::new(MockTransport::new());
        assert_eq!(port.assign_addresses(3, 2).await.unwrap(), vec![0, 2, 4]);
        assert_eq!(
            port.into_inner().written,
            vec![
                vec![0x55, 0xaa, 0x53, 0x05, 0x00, 0x00, 0x03],
                vec![0x55, 0xaa, 0x40, 0x05, 0x00, 0x00, 0x1c],
                vec![0x55, 0xaa, 0x40, 0x05, 0x02, 0x00, 0x01],
                vec![0x55, 0xaa, 0x40, 0x05, 0x04, 0x00, 0x03],
            ]
        );
    }

    #[tokio::test]
    async fn assign_addresses_outside_u8_rejected() {
        let mut port = AsicPort::new(MockTransport::new());
        assert!(matches!(
            port.assign_addresses(129, 2).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(port.into_inner().written.is_empty());
    }

    #[tokio::test]
    async fn ping_collects_until_quiet() {
        let mut port = AsicPort::new(MockTransport::new().reply(&[0xaa; 25]));
        port.send_command(Command::ping()).await.unwrap();

        let frames = port.collect_responses(PING_RESPONSE_LEN, 64).await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].len(), 11);
        assert_eq!(frames[2].len(), 3);

        let mock = port.into_inner();
        assert_eq!(mock.written, vec![vec![0x55, 0xaa, 0x52, 0x05, 0x00, 0x00, 0x0a]]);
        assert_eq!(mock.clears, 0);
    }

    #[tokio::test]
    async fn collect_stops_at_max() {
        let mut mock = MockTransport::new();
        mock.feed(&[0u8; 44]);
        let mut port = AsicPort::new(mock);
        let frames = port.collect_responses(11, 2).await.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(port.into_inner().pending_input(), 22);
    }
}

//! Scripted in-memory transport for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;

use super::Transport;
use crate::error::Result;

/// In-memory transport.
///
/// Each write pops the next scripted reply (if any) into the input buffer,
/// mimicking a device that answers every request. Reads drain the input
/// buffer up to the requested length; an empty buffer behaves like a read
/// timeout.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub written: Vec<Vec<u8>>,
    pub clears: usize,
    input: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply delivered after the next write.
    pub fn reply(mut self, bytes: &[u8]) -> Self {
        self.replies.push_back(bytes.to_vec());
        self
    }

    /// Queue an empty reply, i.e. the device stays silent for one request.
    pub fn silent(self) -> Self {
        self.reply(&[])
    }

    /// Put bytes into the input buffer right away, as if they arrived
    /// unsolicited.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.written.push(bytes.to_vec());
        if let Some(reply) = self.replies.pop_front() {
            self.input.extend(reply);
        }
        Ok(())
    }

    async fn read_up_to(&mut self, len: usize) -> Result<Vec<u8>> {
        let n = len.min(self.input.len());
        Ok(self.input.drain(..n).collect())
    }

    async fn clear_input(&mut self) -> Result<()> {
        self.clears += 1;
        self.input.clear();
        Ok(())
    }
}

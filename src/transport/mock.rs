//! In-memory [`Transport`] test double.
//!
//! Grounded on `MockSerialPort` in
//! `examples/jfabienke-mbuscrate/src/mbus/serial_testable.rs`: a canned
//! queue of blocks to hand back on `recv_block`, plus a record of every
//! block handed to `send_block`, so tests can assert on the full exchange
//! without a real character device.

use std::collections::VecDeque;
use std::time::Duration;

use super::{RecvShape, Transport};
use crate::error::{Result, T1Error};

pub struct MockTransport {
    pub sent: Vec<Vec<u8>>,
    to_receive: VecDeque<Vec<u8>>,
    /// When set, the next `recv_block` returns this error instead of
    /// popping from the queue (used to simulate a single corrupted or
    /// dropped block).
    next_error: Option<fn() -> T1Error>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            sent: Vec::new(),
            to_receive: VecDeque::new(),
            next_error: None,
        }
    }

    /// Queues a raw block (including its trailing checksum) to be handed
    /// back on the next `recv_block` call.
    pub fn queue_block(&mut self, block: Vec<u8>) {
        self.to_receive.push_back(block);
    }

    /// Makes the next `recv_block` call fail with `T1Error::Timeout`
    /// instead of returning a queued block.
    pub fn queue_timeout(&mut self) {
        self.next_error = Some(|| T1Error::Timeout);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn send_block(&mut self, bytes: &[u8]) -> Result<()> {
        self.sent.push(bytes.to_vec());
        Ok(())
    }

    fn recv_block(
        &mut self,
        buf: &mut Vec<u8>,
        _shape: RecvShape,
        bwt_ms: u64,
        _wtx: u8,
    ) -> Result<usize> {
        if let Some(make_err) = self.next_error.take() {
            return Err(make_err());
        }
        match self.to_receive.pop_front() {
            Some(block) => {
                buf.clear();
                buf.extend_from_slice(&block);
                Ok(buf.len())
            }
            None => {
                // No canned response: behave like a real timeout rather
                // than panicking, so a test that over-drains the queue
                // gets a diagnosable protocol error instead of a crash.
                std::thread::sleep(Duration::from_millis(0));
                let _ = bwt_ms;
                Err(T1Error::Timeout)
            }
        }
    }
}

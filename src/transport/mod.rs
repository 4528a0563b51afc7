//! Transport adapter: turns a blocking byte stream into block-level
//! send/receive primitives.
//!
//! The trait-plus-generic-impl shape is grounded on the `SerialPort`
//! trait and `TestableDeviceHandle<P>` in
//! `examples/jfabienke-mbuscrate/src/mbus/serial_testable.rs`, rewritten
//! synchronously. The byte-level receive algorithm — poll for the NAD
//! byte on an absolute deadline, then read the rest of the header and
//! payload — is grounded on `block_recv` in
//! `examples/original_source/secure_element/esehal/src/transport.c`.

pub mod mock;

#[cfg(feature = "gpio-irq")]
pub mod gpio;

use std::io::{Read, Write};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::constants::POLL_INTERVAL_MS;
use crate::error::{Result, T1Error};

/// The dialect-dependent shape the receiver needs to know to frame a
/// block, independent of any particular session.
#[derive(Debug, Clone, Copy)]
pub struct RecvShape {
    pub nadc: u8,
    pub len_width: u8,
    pub chk_len: usize,
    pub ifs_max: u16,
}

/// Waits for a GPIO rising-edge line-event, bounding the wait at
/// `deadline`. Implemented behind the `gpio-irq` feature; the default
/// transport falls back to pure polling.
pub trait EdgeWaiter {
    fn wait(&mut self, deadline: Instant) -> Result<()>;
}

/// Block-level transport contract consumed by the dispatch loop.
pub trait Transport {
    fn send_block(&mut self, bytes: &[u8]) -> Result<()>;

    /// Receives one complete block into `buf`, polling until the NAD byte
    /// is observed or `bwt_ms * wtx` elapses. Returns the block length.
    fn recv_block(
        &mut self,
        buf: &mut Vec<u8>,
        shape: RecvShape,
        bwt_ms: u64,
        wtx: u8,
    ) -> Result<usize>;
}

/// Generic transport over any blocking byte stream that already has a
/// short per-read timeout configured (so that `read` returning `Ok(0)`
/// means "no data yet", not "end of stream") — the same contract the
/// character device and `MockTransport` below both honour.
pub struct CharDeviceTransport<T: Read + Write> {
    inner: T,
    edge_waiter: Option<Box<dyn EdgeWaiter + Send>>,
}

impl<T: Read + Write> CharDeviceTransport<T> {
    pub fn new(inner: T) -> Self {
        CharDeviceTransport {
            inner,
            edge_waiter: None,
        }
    }

    pub fn with_edge_waiter(inner: T, waiter: Box<dyn EdgeWaiter + Send>) -> Self {
        CharDeviceTransport {
            inner,
            edge_waiter: Some(waiter),
        }
    }

    fn read_exact_by_deadline(&mut self, out: &mut [u8], deadline: Instant) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if Instant::now() >= deadline {
                return Err(T1Error::Timeout);
            }
            match self.inner.read(&mut out[filled..]) {
                Ok(0) => sleep(Duration::from_millis(POLL_INTERVAL_MS)),
                Ok(n) => filled += n,
                Err(e) if is_retriable(&e) => sleep(Duration::from_millis(POLL_INTERVAL_MS)),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn is_retriable(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
    )
}

impl<T: Read + Write> Transport for CharDeviceTransport<T> {
    fn send_block(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.inner.flush()?;
        Ok(())
    }

    fn recv_block(
        &mut self,
        buf: &mut Vec<u8>,
        shape: RecvShape,
        bwt_ms: u64,
        wtx: u8,
    ) -> Result<usize> {
        buf.clear();
        let deadline = Instant::now() + Duration::from_millis(bwt_ms.saturating_mul(wtx.max(1) as u64));

        if let Some(waiter) = self.edge_waiter.as_deref_mut() {
            // Best-effort wakeup; falls through to the poll loop regardless.
            let _ = waiter.wait(deadline);
        }

        let mut nad_byte = [0u8; 1];
        loop {
            if Instant::now() >= deadline {
                return Err(T1Error::Timeout);
            }
            match self.inner.read(&mut nad_byte) {
                Ok(1) if nad_byte[0] == shape.nadc => break,
                Ok(_) => sleep(Duration::from_millis(POLL_INTERVAL_MS)),
                Err(e) if is_retriable(&e) => sleep(Duration::from_millis(POLL_INTERVAL_MS)),
                Err(e) => return Err(e.into()),
            }
        }
        buf.push(nad_byte[0]);

        let mut header_rest = vec![0u8; 1 + shape.len_width as usize];
        self.read_exact_by_deadline(&mut header_rest, deadline)?;
        buf.extend_from_slice(&header_rest);

        let len = if shape.len_width == 1 {
            header_rest[1] as usize
        } else {
            u16::from_be_bytes([header_rest[1], header_rest[2]]) as usize
        };
        if len > shape.ifs_max as usize {
            return Err(T1Error::BadMessage(format!(
                "declared length {len} exceeds dialect maximum"
            )));
        }

        if len > 0 {
            let mut payload = vec![0u8; len];
            self.read_exact_by_deadline(&mut payload, deadline)?;
            buf.extend_from_slice(&payload);
        }

        let mut chk = vec![0u8; shape.chk_len];
        self.read_exact_by_deadline(&mut chk, deadline)?;
        buf.extend_from_slice(&chk);

        Ok(buf.len())
    }
}

//! `T1Device<T>`: the handle a caller actually holds, pairing a [`Session`]
//! with a [`Transport`].
//!
//! Grounded on the `MBusDeviceHandle` composition pattern in
//! `examples/jfabienke-mbuscrate/src/mbus/serial.rs` (a struct owning both
//! the link state and the I/O handle, exposing the public protocol verbs).

use crate::engine;
use crate::error::Result;
use crate::instrumentation::SessionStats;
use crate::session::{Session, SessionConfig};
use crate::transport::Transport;

/// Owns a [`Session`] and a [`Transport`] together and exposes the upper
/// API described in SPEC_FULL.md §6.
pub struct T1Device<T: Transport> {
    session: Session,
    transport: T,
    stats: SessionStats,
}

impl<T: Transport> T1Device<T> {
    pub fn new(config: SessionConfig, transport: T) -> Self {
        T1Device {
            session: Session::new(config),
            transport,
            stats: SessionStats::default(),
        }
    }

    /// One-time NAD setup. `src`/`dst` are each 3-bit node addresses.
    pub fn bind(&mut self, src: u8, dst: u8) {
        self.session.bind(src, dst);
    }

    pub fn transceive(&mut self, apdu: &[u8], resp: &mut [u8]) -> Result<usize> {
        let before = self.stats.snapshot(&self.session);
        let result = engine::transceive(&mut self.session, &mut self.transport, apdu, resp);
        self.stats.record(&self.session, before, &result);
        result
    }

    pub fn reset(&mut self) -> Result<()> {
        let before = self.stats.snapshot(&self.session);
        let result = engine::reset(&mut self.session, &mut self.transport);
        self.stats.resets += 1;
        self.stats.record(&self.session, before, &result);
        result
    }

    pub fn resync(&mut self) -> Result<()> {
        let before = self.stats.snapshot(&self.session);
        let result = engine::resync(&mut self.session, &mut self.transport);
        self.stats.resyncs += 1;
        self.stats.record(&self.session, before, &result);
        result
    }

    pub fn negotiate_ifsd(&mut self, new_ifsd: u16) -> Result<()> {
        engine::negotiate_ifsd(&mut self.session, &mut self.transport, new_ifsd)
    }

    pub fn get_atr(&mut self, out: &mut [u8]) -> Result<usize> {
        engine::get_atr(&mut self.session, &mut self.transport, out)
    }

    pub fn release(&mut self) {
        self.session.release();
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Exposes the session for diagnostics (current IFSC/IFSD/BWT etc.).
    pub fn session(&self) -> &Session {
        &self.session
    }
}

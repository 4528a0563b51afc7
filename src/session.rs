//! Session state: the per-link context the dispatch loop reads and mutates.
//!
//! Field layout is grounded on `struct t1_state` in
//! `examples/original_source/secure_element/esehal/src/iso7816_t1.h`.
//! `SessionConfig`'s shape (a plain serde-serializable defaults record) is
//! grounded on `SerialConfig` in
//! `examples/jfabienke-mbuscrate/src/mbus/serial.rs`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::constants::*;
use crate::dialect::{ChkAlgo, Dialect, DialectKind};

bitflags! {
    /// Priority-ordered state flags consulted by the dispatch loop
    /// (SPEC_FULL.md §4.4): `HALT` highest, `ABORTED` lowest.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateFlags: u8 {
        const HALT    = 0b0000_0001;
        const REQUEST = 0b0000_0010;
        const REQRESP = 0b0000_0100;
        const BADCRC  = 0b0000_1000;
        const TIMEOUT = 0b0001_0000;
        const ABORTED = 0b0010_0000;
    }
}

/// Caller-facing configuration used to initialise a [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub dialect: DialectKind,
    pub bwt_ms: u64,
    pub ifsd: u16,
    pub retry_budget: u8,
    pub wtx_max_value: u8,
    pub wtx_max_rounds: Option<u32>,
    pub recv_max: usize,
    /// Overrides the dialect's `default_chk_algo`. `None` keeps the
    /// dialect's default (LRC-8 for classic, CRC-X25 for extended); classic
    /// sessions may set `Some(ChkAlgo::CrcCcitt)` per §6's allowance of a
    /// 2-byte CRC checksum on the classic link.
    pub chk_algo: Option<ChkAlgo>,
}

impl SessionConfig {
    pub fn classic() -> Self {
        let d = DialectKind::Classic.params();
        SessionConfig {
            dialect: DialectKind::Classic,
            bwt_ms: DEFAULT_BWT_MS,
            ifsd: d.default_ifsc,
            retry_budget: DEFAULT_RETRIES,
            wtx_max_value: DEFAULT_WTX_MAX_VALUE,
            wtx_max_rounds: None,
            recv_max: DEFAULT_RECV_MAX,
            chk_algo: None,
        }
    }

    /// Overrides the checksum algorithm, e.g. `Some(ChkAlgo::CrcCcitt)` on a
    /// classic session.
    pub fn with_chk_algo(mut self, chk_algo: ChkAlgo) -> Self {
        self.chk_algo = Some(chk_algo);
        self
    }

    pub fn extended() -> Self {
        let d = DialectKind::Extended.params();
        SessionConfig {
            dialect: DialectKind::Extended,
            ..Self::classic()
        }
        .with_ifsd(d.default_ifsc)
    }

    fn with_ifsd(mut self, ifsd: u16) -> Self {
        self.ifsd = ifsd;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig::classic()
    }
}

/// A logical view over the caller's command buffer: bytes `[start, end)`
/// remain to be transmitted. Holds only offsets, never the buffer itself —
/// the buffer is borrowed for the lifetime of one `transceive` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendWindow {
    pub start: usize,
    pub end: usize,
}

impl SendWindow {
    pub fn remaining(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// A logical view over the caller's response buffer: bytes `[0, end)` have
/// been filled, up to `capacity`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecvWindow {
    pub end: usize,
    pub capacity: usize,
}

impl RecvWindow {
    pub fn free(&self) -> usize {
        self.capacity - self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }
}

/// An outstanding request this session has issued and is awaiting a
/// response for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Resync,
    Ifs(u16),
    Reset,
    Cip,
}

/// The mutable per-link context driven by the dispatch loop.
pub struct Session {
    pub dialect: &'static Dialect,

    pub nad: u8,
    pub nadc: u8,

    pub ifsc: u16,
    pub ifsd: u16,
    pub bwt_ms: u64,
    pub chk_algo: ChkAlgo,

    pub send: SendWindow,
    pub recv: RecvWindow,

    pub ns: bool,
    pub nr: bool,

    pub state: StateFlags,
    pub retries: u8,
    pub retry_budget: u8,

    pub wtx: u8,
    pub wtx_max_value: u8,
    pub wtx_rounds: u32,
    pub wtx_max_rounds: u32,

    pub need_reset: bool,
    pub need_cip: bool,
    pub need_resync: bool,
    pub need_ifsd_sync: bool,

    pub pending_request: Option<PendingRequest>,
    /// The exact S-response block queued by `REQRESP`, built while
    /// accepting a card-initiated request.
    pub pending_response: Option<Block>,

    pub atr: [u8; MAX_ATR_LEN],
    pub atr_length: usize,

    pub recv_size: usize,
    pub recv_max: usize,
}

impl Session {
    /// Builds a fresh session with all defaults and the boot handshake
    /// armed, per `t1_init` in both dialects' `iso7816_t1.c`.
    pub fn new(config: SessionConfig) -> Self {
        let dialect = config.dialect.params();
        Session {
            dialect,
            nad: 0,
            nadc: 0,
            ifsc: dialect.default_ifsc,
            ifsd: config.ifsd,
            bwt_ms: config.bwt_ms,
            chk_algo: config.chk_algo.unwrap_or(dialect.default_chk_algo),
            send: SendWindow::default(),
            recv: RecvWindow::default(),
            ns: false,
            nr: false,
            state: StateFlags::empty(),
            retries: config.retry_budget,
            retry_budget: config.retry_budget,
            wtx: 1,
            wtx_max_value: config.wtx_max_value,
            wtx_rounds: config
                .wtx_max_rounds
                .unwrap_or(dialect.default_wtx_max_rounds),
            wtx_max_rounds: config
                .wtx_max_rounds
                .unwrap_or(dialect.default_wtx_max_rounds),
            need_reset: !dialect.uses_cip,
            need_cip: dialect.uses_cip,
            need_resync: false,
            // Explicitly false rather than relying on a derived Default —
            // see DESIGN.md's "need_ifsd_sync initial value" decision.
            need_ifsd_sync: false,
            pending_request: None,
            pending_response: None,
            atr: [0u8; MAX_ATR_LEN],
            atr_length: 0,
            recv_size: 0,
            recv_max: config.recv_max,
        }
    }

    /// Binds the NAD pair. Idempotent when called with identical
    /// arguments; panics on a conflicting rebind attempt (mirrors the
    /// "never changes for the session" invariant in SPEC_FULL.md §3).
    pub fn bind(&mut self, src: u8, dst: u8) {
        let nad = (src & 0x7) | ((dst & 0x7) << 4);
        let nadc = (dst & 0x7) | ((src & 0x7) << 4);
        if self.nad != 0 || self.nadc != 0 {
            assert_eq!((self.nad, self.nadc), (nad, nadc), "NAD rebind with different addresses");
            return;
        }
        self.nad = nad;
        self.nadc = nadc;
    }

    /// Resets the per-call transient state before driving a fresh
    /// `transceive`/`reset`/`resync`/`negotiate_ifsd` loop. Sequence
    /// numbers, IFSC and the one-shot boot flags are preserved.
    pub fn clear_transient(&mut self) {
        self.state = StateFlags::empty();
        self.retries = self.retry_budget;
        self.wtx = 1;
        self.wtx_rounds = self.wtx_max_rounds;
        self.recv_size = 0;
        self.recv.end = 0;
        self.pending_request = None;
        self.pending_response = None;
    }

    pub fn release(&mut self) {
        self.state.insert(StateFlags::HALT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_session_defaults_arm_reset_not_cip() {
        let s = Session::new(SessionConfig::classic());
        assert!(s.need_reset);
        assert!(!s.need_cip);
        assert!(!s.need_ifsd_sync);
    }

    #[test]
    fn extended_session_defaults_arm_cip_not_reset() {
        let s = Session::new(SessionConfig::extended());
        assert!(!s.need_reset);
        assert!(s.need_cip);
    }

    #[test]
    fn bind_produces_matching_nad_nadc_pair() {
        let mut s = Session::new(SessionConfig::classic());
        s.bind(2, 1);
        assert_eq!(s.nad, 0x12);
        assert_eq!(s.nadc, 0x21);
    }

    #[test]
    fn rebind_with_same_addresses_is_idempotent() {
        let mut s = Session::new(SessionConfig::classic());
        s.bind(2, 1);
        s.bind(2, 1);
        assert_eq!(s.nad, 0x12);
    }
}

//! # T=1 Error Handling
//!
//! This module defines the `T1Error` enum, which represents every error
//! condition the dispatch loop, transport adapter and session layer can
//! surface to a caller.

use thiserror::Error;

/// Represents the different error kinds that can occur while driving the
/// T=1 block transmission protocol.
#[derive(Debug, Error)]
pub enum T1Error {
    /// A received block failed checksum verification.
    #[error("checksum mismatch on received block")]
    RemoteIoError,

    /// `bwt_ms * wtx` elapsed before a complete block was received.
    #[error("timeout waiting for block")]
    Timeout,

    /// The received block was malformed: wrong NAD, bad PCB, unexpected
    /// response, or an invalid S-block length.
    #[error("malformed or unexpected block: {0}")]
    BadMessage(String),

    /// The accumulated response would exceed the caller's buffer or the
    /// session's `recv_max` ceiling.
    #[error("response exceeds maximum size")]
    MessageTooLarge,

    /// The underlying transport's read or write failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The card issued an S(ABORT) request, which was honoured.
    #[error("session aborted by card")]
    BrokenPipe,

    /// A PCB or S-block kind outside the set this crate understands.
    #[error("unsupported block kind: {0}")]
    Unsupported(String),

    /// A caller-supplied argument was out of range (e.g. buffer too small).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The automatic single-retry recovery itself failed; only a cold
    /// reset of the secure element can recover the link.
    #[error("link is dead after automatic recovery failed")]
    FatalLinkDead,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, T1Error>;

//! T=1 Protocol Constants
//!
//! Dialect-independent PCB bit masks, S-block kind numbers and default
//! session values, mirrored from `esehal/src/iso7816_t1.c` and
//! `esehal_gp/src/iso7816_t1.c`.

/// PCB bit that discriminates an I-block (clear) from R/S-blocks (set).
pub const PCB_MASK_IO_BIT: u8 = 0x80;

/// Within a non-I-block PCB, discriminates R-block (clear) from S-block (set).
pub const PCB_MASK_RS_BIT: u8 = 0x40;

/// I-block N(S) bit.
pub const PCB_MASK_I_NS: u8 = 0x40;

/// I-block chaining ("more data") bit.
pub const PCB_MASK_I_CHAIN: u8 = 0x20;

/// R-block N(R) bit.
pub const PCB_MASK_R_NR: u8 = 0x10;

/// R-block error-code field (2 bits).
pub const PCB_MASK_R_ERROR: u8 = 0x03;

/// S-block direction bit: 0 = request, 1 = response.
pub const PCB_MASK_S_RESPONSE: u8 = 0x20;

/// S-block kind field (5 bits).
pub const PCB_MASK_S_KIND: u8 = 0x1F;

/// R-block error codes (low 2 bits of PCB).
pub const R_ERROR_OK: u8 = 0x00;
pub const R_ERROR_CRC: u8 = 0x01;
pub const R_ERROR_OTHER: u8 = 0x02;
pub const R_ERROR_RESERVED: u8 = 0x03;

/// S-block kinds, common to both dialects.
pub const S_KIND_RESYNC: u8 = 0x00;
pub const S_KIND_IFS: u8 = 0x01;
pub const S_KIND_ABORT: u8 = 0x02;
pub const S_KIND_WTX: u8 = 0x03;

/// S-block kinds, extended dialect only.
pub const S_KIND_CIP: u8 = 0x04;
pub const S_KIND_SWR: u8 = 0x0F;

/// S-block kind used by the classic dialect's boot/reset exchange (no CIP
/// exists in classic, so the reset response itself carries the ATR).
pub const S_KIND_RESET: u8 = 0x05;

/// Reserved "invalid length" sentinel for the classic 1-byte length field.
pub const CLASSIC_INVALID_LEN: u8 = 0xFF;

/// Smallest length at which the extended 2-byte length field is treated as
/// invalid (mirrors the C source's upper-bound guard).
pub const EXTENDED_INVALID_LEN_THRESHOLD: u16 = 4090;

/// Default block-waiting timeout in milliseconds.
pub const DEFAULT_BWT_MS: u64 = 300;

/// Default error-recovery budget per `transceive`.
pub const DEFAULT_RETRIES: u8 = 3;

/// Default WTX multiplier ceiling.
pub const DEFAULT_WTX_MAX_VALUE: u8 = 1;

/// Default maximum ATR capture length.
pub const MAX_ATR_LEN: usize = 32;

/// Default ceiling on total bytes accumulated across a chained response.
pub const DEFAULT_RECV_MAX: usize = 65538;

/// Polling cadence for the first byte of a block, per the half-duplex
/// transport contract (SPEC_FULL.md §4.2).
pub const POLL_INTERVAL_MS: u64 = 2;

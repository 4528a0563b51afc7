//! Dialect record: the small configuration that distinguishes the classic
//! and extended T=1 variants without duplicating the dispatch loop.
//!
//! Grounded on the structural contrast between
//! `examples/original_source/secure_element/esehal/src/iso7816_t1.c`
//! (classic) and `esehal_gp/src/iso7816_t1.c` (extended); see
//! SPEC_FULL.md §9 "Dual-variant dispatch".

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Checksum algorithm used to append/verify a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChkAlgo {
    /// 8-bit LRC (plain XOR), classic dialect.
    Lrc,
    /// CRC-CCITT, classic dialect when configured for CRC.
    CrcCcitt,
    /// CRC-16/X-25, extended dialect.
    CrcX25,
}

/// Selects which of the two T=1 variants a session speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialectKind {
    Classic,
    Extended,
}

/// The parameters that vary between dialects; everything else in the
/// dispatch loop is shared.
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub kind: DialectKind,
    /// Width in bytes of the block length field (1 classic, 2 extended).
    pub len_width: u8,
    /// Checksum algorithm used by default for this dialect.
    pub default_chk_algo: ChkAlgo,
    /// Maximum payload a block may carry.
    pub ifs_max: u16,
    /// Default starting IFSC before ATR/negotiation.
    pub default_ifsc: u16,
    /// Whether the boot handshake uses CIP (extended) or goes straight to
    /// RESET (classic).
    pub uses_cip: bool,
    /// Default consecutive-WTX-round budget before giving up.
    pub default_wtx_max_rounds: u32,
    /// Whether a card-initiated RESYNC S-block is honoured. The distilled
    /// specification calls RESYNC classic-only; see DESIGN.md's "Card-
    /// initiated RESYNC" decision.
    pub accepts_card_resync: bool,
}

pub static CLASSIC: Dialect = Dialect {
    kind: DialectKind::Classic,
    len_width: 1,
    default_chk_algo: ChkAlgo::Lrc,
    ifs_max: 254,
    default_ifsc: 32,
    uses_cip: false,
    default_wtx_max_rounds: 200,
    accepts_card_resync: true,
};

pub static EXTENDED: Dialect = Dialect {
    kind: DialectKind::Extended,
    len_width: 2,
    default_chk_algo: ChkAlgo::CrcX25,
    ifs_max: 4089,
    default_ifsc: 64,
    uses_cip: true,
    default_wtx_max_rounds: 3,
    accepts_card_resync: false,
};

/// Lazily-built lookup table, mirroring the teacher's `once_cell`-backed
/// static tables.
static DIALECTS: Lazy<[&'static Dialect; 2]> = Lazy::new(|| [&CLASSIC, &EXTENDED]);

impl DialectKind {
    pub fn params(self) -> &'static Dialect {
        match self {
            DialectKind::Classic => &CLASSIC,
            DialectKind::Extended => &EXTENDED,
        }
    }
}

/// Returns both dialect parameter tables, chiefly for exhaustive testing.
pub fn all_dialects() -> &'static [&'static Dialect; 2] {
    &DIALECTS
}

//! ATR scanning.
//!
//! The classic variant walks the ISO/IEC 7816-3 historical-byte TD chain to
//! find the T=1 interface bytes; the extended variant uses a fixed layout.
//! Grounded on `parse_atr` in
//! `examples/original_source/secure_element/esehal/src/iso7816_t1.c`
//! (classic) and `esehal_gp/src/iso7816_t1.c` (extended).

/// Parameters recoverable from an ATR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtrInfo {
    pub ifsc: Option<u16>,
    pub bwt_ms: Option<u64>,
}

/// Walks the classic TD chain looking for the T=1 interface bytes
/// (TAi immediately following a TDi-1 whose protocol nibble is 1). That
/// TAi byte is the card's announced IFSC. Returns defaults (`None` fields)
/// on any malformed or out-of-range ATR rather than panicking.
pub fn scan_classic(atr: &[u8]) -> AtrInfo {
    let mut info = AtrInfo::default();
    if atr.is_empty() {
        return info;
    }

    let mut idx = 1usize; // skip TS
    let Some(&t0) = atr.get(idx) else {
        return info;
    };
    idx += 1;

    let mut y = t0 >> 4;
    let mut protocol_of_prev_td: Option<u8> = None;

    loop {
        let ta_present = y & 0x1 != 0;
        let tb_present = y & 0x2 != 0;
        let tc_present = y & 0x4 != 0;
        let td_present = y & 0x8 != 0;

        if ta_present {
            match atr.get(idx) {
                Some(&ta) => {
                    if protocol_of_prev_td == Some(1) {
                        info.ifsc = Some(ta as u16);
                    }
                    idx += 1;
                }
                None => return info,
            }
        }
        if tb_present {
            idx += 1;
            if idx > atr.len() {
                return info;
            }
        }
        if tc_present {
            idx += 1;
            if idx > atr.len() {
                return info;
            }
        }
        if td_present {
            match atr.get(idx) {
                Some(&td) => {
                    protocol_of_prev_td = Some(td & 0x0F);
                    y = td >> 4;
                    idx += 1;
                }
                None => return info,
            }
        } else {
            break;
        }
    }

    info
}

/// Fixed-layout extended ATR scan: `IIN_len | IIN | PLP_len | PLP | BWT(be
/// u16) | IFSC(be u16)`. Every offset is bounds-checked before use; on any
/// violation the scan stops and returns whatever fields were already
/// resolved (SPEC_FULL.md §9.1's "ATR bounds violations" decision).
pub fn scan_extended(atr: &[u8]) -> AtrInfo {
    let mut info = AtrInfo::default();

    let mut idx = 0usize;
    let Some(&iin_len) = atr.get(idx) else {
        return info;
    };
    idx += 1 + iin_len as usize;

    let Some(&plp_len) = atr.get(idx) else {
        return info;
    };
    idx += 1 + plp_len as usize;

    let Some(bwt_bytes) = atr.get(idx..idx + 2) else {
        return info;
    };
    info.bwt_ms = Some(u16::from_be_bytes([bwt_bytes[0], bwt_bytes[1]]) as u64);
    idx += 2;

    let Some(ifsc_bytes) = atr.get(idx..idx + 2) else {
        return info;
    };
    info.ifsc = Some(u16::from_be_bytes([ifsc_bytes[0], ifsc_bytes[1]]));

    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_atr_recovers_ifsc() {
        // TS, T0=0x21 (Y1=0x2 => TC1 present, K=1), TC1=0x00, one historical byte,
        // minimal ATR with no T=1 interface bytes: ifsc stays None.
        let atr = [0x3B, 0x21, 0x00, 0xAA];
        let info = scan_classic(&atr);
        assert_eq!(info.ifsc, None);
    }

    #[test]
    fn classic_atr_with_td_chain_to_t1_recovers_ta() {
        // TS, T0=0x80 (Y1=0x8 => TD1 present, K=0),
        // TD1=0x31 (Y2=0x3 => TA2,TB2 present; protocol=1),
        // TA2=0xFE (IFSC=254), TB2=0x00.
        let atr = [0x3B, 0x80, 0x31, 0xFE, 0x00];
        let info = scan_classic(&atr);
        assert_eq!(info.ifsc, Some(0xFE));
    }

    #[test]
    fn extended_atr_fixed_layout() {
        // IIN_len=2, IIN=[0x01,0x02], PLP_len=1, PLP=[0x03], BWT=0x012C, IFSC=0x00FE
        let atr = [0x02, 0x01, 0x02, 0x01, 0x03, 0x01, 0x2C, 0x00, 0xFE];
        let info = scan_extended(&atr);
        assert_eq!(info.bwt_ms, Some(0x012C));
        assert_eq!(info.ifsc, Some(0x00FE));
    }

    #[test]
    fn extended_atr_truncated_leaves_defaults() {
        let atr = [0x02, 0x01, 0x02];
        let info = scan_extended(&atr);
        assert_eq!(info.ifsc, None);
        assert_eq!(info.bwt_ms, None);
    }
}

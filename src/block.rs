//! Tagged block representation and wire codec.
//!
//! The PCB bit-masking in the original C source is re-expressed here as a
//! small tagged union, decoded once at the edge rather than re-inspected
//! throughout the dispatch loop (SPEC_FULL.md §9 "Tagged variants"). The
//! header parser uses `nom`, in the style of
//! `examples/jfabienke-mbuscrate/src/mbus/frame.rs`'s `parse_frame`.

use nom::bytes::complete::take;
use nom::number::complete::{be_u16, u8 as nom_u8};
use nom::IResult;

use crate::checksum;
use crate::constants::*;
use crate::dialect::{ChkAlgo, Dialect};
use crate::error::{Result, T1Error};

/// R-block error sub-kind (low 2 bits of PCB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RError {
    Ok,
    Crc,
    Other,
    Reserved,
}

impl RError {
    fn from_bits(bits: u8) -> RError {
        match bits & PCB_MASK_R_ERROR {
            R_ERROR_OK => RError::Ok,
            R_ERROR_CRC => RError::Crc,
            R_ERROR_OTHER => RError::Other,
            _ => RError::Reserved,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            RError::Ok => R_ERROR_OK,
            RError::Crc => R_ERROR_CRC,
            RError::Other => R_ERROR_OTHER,
            RError::Reserved => R_ERROR_RESERVED,
        }
    }
}

/// One parsed or to-be-emitted T=1 block, independent of wire framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    I {
        ns: bool,
        chain: bool,
        payload: Vec<u8>,
    },
    R {
        nr: bool,
        error: RError,
    },
    S {
        response: bool,
        kind: u8,
        payload: Vec<u8>,
    },
}

impl Block {
    pub fn pcb(&self) -> u8 {
        match self {
            Block::I { ns, chain, .. } => {
                let mut pcb = 0u8;
                if *ns {
                    pcb |= PCB_MASK_I_NS;
                }
                if *chain {
                    pcb |= PCB_MASK_I_CHAIN;
                }
                pcb
            }
            Block::R { nr, error } => {
                let mut pcb = PCB_MASK_IO_BIT;
                if *nr {
                    pcb |= PCB_MASK_R_NR;
                }
                pcb | error.to_bits()
            }
            Block::S {
                response, kind, ..
            } => {
                let mut pcb = PCB_MASK_IO_BIT | PCB_MASK_RS_BIT;
                if *response {
                    pcb |= PCB_MASK_S_RESPONSE;
                }
                pcb | (*kind & PCB_MASK_S_KIND)
            }
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Block::I { payload, .. } => payload,
            Block::R { .. } => &[],
            Block::S { payload, .. } => payload,
        }
    }

    pub fn is_i(&self) -> bool {
        matches!(self, Block::I { .. })
    }

    pub fn is_r(&self) -> bool {
        matches!(self, Block::R { .. })
    }

    pub fn is_s(&self) -> bool {
        matches!(self, Block::S { .. })
    }
}

/// Serializes `block` into a fresh wire frame: NAD, PCB, LEN, payload, then
/// the checksum appended big-endian per `chk_algo`.
pub fn pack_block(dialect: &Dialect, chk_algo: ChkAlgo, nad: u8, block: &Block) -> Vec<u8> {
    let payload = block.payload();
    let mut header_and_payload = Vec::with_capacity(4 + payload.len());
    header_and_payload.push(nad);
    header_and_payload.push(block.pcb());
    if dialect.len_width == 1 {
        header_and_payload.push(payload.len() as u8);
    } else {
        header_and_payload.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    }
    header_and_payload.extend_from_slice(payload);

    let mut out = header_and_payload.clone();
    checksum::append(chk_algo, &header_and_payload, &mut out);
    out
}

fn header(input: &[u8], len_width: u8) -> IResult<&[u8], (u8, u8, u16)> {
    let (input, nad) = nom_u8(input)?;
    let (input, pcb) = nom_u8(input)?;
    let (input, len) = if len_width == 1 {
        let (input, len) = nom_u8(input)?;
        (input, len as u16)
    } else {
        be_u16(input)?
    };
    Ok((input, (nad, pcb, len)))
}

/// Parses a complete raw block (as handed back by the transport, including
/// its trailing checksum), verifying NAD and the checksum before
/// classifying the PCB.
pub fn parse_block(dialect: &Dialect, chk_algo: ChkAlgo, nadc: u8, raw: &[u8]) -> Result<Block> {
    let (rest, (nad, pcb, len)) = header(raw, dialect.len_width)
        .map_err(|e| T1Error::BadMessage(format!("malformed header: {e}")))?;

    if nad != nadc {
        return Err(T1Error::BadMessage(format!(
            "unexpected NAD 0x{nad:02X}, expected 0x{nadc:02X}"
        )));
    }
    if len > dialect.ifs_max {
        return Err(T1Error::BadMessage(format!("length {len} exceeds dialect maximum")));
    }

    let (_, payload) = take(len as usize)(rest)
        .map_err(|e: nom::Err<nom::error::Error<&[u8]>>| {
            T1Error::BadMessage(format!("truncated payload: {e}"))
        })?;

    if !checksum::verify(chk_algo, raw) {
        return Err(T1Error::RemoteIoError);
    }

    Ok(classify(pcb, payload))
}

fn classify(pcb: u8, payload: &[u8]) -> Block {
    if pcb & PCB_MASK_IO_BIT == 0 {
        Block::I {
            ns: pcb & PCB_MASK_I_NS != 0,
            chain: pcb & PCB_MASK_I_CHAIN != 0,
            payload: payload.to_vec(),
        }
    } else if pcb & PCB_MASK_RS_BIT == 0 {
        Block::R {
            nr: pcb & PCB_MASK_R_NR != 0,
            error: RError::from_bits(pcb),
        }
    } else {
        Block::S {
            response: pcb & PCB_MASK_S_RESPONSE != 0,
            kind: pcb & PCB_MASK_S_KIND,
            payload: payload.to_vec(),
        }
    }
}

/// Length of the wire header (NAD + PCB + LEN field) for `dialect`.
pub fn header_len(dialect: &Dialect) -> usize {
    2 + dialect.len_width as usize
}

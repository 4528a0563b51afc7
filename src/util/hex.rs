//! Hex encoding/decoding for the `t1-cli` binary's APDU and response
//! arguments.
//!
//! ## Usage
//!
//! ```rust
//! use iso7816_t1::util::hex::{encode_hex, decode_hex};
//!
//! let apdu = [0x00, 0xA4, 0x04, 0x00, 0x00];
//! let hex_str = encode_hex(&apdu);
//! assert_eq!(hex_str, "00a4040000");
//!
//! let decoded = decode_hex(&hex_str).unwrap();
//! assert_eq!(decoded, apdu);
//! ```

use thiserror::Error;

/// Errors that can occur while decoding a hex-encoded APDU.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("empty hex string")]
    EmptyString,

    #[error("hex decoding error: {0}")]
    DecodeError(String),
}

/// Encodes bytes to a lowercase hex string.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes a hex string to bytes. Accepts both cases; whitespace is
/// stripped before decoding.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    if hex_str.is_empty() {
        return Err(HexError::EmptyString);
    }

    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_apdu_round_trips() {
        let apdu = vec![0x00, 0xA4, 0x04, 0x00, 0x00];
        let encoded = encode_hex(&apdu);
        assert_eq!(encoded, "00a4040000");
        assert_eq!(decode_hex(&encoded).unwrap(), apdu);
    }

    #[test]
    fn decode_accepts_uppercase_and_mixed_case() {
        let block = "21E30102"; // S(WTX RESP), value 2
        assert_eq!(decode_hex(block).unwrap(), vec![0x21, 0xE3, 0x01, 0x02]);
        assert_eq!(decode_hex("21e30102").unwrap(), vec![0x21, 0xE3, 0x01, 0x02]);
    }

    #[test]
    fn decode_strips_whitespace_between_bytes() {
        let block = "12 00 05 00 A4 04 00 00";
        let expected = vec![0x12, 0x00, 0x05, 0x00, 0xA4, 0x04, 0x00, 0x00];
        assert_eq!(decode_hex(block).unwrap(), expected);
    }

    #[test]
    fn decode_rejects_empty_odd_length_and_invalid_characters() {
        assert_eq!(decode_hex(""), Err(HexError::EmptyString));
        assert!(matches!(decode_hex("0"), Err(HexError::OddLength(1))));
        assert!(decode_hex("ZZ").is_err());
    }
}

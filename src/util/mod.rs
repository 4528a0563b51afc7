//! Small supporting utilities used across the crate: currently just hex
//! encoding/decoding for block and APDU dumps.

pub mod hex;

pub use hex::{decode_hex, encode_hex};

//! Black-box checksum vectors, grounded on the LRC/CRC worked examples in
//! `examples/original_source/secure_element/esehal/src/checksum.h`.

use iso7816_t1::checksum::{append, compute, crc16_ccitt, crc16_x25, lrc8, verify};
use iso7816_t1::dialect::ChkAlgo;

#[test]
fn lrc8_of_empty_span_is_zero() {
    assert_eq!(lrc8(&[]), 0);
}

#[test]
fn lrc8_matches_manual_xor_fold() {
    let body = [0x12, 0x00, 0x05, 0x00, 0xA4, 0x04, 0x00, 0x00];
    let mut manual = 0u8;
    for b in body {
        manual ^= b;
    }
    assert_eq!(lrc8(&body), manual);
}

#[test]
fn crc_ccitt_and_crc_x25_diverge_on_same_input() {
    let body = [0x21, 0xC1, 0x01, 0xF0];
    assert_ne!(crc16_ccitt(&body), crc16_x25(&body));
}

#[test]
fn compute_dispatches_on_algo() {
    let body = [0xDE, 0xAD, 0xBE, 0xEF];
    assert_eq!(compute(ChkAlgo::Lrc, &body), lrc8(&body) as u16);
    assert_eq!(compute(ChkAlgo::CrcCcitt, &body), crc16_ccitt(&body));
    assert_eq!(compute(ChkAlgo::CrcX25, &body), crc16_x25(&body));
}

#[test]
fn appended_crc_is_big_endian_on_the_wire() {
    let body = [0x21, 0x00, 0x02, 0x90, 0x00];
    let mut block = body.to_vec();
    append(ChkAlgo::CrcX25, &body, &mut block);
    let crc = crc16_x25(&body);
    assert_eq!(block[body.len()], (crc >> 8) as u8);
    assert_eq!(block[body.len() + 1], (crc & 0xFF) as u8);
    assert!(verify(ChkAlgo::CrcX25, &block));
}

#[test]
fn single_bit_flip_anywhere_in_the_block_fails_verification() {
    let body = [0x12, 0x80, 0x00];
    let mut block = body.to_vec();
    append(ChkAlgo::Lrc, &body, &mut block);
    for i in 0..block.len() {
        let mut corrupted = block.clone();
        corrupted[i] ^= 0x01;
        assert!(!verify(ChkAlgo::Lrc, &corrupted), "byte {i} flip went undetected");
    }
}

//! Property-based tests for SPEC_FULL.md §8.1, grounded on the teacher's
//! `proptest` dev-dependency.

use proptest::prelude::*;

use iso7816_t1::block::{parse_block, pack_block, Block, RError};
use iso7816_t1::checksum::{append, verify};
use iso7816_t1::dialect::{ChkAlgo, CLASSIC, EXTENDED};

fn chk_algo_strategy() -> impl Strategy<Value = ChkAlgo> {
    prop_oneof![Just(ChkAlgo::Lrc), Just(ChkAlgo::CrcCcitt), Just(ChkAlgo::CrcX25)]
}

proptest! {
    #[test]
    fn checksum_round_trips_and_single_bit_flip_is_detected(
        algo in chk_algo_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
        flip_bit in 0u32..8,
    ) {
        let mut block = payload.clone();
        append(algo, &payload, &mut block);
        prop_assert!(verify(algo, &block));

        let flip_byte = block.len() - 1; // corrupt the checksum's own last byte
        let mut corrupted = block.clone();
        corrupted[flip_byte] ^= 1 << flip_bit;
        prop_assert!(!verify(algo, &corrupted));
    }

    #[test]
    fn i_block_pcb_round_trips_through_pack_and_parse(
        ns in any::<bool>(),
        chain in any::<bool>(),
        payload in prop::collection::vec(any::<u8>(), 0..200),
    ) {
        let block = Block::I { ns, chain, payload };
        let wire = pack_block(&CLASSIC, ChkAlgo::Lrc, 0x12, &block);
        let parsed = parse_block(&CLASSIC, ChkAlgo::Lrc, 0x12, &wire).unwrap();
        prop_assert_eq!(parsed, block);
    }

    #[test]
    fn r_block_pcb_round_trips_through_pack_and_parse(
        nr in any::<bool>(),
        error_bits in 0u8..4,
    ) {
        let error = match error_bits {
            0 => RError::Ok,
            1 => RError::Crc,
            2 => RError::Other,
            _ => RError::Reserved,
        };
        let block = Block::R { nr, error };
        let wire = pack_block(&EXTENDED, ChkAlgo::CrcX25, 0x21, &block);
        let parsed = parse_block(&EXTENDED, ChkAlgo::CrcX25, 0x21, &wire).unwrap();
        prop_assert_eq!(parsed, block);
    }

    #[test]
    fn chaining_a_send_window_consumes_ceil_len_over_ifsc_chunks(
        len in 1usize..2000,
        ifsc in 1u16..254,
    ) {
        let mut sent_chunks = 0usize;
        let mut start = 0usize;
        while start < len {
            let take = (len - start).min(ifsc as usize);
            prop_assert!(take > 0 && take <= ifsc as usize);
            start += take;
            sent_chunks += 1;
        }
        let expected = (len + ifsc as usize - 1) / ifsc as usize;
        prop_assert_eq!(sent_chunks, expected);
    }
}

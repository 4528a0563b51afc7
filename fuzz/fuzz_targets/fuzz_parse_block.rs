#![no_main]

use libfuzzer_sys::fuzz_target;

use iso7816_t1::block::parse_block;
use iso7816_t1::dialect::{ChkAlgo, CLASSIC, EXTENDED};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes against both dialects' checksum algorithms; the
    // parser must reject malformed input without panicking.
    let _ = parse_block(&CLASSIC, ChkAlgo::Lrc, 0x21, data);
    let _ = parse_block(&EXTENDED, ChkAlgo::CrcX25, 0x21, data);

    // Targeted length-field mutation, since a declared length that
    // disagrees with the actual buffer size is the likeliest spot for an
    // out-of-bounds slice.
    if data.len() >= 4 {
        let mut mutated = data.to_vec();
        mutated[2] = data.len() as u8;
        let _ = parse_block(&CLASSIC, ChkAlgo::Lrc, mutated[0], &mutated);
    }

    // Corrupting the trailing checksum byte should only ever flip the
    // verdict, never panic.
    if data.len() > 3 {
        let mut corrupted = data.to_vec();
        if let Some(last) = corrupted.last_mut() {
            *last = last.wrapping_add(1);
        }
        let _ = parse_block(&EXTENDED, ChkAlgo::CrcX25, corrupted[0], &corrupted);
    }
});

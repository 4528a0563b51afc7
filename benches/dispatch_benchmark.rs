use criterion::{black_box, criterion_group, criterion_main, Criterion};

use iso7816_t1::block::{pack_block, Block};
use iso7816_t1::dialect::{ChkAlgo, CLASSIC};
use iso7816_t1::engine;
use iso7816_t1::session::{Session, SessionConfig};
use iso7816_t1::transport::mock::MockTransport;

fn select_apdu_transceive(c: &mut Criterion) {
    c.bench_function("transceive_single_block_apdu", |b| {
        b.iter(|| {
            let mut session = Session::new(SessionConfig::classic());
            session.bind(2, 1);
            session.need_reset = false;
            let mut transport = MockTransport::new();
            transport.queue_block(pack_block(
                &CLASSIC,
                session.chk_algo,
                session.nadc,
                &Block::I {
                    ns: false,
                    chain: false,
                    payload: vec![0x90, 0x00],
                },
            ));
            let apdu = black_box([0x00, 0xA4, 0x04, 0x00, 0x00]);
            let mut resp = [0u8; 16];
            engine::transceive(&mut session, &mut transport, &apdu, &mut resp).unwrap();
        })
    });
}

fn chained_response_transceive(c: &mut Criterion) {
    c.bench_function("transceive_chained_response", |b| {
        b.iter(|| {
            let mut session = Session::new(SessionConfig::classic());
            session.bind(2, 1);
            session.need_reset = false;
            let mut transport = MockTransport::new();
            transport.queue_block(pack_block(
                &CLASSIC,
                session.chk_algo,
                session.nadc,
                &Block::I { ns: false, chain: true, payload: vec![0xAB; 200] },
            ));
            transport.queue_block(pack_block(
                &CLASSIC,
                session.chk_algo,
                session.nadc,
                &Block::I { ns: true, chain: false, payload: vec![0x90, 0x00] },
            ));
            let apdu = black_box([0x00, 0xA4, 0x04, 0x00, 0x00]);
            let mut resp = [0u8; 256];
            engine::transceive(&mut session, &mut transport, &apdu, &mut resp).unwrap();
        })
    });
}

criterion_group!(benches, select_apdu_transceive, chained_response_transceive);
criterion_main!(benches);

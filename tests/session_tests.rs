//! Black-box session lifecycle tests.

use iso7816_t1::dialect::ChkAlgo;
use iso7816_t1::session::{Session, SessionConfig};

#[test]
fn clear_transient_preserves_sequence_numbers_and_ifsc() {
    let mut session = Session::new(SessionConfig::classic());
    session.bind(2, 1);
    session.ns = true;
    session.nr = true;
    session.ifsc = 199;
    session.retries = 0;

    session.clear_transient();

    assert!(session.ns);
    assert!(session.nr);
    assert_eq!(session.ifsc, 199);
    assert_eq!(session.retries, session.retry_budget);
}

#[test]
fn release_sets_halt_without_touching_sequence_state() {
    let mut session = Session::new(SessionConfig::classic());
    session.ns = true;
    session.release();
    assert!(session.state.contains(iso7816_t1::session::StateFlags::HALT));
    assert!(session.ns);
}

#[test]
#[should_panic(expected = "NAD rebind with different addresses")]
fn rebinding_to_a_different_address_pair_panics() {
    let mut session = Session::new(SessionConfig::classic());
    session.bind(2, 1);
    session.bind(3, 1);
}

#[test]
fn extended_default_ifsc_differs_from_classic() {
    let classic = Session::new(SessionConfig::classic());
    let extended = Session::new(SessionConfig::extended());
    assert_ne!(classic.ifsc, extended.ifsc);
}

#[test]
fn classic_session_defaults_to_lrc() {
    let session = Session::new(SessionConfig::classic());
    assert_eq!(session.chk_algo, ChkAlgo::Lrc);
}

#[test]
fn classic_session_can_opt_into_crc_ccitt() {
    let config = SessionConfig::classic().with_chk_algo(ChkAlgo::CrcCcitt);
    let session = Session::new(config);
    assert_eq!(session.chk_algo, ChkAlgo::CrcCcitt);
}

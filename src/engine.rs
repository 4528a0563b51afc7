//! Dispatch loop: the state machine that drives one request/response
//! exchange to completion.
//!
//! Grounded on `t1_loop`/`t1_transceive`/`read_block` in
//! `examples/original_source/secure_element/esehal/src/iso7816_t1.c`
//! (classic) and the extended divergences in `esehal_gp/src/iso7816_t1.c`.

use log::{debug, trace, warn};

use crate::block::{self, Block, RError};
use crate::checksum;
use crate::constants::*;
use crate::error::{Result, T1Error};
use crate::session::{PendingRequest, Session, StateFlags};
use crate::transport::{RecvShape, Transport};

fn recv_shape(session: &Session) -> RecvShape {
    RecvShape {
        nadc: session.nadc,
        len_width: session.dialect.len_width,
        chk_len: checksum::checksum_len(session.chk_algo),
        ifs_max: session.dialect.ifs_max,
    }
}

/// Promotes the highest-priority armed one-shot flag into `state.REQUEST`
/// plus a `pending_request`, if nothing is already pending. Order: reset/
/// CIP boot step, then resync, then IFS sync — matches the boot chain in
/// SPEC_FULL.md §4.4.1/§4.4.5.
fn arm_pending_request(session: &mut Session) {
    if session.pending_request.is_some() || session.state.contains(StateFlags::REQUEST) {
        return;
    }
    if session.need_reset {
        session.pending_request = Some(PendingRequest::Reset);
    } else if session.need_cip {
        session.pending_request = Some(PendingRequest::Cip);
    } else if session.need_resync {
        session.pending_request = Some(PendingRequest::Resync);
    } else if session.need_ifsd_sync {
        session.pending_request = Some(PendingRequest::Ifs(session.ifsd));
    } else {
        return;
    }
    session.state.insert(StateFlags::REQUEST);
}

fn request_block(kind: PendingRequest, dialect_uses_cip: bool) -> Block {
    match kind {
        PendingRequest::Reset => Block::S {
            response: false,
            kind: if dialect_uses_cip { S_KIND_SWR } else { S_KIND_RESET },
            payload: Vec::new(),
        },
        PendingRequest::Cip => Block::S {
            response: false,
            kind: S_KIND_CIP,
            payload: Vec::new(),
        },
        PendingRequest::Resync => Block::S {
            response: false,
            kind: S_KIND_RESYNC,
            payload: Vec::new(),
        },
        PendingRequest::Ifs(value) => Block::S {
            response: false,
            kind: S_KIND_IFS,
            payload: if value <= 0xFF {
                vec![value as u8]
            } else {
                vec![(value >> 8) as u8, (value & 0xFF) as u8]
            },
        },
    }
}

fn build_i_block(session: &Session, apdu: &[u8]) -> Block {
    let remaining = session.send.remaining();
    let take = remaining.min(session.ifsc as usize);
    let chunk = apdu[session.send.start..session.send.start + take].to_vec();
    Block::I {
        ns: session.ns,
        chain: take < remaining,
        payload: chunk,
    }
}

/// Chooses the next block to emit, per the priority list in
/// SPEC_FULL.md §4.4.
fn choose_block(session: &mut Session, apdu: &[u8]) -> Result<Block> {
    if session.state.contains(StateFlags::REQUEST) {
        let kind = session.pending_request.expect("REQUEST flag implies pending_request");
        Ok(request_block(kind, session.dialect.uses_cip))
    } else if session.state.contains(StateFlags::REQRESP) {
        session.state.remove(StateFlags::REQRESP);
        Ok(session
            .pending_response
            .take()
            .expect("REQRESP flag implies pending_response"))
    } else if session.state.contains(StateFlags::BADCRC) {
        Ok(Block::R {
            nr: session.nr,
            error: RError::Crc,
        })
    } else if session.state.contains(StateFlags::TIMEOUT) {
        Ok(Block::R {
            nr: session.nr,
            error: RError::Ok,
        })
    } else if !session.send.is_empty() {
        Ok(build_i_block(session, apdu))
    } else if session.state.contains(StateFlags::ABORTED) {
        Err(T1Error::BrokenPipe)
    } else {
        Ok(Block::R {
            nr: session.nr,
            error: RError::Ok,
        })
    }
}

fn on_timeout(session: &mut Session) -> Result<()> {
    if session.retries == 0 {
        session.state.insert(StateFlags::HALT);
        return Err(T1Error::Timeout);
    }
    session.retries -= 1;
    session.state.insert(StateFlags::TIMEOUT);
    warn!("block receive timed out, {} retries left", session.retries);
    Ok(())
}

fn on_badcrc(session: &mut Session) -> Result<()> {
    if session.retries == 0 {
        session.state.insert(StateFlags::HALT);
        return Err(T1Error::RemoteIoError);
    }
    session.retries -= 1;
    session.state.insert(StateFlags::BADCRC);
    warn!("received block failed checksum, {} retries left", session.retries);
    Ok(())
}

/// Handles a response to one of our own pending requests
/// (SPEC_FULL.md §4.4.1).
fn parse_response(session: &mut Session, kind: u8, payload: &[u8]) -> Result<()> {
    let expected = session
        .pending_request
        .ok_or_else(|| T1Error::BadMessage("unexpected S-response, nothing pending".into()))?;

    let expected_kind = match expected {
        PendingRequest::Reset => {
            if session.dialect.uses_cip {
                S_KIND_SWR
            } else {
                S_KIND_RESET
            }
        }
        PendingRequest::Cip => S_KIND_CIP,
        PendingRequest::Resync => S_KIND_RESYNC,
        PendingRequest::Ifs(_) => S_KIND_IFS,
    };
    if kind != expected_kind {
        return Err(T1Error::BadMessage(format!(
            "S-response kind {kind:#x} does not match pending request {expected_kind:#x}"
        )));
    }

    session.pending_request = None;
    session.retries = session.retry_budget;

    match expected {
        PendingRequest::Reset => {
            session.need_reset = false;
            if session.dialect.uses_cip {
                session.need_cip = true;
            } else {
                capture_atr(session, payload);
                session.need_ifsd_sync = true;
            }
        }
        PendingRequest::Cip => {
            session.need_cip = false;
            capture_atr(session, payload);
            session.need_ifsd_sync = true;
        }
        PendingRequest::Resync => {
            session.need_resync = false;
            session.ns = false;
            session.nr = false;
        }
        PendingRequest::Ifs(value) => {
            // This S(IFS) exchange announces *our* receive capacity
            // (IFSD) to the card; it does not change `ifsc`, which
            // bounds what we may send and is only updated by a
            // card-initiated S(IFS) request (see `parse_request`).
            if payload.is_empty() {
                return Err(T1Error::BadMessage("empty IFS response".into()));
            }
            session.ifsd = value;
            session.need_ifsd_sync = false;
        }
    }
    Ok(())
}

fn capture_atr(session: &mut Session, payload: &[u8]) {
    let n = payload.len().min(MAX_ATR_LEN);
    session.atr[..n].copy_from_slice(&payload[..n]);
    session.atr_length = n;

    let info = if session.dialect.uses_cip {
        crate::atr::scan_extended(&session.atr[..n])
    } else {
        crate::atr::scan_classic(&session.atr[..n])
    };
    if let Some(ifsc) = info.ifsc {
        session.ifsc = ifsc;
    }
    if let Some(bwt_ms) = info.bwt_ms {
        session.bwt_ms = bwt_ms;
    }
}

/// Handles a card-initiated S-block request (SPEC_FULL.md §4.4.2).
/// On acceptance, queues the matching response via `REQRESP`.
fn parse_request(session: &mut Session, kind: u8, payload: &[u8]) -> Result<()> {
    match kind {
        S_KIND_RESYNC if session.dialect.accepts_card_resync => {
            if !payload.is_empty() {
                return Err(T1Error::BadMessage("RESYNC request carries a payload".into()));
            }
            session.ns = false;
            session.nr = false;
            queue_response(session, kind, Vec::new());
            Ok(())
        }
        S_KIND_IFS => {
            let value: u16 = match payload.len() {
                1 => payload[0] as u16,
                2 => u16::from_be_bytes([payload[0], payload[1]]),
                _ => return Err(T1Error::BadMessage("invalid IFS request length".into())),
            };
            if value == 0 || value == 0xFF || value >= EXTENDED_INVALID_LEN_THRESHOLD {
                return Err(T1Error::BadMessage(format!("invalid IFS value {value}")));
            }
            session.ifsc = value;
            queue_response(session, kind, payload.to_vec());
            Ok(())
        }
        S_KIND_ABORT => {
            if !payload.is_empty() {
                return Err(T1Error::BadMessage("ABORT request carries a payload".into()));
            }
            session.state.insert(StateFlags::ABORTED);
            session.send.start = session.send.end;
            session.recv.end = 0;
            Ok(())
        }
        S_KIND_WTX => {
            if payload.len() != 1 {
                return Err(T1Error::BadMessage("invalid WTX request length".into()));
            }
            let requested = payload[0];
            session.wtx = requested.min(session.wtx_max_value).max(1);
            if session.wtx_rounds == 0 {
                session.state.insert(StateFlags::HALT);
                return Err(T1Error::Timeout);
            }
            session.wtx_rounds -= 1;
            queue_response(session, kind, vec![session.wtx]);
            Ok(())
        }
        _ => {
            session.state.insert(StateFlags::HALT);
            Err(T1Error::Unsupported(format!("S-block kind {kind:#x}")))
        }
    }
}

fn queue_response(session: &mut Session, kind: u8, payload: Vec<u8>) {
    session.pending_response = Some(Block::S {
        response: true,
        kind,
        payload,
    });
    session.state.insert(StateFlags::REQRESP);
}

/// Handles a successfully parsed block. Returns `Some(n)` when the
/// exchange is complete (`n` response bytes available), `None` to keep
/// looping.
fn handle_block(
    session: &mut Session,
    block: Block,
    halt_after_boot: bool,
    mut resp: Option<&mut [u8]>,
) -> Result<Option<usize>> {
    session.state.remove(StateFlags::BADCRC | StateFlags::TIMEOUT);

    match block {
        Block::I { ns, chain, payload } => {
            if !session.send.is_empty() {
                let take = (session.ifsc as usize).min(session.send.remaining());
                session.send.start += take;
                session.ns = !session.ns;
            }
            if ns == session.nr {
                if let Some(buf) = resp.as_deref_mut() {
                    let free = session.recv.capacity - session.recv.end;
                    if payload.len() > free {
                        session.state.insert(StateFlags::HALT);
                        return Err(T1Error::MessageTooLarge);
                    }
                    buf[session.recv.end..session.recv.end + payload.len()]
                        .copy_from_slice(&payload);
                }
                session.recv.end += payload.len();
                session.recv_size += payload.len();
                session.nr = !session.nr;
            }
            if session.recv_size > session.recv_max {
                session.state.insert(StateFlags::HALT);
                return Err(T1Error::MessageTooLarge);
            }
            session.retries = session.retry_budget;
            session.wtx_rounds = session.wtx_max_rounds;
            if chain {
                Ok(None)
            } else {
                session.state.insert(StateFlags::HALT);
                Ok(Some(session.recv.end))
            }
        }
        Block::R { nr, error } => match error {
            RError::Ok => {
                if nr != session.ns {
                    let take = (session.ifsc as usize).min(session.send.remaining());
                    session.send.start += take;
                    session.ns = !session.ns;
                    session.retries = session.retry_budget;
                    Ok(None)
                } else {
                    if session.retries == 0 {
                        session.state.insert(StateFlags::HALT);
                        return Err(T1Error::Timeout);
                    }
                    session.retries -= 1;
                    Ok(None)
                }
            }
            RError::Crc => {
                if session.retries == 0 {
                    session.state.insert(StateFlags::HALT);
                    return Err(T1Error::RemoteIoError);
                }
                session.retries -= 1;
                session.ns = nr;
                Ok(None)
            }
            RError::Other => {
                session.state.insert(StateFlags::HALT);
                Err(T1Error::BadMessage("card signalled an R-block error".into()))
            }
            RError::Reserved => {
                if session.retries == 0 {
                    session.state.insert(StateFlags::HALT);
                    return Err(T1Error::Timeout);
                }
                session.retries -= 1;
                session.need_resync = true;
                Ok(None)
            }
        },
        Block::S { response, kind, payload } => {
            if response && session.pending_request.is_some() {
                parse_response(session, kind, &payload)?;
            } else {
                parse_request(session, kind, &payload)?;
            }

            let boot_flags_pending = session.need_reset
                || session.need_cip
                || session.need_resync
                || session.need_ifsd_sync;
            if halt_after_boot && !boot_flags_pending && session.pending_request.is_none() {
                session.state.insert(StateFlags::HALT);
                Ok(Some(session.recv.end.max(session.atr_length)))
            } else {
                Ok(None)
            }
        }
    }
}

/// Drives the dispatch loop to completion. `halt_after_boot` selects
/// whether the loop stops as soon as the one-shot boot/control chain
/// settles (`reset`/`resync`/`negotiate_ifsd`/`get_atr`) or continues on
/// into ordinary I-block exchange (`transceive`).
pub fn run_loop(
    session: &mut Session,
    transport: &mut dyn Transport,
    apdu: &[u8],
    mut resp: Option<&mut [u8]>,
    halt_after_boot: bool,
) -> Result<usize> {
    loop {
        arm_pending_request(session);
        if session.state.contains(StateFlags::HALT) {
            break;
        }

        let to_send = choose_block(session, apdu)?;
        trace!("emitting {to_send:?}");
        let wire = block::pack_block(session.dialect, session.chk_algo, session.nad, &to_send);
        transport.send_block(&wire)?;

        let shape = recv_shape(session);
        let wtx = session.wtx;
        session.wtx = 1;

        let mut raw = Vec::new();
        match transport.recv_block(&mut raw, shape, session.bwt_ms, wtx) {
            Ok(_) => {}
            Err(T1Error::Timeout) => {
                on_timeout(session)?;
                continue;
            }
            Err(e) => {
                session.retries = 0;
                session.state.insert(StateFlags::HALT);
                return Err(e);
            }
        }

        match block::parse_block(session.dialect, session.chk_algo, session.nadc, &raw) {
            Ok(parsed) => {
                if let Some(done) = handle_block(session, parsed, halt_after_boot, resp.as_deref_mut())? {
                    return Ok(done);
                }
            }
            Err(T1Error::RemoteIoError) => on_badcrc(session)?,
            Err(e) => {
                session.retries = 0;
                session.state.insert(StateFlags::HALT);
                return Err(e);
            }
        }
    }
    Ok(session.recv.end)
}

/// One automatic retry on failure, per SPEC_FULL.md §4.4.3: a failed
/// exchange that was not already part of a reset/resync recovery attempt
/// gets exactly one more try before surfacing `FATAL_LINK_DEAD`.
pub fn transceive(
    session: &mut Session,
    transport: &mut dyn Transport,
    apdu: &[u8],
    resp: &mut [u8],
) -> Result<usize> {
    session.clear_transient();
    session.send.start = 0;
    session.send.end = apdu.len();
    session.recv.capacity = resp.len();

    match run_loop(session, transport, apdu, Some(resp), false) {
        Ok(n) => Ok(n),
        Err(T1Error::BrokenPipe) => Err(T1Error::BrokenPipe),
        Err(first_err) => {
            let was_recovery_attempt = matches!(
                session.pending_request,
                Some(PendingRequest::Reset) | Some(PendingRequest::Resync)
            );
            if was_recovery_attempt {
                return Err(T1Error::FatalLinkDead);
            }
            debug!("transceive failed ({first_err}), arming automatic recovery");
            if session.dialect.uses_cip {
                session.need_resync = true;
            } else {
                session.need_reset = true;
            }
            session.clear_transient();
            session.send.start = 0;
            session.send.end = apdu.len();
            session.recv.capacity = resp.len();
            run_loop(session, transport, apdu, Some(resp), false).map_err(|_| T1Error::FatalLinkDead)
        }
    }
}

pub fn reset(session: &mut Session, transport: &mut dyn Transport) -> Result<()> {
    session.clear_transient();
    session.need_reset = true;
    run_loop(session, transport, &[], None, true)?;
    Ok(())
}

pub fn resync(session: &mut Session, transport: &mut dyn Transport) -> Result<()> {
    session.clear_transient();
    session.need_resync = true;
    run_loop(session, transport, &[], None, true)?;
    Ok(())
}

pub fn negotiate_ifsd(session: &mut Session, transport: &mut dyn Transport, new_ifsd: u16) -> Result<()> {
    session.clear_transient();
    session.ifsd = new_ifsd;
    session.need_ifsd_sync = true;
    run_loop(session, transport, &[], None, true)?;
    Ok(())
}

pub fn get_atr(session: &mut Session, transport: &mut dyn Transport, out: &mut [u8]) -> Result<usize> {
    if session.atr_length == 0 {
        session.clear_transient();
        run_loop(session, transport, &[], None, true)?;
    }
    if out.len() < session.atr_length {
        return Err(T1Error::InvalidArgument("ATR buffer too small".into()));
    }
    out[..session.atr_length].copy_from_slice(&session.atr[..session.atr_length]);
    Ok(session.atr_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::pack_block;
    use crate::dialect::CLASSIC;
    use crate::session::SessionConfig;
    use crate::transport::mock::MockTransport;

    fn bound_classic_session() -> Session {
        let mut s = Session::new(SessionConfig::classic());
        s.bind(2, 1);
        s
    }

    fn card_reply(session: &Session, block: &Block) -> Vec<u8> {
        pack_block(&CLASSIC, session.chk_algo, session.nadc, block)
    }

    #[test]
    fn boot_then_single_block_transceive() {
        let mut session = bound_classic_session();
        let mut transport = MockTransport::new();

        // RESET RESP carrying a trivial ATR, IFS RESP acking IFSD=254,
        // then the APDU's I-block response.
        transport.queue_block(card_reply(
            &session,
            &Block::S {
                response: true,
                kind: S_KIND_RESET,
                payload: vec![],
            },
        ));
        transport.queue_block(card_reply(
            &session,
            &Block::S {
                response: true,
                kind: S_KIND_IFS,
                payload: vec![254],
            },
        ));
        transport.queue_block(card_reply(
            &session,
            &Block::I {
                ns: false,
                chain: false,
                payload: vec![0x90, 0x00],
            },
        ));

        let apdu = [0x00, 0xA4, 0x04, 0x00, 0x00];
        let mut resp = [0u8; 16];
        let n = transceive(&mut session, &mut transport, &apdu, &mut resp).unwrap();
        assert_eq!(&resp[..n], &[0x90, 0x00]);
        assert_eq!(transport.sent.len(), 3);
    }

    #[test]
    fn checksum_error_then_recovery_consumes_one_retry() {
        let mut session = bound_classic_session();
        session.need_reset = false; // skip boot for this focused test
        let mut transport = MockTransport::new();

        let mut corrupted = card_reply(
            &session,
            &Block::I {
                ns: false,
                chain: false,
                payload: vec![0x90, 0x00],
            },
        );
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;
        transport.queue_block(corrupted);
        transport.queue_block(card_reply(
            &session,
            &Block::I {
                ns: false,
                chain: false,
                payload: vec![0x90, 0x00],
            },
        ));

        let apdu = [0x00, 0xA4, 0x04, 0x00, 0x00];
        let mut resp = [0u8; 16];
        let n = transceive(&mut session, &mut transport, &apdu, &mut resp).unwrap();
        assert_eq!(&resp[..n], &[0x90, 0x00]);
        // A clean receive resets the error budget back to full.
        assert_eq!(session.retries, session.retry_budget);
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn card_initiated_wtx_is_acknowledged_and_counted() {
        let mut session = bound_classic_session();
        session.need_reset = false;
        let rounds_before = session.wtx_rounds;
        let mut transport = MockTransport::new();

        transport.queue_block(card_reply(
            &session,
            &Block::S {
                response: false,
                kind: S_KIND_WTX,
                payload: vec![1],
            },
        ));
        transport.queue_block(card_reply(
            &session,
            &Block::I {
                ns: false,
                chain: false,
                payload: vec![0x90, 0x00],
            },
        ));

        let apdu = [0x00, 0xA4, 0x04, 0x00, 0x00];
        let mut resp = [0u8; 16];
        let n = transceive(&mut session, &mut transport, &apdu, &mut resp).unwrap();
        assert_eq!(&resp[..n], &[0x90, 0x00]);
        assert_eq!(session.wtx_rounds, rounds_before - 1);
    }
}

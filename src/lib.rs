//! # iso7816-t1 - ISO/IEC 7816-3 T=1 Block Transmission Protocol Engine
//!
//! This crate implements the T=1 block transmission protocol used to talk
//! to an embedded secure element over a framed, half-duplex character
//! device: block framing, checksums, I-block chaining, IFS negotiation,
//! waiting-time extension, resynchronisation, and the reset/CIP boot
//! handshake. Two dialects share one dispatch loop: a classic variant
//! (1-byte length, 8-bit LRC, payload ≤ 254 B) and an extended variant
//! (2-byte length, 16-bit CRC, payload up to ~4 KiB, with CIP/SWR
//! S-blocks).
//!
//! ## Usage
//!
//! ```no_run
//! use iso7816_t1::{SessionConfig, T1Device, transport::CharDeviceTransport};
//! use std::fs::OpenOptions;
//!
//! # fn main() -> iso7816_t1::error::Result<()> {
//! let port = OpenOptions::new().read(true).write(true).open("/dev/t1ese0")?;
//! let mut device = T1Device::new(SessionConfig::classic(), CharDeviceTransport::new(port));
//! device.bind(2, 1);
//!
//! let mut resp = [0u8; 256];
//! let n = device.transceive(&[0x00, 0xA4, 0x04, 0x00, 0x00], &mut resp)?;
//! println!("{:02x?}", &resp[..n]);
//! # Ok(())
//! # }
//! ```

pub mod atr;
pub mod block;
pub mod checksum;
pub mod constants;
pub mod device;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod instrumentation;
pub mod logging;
pub mod session;
pub mod transport;
pub mod util;

pub use crate::device::T1Device;
pub use crate::dialect::{ChkAlgo, Dialect, DialectKind};
pub use crate::error::{Result, T1Error};
pub use crate::instrumentation::SessionStats;
pub use crate::logging::{init_logger, log_info};
pub use crate::session::{Session, SessionConfig};
pub use crate::transport::{CharDeviceTransport, Transport};

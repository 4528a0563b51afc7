//! GPIO rising-edge line-event waiter, behind the `gpio-irq` feature.
//!
//! Replaces the teacher's Raspberry-Pi-specific `rppal` GPIO driver with a
//! thin `nix::poll` wait on a caller-opened sysfs/gpiochip line-event file
//! descriptor — the crate never opens the GPIO line itself, it only polls
//! a handle the caller already set up (SPEC_FULL.md §4.2).

use std::os::fd::{BorrowedFd, RawFd};
use std::time::Instant;

use nix::poll::{poll, PollFd, PollFlags};

use super::EdgeWaiter;
use crate::error::{Result, T1Error};

/// Waits for a rising edge on a raw GPIO line-event fd.
pub struct GpioEdgeWaiter {
    fd: RawFd,
}

impl GpioEdgeWaiter {
    /// `fd` must already be configured by the caller for rising-edge
    /// notifications (e.g. via the Linux gpiochip character device ABI).
    pub fn new(fd: RawFd) -> Self {
        GpioEdgeWaiter { fd }
    }
}

impl EdgeWaiter for GpioEdgeWaiter {
    fn wait(&mut self, deadline: Instant) -> Result<()> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(T1Error::Timeout);
            }
            let timeout_ms = remaining.as_millis().min(i32::MAX as u128) as i32;

            let borrowed = unsafe { BorrowedFd::borrow_raw(self.fd) };
            let mut fds = [PollFd::new(borrowed, PollFlags::POLLPRI | PollFlags::POLLIN)];
            match poll(&mut fds, timeout_ms) {
                Ok(0) => return Err(T1Error::Timeout),
                Ok(_) => return Ok(()),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(T1Error::Io(std::io::Error::from_raw_os_error(e as i32))),
            }
        }
    }
}

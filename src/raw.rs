//! Engine calls for descriptors the caller opened and owns
//!
//! Every call resolves the descriptor through the process-wide registry first. A descriptor that
//! was never registered (or has been unregistered) fails with [Error::InvalidHandle] before any
//! I/O happens. [register] switches the descriptor to non-blocking mode so that no transfer can
//! block inside the kernel past its deadline.

use log::debug;
use rustix::fd::{AsFd, AsRawFd};
use rustix::fs::{fcntl_getfl, fcntl_setfl, OFlags};
use std::time::Duration;

use crate::wait::Direction;
use crate::{engine, registry, Error, Result};

/// Make `fd` usable with this module; repeated calls are no-ops
pub fn register<Fd: AsFd>(fd: Fd) -> Result<()> {
    let fd = fd.as_fd();
    let flags = fcntl_getfl(fd)?;
    if !flags.contains(OFlags::NONBLOCK) {
        fcntl_setfl(fd, flags | OFlags::NONBLOCK)?;
        debug!("Switched fd {} to non-blocking", fd.as_raw_fd());
    }
    registry::register(fd).map(drop)
}

/// Release the abort channels for `fd`; safe on descriptors that were never registered
pub fn unregister<Fd: AsFd>(fd: Fd) {
    registry::unregister(fd)
}

/// See [engine::read]
pub fn read<Fd: AsFd>(fd: Fd, buf: &mut [u8], timeout: Duration, multiplier: u32) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidArgument("read buffer is empty"));
    }
    let pair = registry::lookup(&fd).ok_or(Error::InvalidHandle)?;
    engine::read(fd, Some(pair.channel(Direction::Read)), buf, timeout, multiplier)
}

/// See [engine::write]
pub fn write<Fd: AsFd>(fd: Fd, buf: &[u8], timeout: Duration, multiplier: u32) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidArgument("write buffer is empty"));
    }
    let pair = registry::lookup(&fd).ok_or(Error::InvalidHandle)?;
    engine::write(fd, Some(pair.channel(Direction::Write)), buf, timeout, multiplier)
}

/// Cancel the read in flight on `fd`, or the next one if none is
pub fn abort_read<Fd: AsFd>(fd: Fd) -> Result<()> {
    signal(fd, Direction::Read)
}

/// Cancel the write in flight on `fd`, or the next one if none is
pub fn abort_write<Fd: AsFd>(fd: Fd) -> Result<()> {
    signal(fd, Direction::Write)
}

fn signal<Fd: AsFd>(fd: Fd, direction: Direction) -> Result<()> {
    registry::lookup(fd)
        .ok_or(Error::InvalidHandle)?
        .signal(direction)
}

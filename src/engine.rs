//! Deadline-bounded read and write loops over a non-blocking descriptor
//!
//! Both engines suspend only inside [wait](crate::wait::wait). A timeout is reported as a short
//! (possibly empty) transfer; an abort or an OS error ends the call immediately.

use log::{debug, trace};
use rustix::fd::AsFd;
use rustix::io::Errno;
use std::time::Duration;

use crate::abort::AbortChannel;
use crate::wait::{wait, Direction, Readiness};
use crate::{Error, Result};

/// Second, short wait after a wake-up that produced no bytes
pub const GRACE_TIMEOUT: Duration = Duration::from_millis(10);

/// Timeout for every wait after the first one
///
/// A multiplier of zero means "no accumulation", in which case the base timeout is reused.
pub fn chunk_timeout(base: Duration, multiplier: u32) -> Duration {
    if multiplier == 0 {
        base
    } else {
        base.saturating_mul(multiplier)
    }
}

/// Read up to `buf.len()` bytes
///
/// Waits up to `timeout` for the first bytes. With a `multiplier` of zero the first successful
/// read is returned as is; otherwise reading continues, each further wait lasting
/// `timeout * multiplier`, until the buffer is full or a wait times out. Without an abort channel
/// the call can only end by data, timeout or error.
pub fn read<Fd: AsFd>(
    fd: Fd,
    abort: Option<&AbortChannel>,
    buf: &mut [u8],
    timeout: Duration,
    multiplier: u32,
) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidArgument("read buffer is empty"));
    }
    let fd = fd.as_fd();

    let mut total = read_chunk(fd, abort, buf, timeout)?;
    if total == 0 || multiplier == 0 {
        return Ok(total);
    }

    let timeout = chunk_timeout(timeout, multiplier);
    while total < buf.len() {
        let n = read_chunk(fd, abort, &mut buf[total..], timeout)?;
        if n == 0 {
            break;
        }
        total += n;
    }

    trace!("read: accumulated {} of {} bytes", total, buf.len());
    Ok(total)
}

/// Write all of `buf`, or as much as fits before a wait times out
///
/// Partial writes are normal for pipes and ttys and are continued. The first wait lasts
/// `timeout`; later waits use [chunk_timeout].
pub fn write<Fd: AsFd>(
    fd: Fd,
    abort: Option<&AbortChannel>,
    buf: &[u8],
    timeout: Duration,
    multiplier: u32,
) -> Result<usize> {
    if buf.is_empty() {
        return Err(Error::InvalidArgument("write buffer is empty"));
    }
    let fd = fd.as_fd();

    let mut written = 0;
    let mut wait_for = timeout;
    while written < buf.len() {
        match wait(fd, abort, wait_for, Direction::Write)? {
            Readiness::Ready => {}
            Readiness::Timeout => {
                debug!("write: timed out after {} of {} bytes", written, buf.len());
                break;
            }
            Readiness::Aborted => return Err(Error::AbortedWrite),
        }

        match rustix::io::write(fd, &buf[written..]) {
            Ok(n) => {
                trace!("write: wrote {} bytes", n);
                written += n;
            }
            Err(Errno::AGAIN) | Err(Errno::INTR) => {}
            Err(e) => return Err(e.into()),
        }
        wait_for = chunk_timeout(timeout, multiplier);
    }

    Ok(written)
}

/// One wait-then-read step with a single grace retry on an empty wake-up
fn read_chunk<Fd: AsFd>(
    fd: Fd,
    abort: Option<&AbortChannel>,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<usize> {
    let fd = fd.as_fd();
    for wait_for in [timeout, GRACE_TIMEOUT] {
        match wait(fd, abort, wait_for, Direction::Read)? {
            Readiness::Ready => {}
            Readiness::Timeout => return Ok(0),
            Readiness::Aborted => return Err(Error::AbortedRead),
        }
        let n = read_nonblocking(fd, buf)?;
        if n > 0 {
            trace!("read_chunk: read {} bytes", n);
            return Ok(n);
        }
        trace!("read_chunk: ready but empty");
    }
    Ok(0)
}

fn read_nonblocking<Fd: AsFd>(fd: Fd, buf: &mut [u8]) -> Result<usize> {
    match rustix::io::read(fd, buf) {
        Ok(n) => Ok(n),
        Err(Errno::AGAIN) | Err(Errno::INTR) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

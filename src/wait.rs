use log::{debug, trace};
use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::AsFd;
use rustix::io::Errno;
use std::time::{Duration, Instant};

use crate::abort::AbortChannel;

/// Which kind of readiness a wait is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// Outcome of a readiness wait that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The data descriptor can be read from or written to (or has hung up or errored, which the
    /// following transfer will report)
    Ready,
    /// Nothing happened before the timeout
    Timeout,
    /// The abort channel was signalled; the pending signal has been consumed
    Aborted,
}

/// Block until `data` is ready in `direction`, `abort` is signalled, or `timeout` elapses
///
/// A zero timeout polls once without blocking. The abort channel is always watched for
/// readability, whatever the direction. If the data descriptor and the abort channel become ready
/// in the same cycle, [Readiness::Aborted] wins so that a cancelled caller never sees a completed
/// transfer. Interrupted polls are resumed with the remaining time.
pub fn wait<Fd: AsFd>(
    data: Fd,
    abort: Option<&AbortChannel>,
    timeout: Duration,
    direction: Direction,
) -> std::io::Result<Readiness> {
    let data_events = match direction {
        Direction::Read => PollFlags::IN,
        Direction::Write => PollFlags::OUT,
    };
    let ready_mask = data_events | PollFlags::HUP | PollFlags::ERR | PollFlags::NVAL;
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => timeout,
        };

        let data_fd = data.as_fd();
        let mut fds = Vec::with_capacity(2);
        fds.push(PollFd::new(&data_fd, data_events));
        let abort_fd = abort.map(AbortChannel::wait_fd);
        if let Some(abort_fd) = abort_fd.as_ref() {
            fds.push(PollFd::new(abort_fd, PollFlags::IN));
        }

        trace!("wait: {:?} for up to {:?}", direction, remaining);
        match poll(&mut fds, poll_timeout_ms(remaining)) {
            Ok(0) => return Ok(Readiness::Timeout),
            Ok(_) => {}
            Err(Errno::INTR) => {
                if remaining.is_zero() {
                    return Ok(Readiness::Timeout);
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        let aborted = fds
            .get(1)
            .is_some_and(|fd| fd.revents().intersects(PollFlags::IN | PollFlags::HUP));
        let data_ready = fds[0].revents().intersects(ready_mask);
        drop(fds);

        if aborted {
            if let Some(abort) = abort {
                abort.drain();
            }
            debug!("wait: {:?} aborted", direction);
            return Ok(Readiness::Aborted);
        }
        if data_ready {
            return Ok(Readiness::Ready);
        }
        // woken without anything we asked for
        if remaining.is_zero() {
            return Ok(Readiness::Timeout);
        }
    }
}

/// Milliseconds for `poll`, rounded up so a sub-millisecond timeout still blocks briefly
fn poll_timeout_ms(timeout: Duration) -> i32 {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    i32::try_from(millis).unwrap_or(i32::MAX)
}

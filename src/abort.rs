use log::{debug, trace};
use rustix::fd::{AsFd, BorrowedFd, OwnedFd};
use rustix::io::Errno;
use rustix::pipe::{pipe_with, PipeFlags};
use std::sync::Arc;

use crate::wait::Direction;
use crate::Result;

/// One-way cancellation channel built on a non-blocking, close-on-exec pipe
///
/// An abort is signalled by making the wait end readable. Posting while a token is already
/// pending never blocks and never fails, so a signal behaves as a level rather than a count.
#[derive(Debug)]
pub struct AbortChannel {
    wait_end: OwnedFd,
    signal_end: OwnedFd,
}

impl AbortChannel {
    pub fn new() -> Result<Self> {
        let (wait_end, signal_end) = pipe_with(PipeFlags::NONBLOCK | PipeFlags::CLOEXEC)?;
        Ok(Self {
            wait_end,
            signal_end,
        })
    }

    /// Post one cancellation token
    pub fn signal(&self) -> Result<()> {
        loop {
            match rustix::io::write(&self.signal_end, &[1]) {
                Ok(_) => return Ok(()),
                // pipe full: a token is already pending
                Err(Errno::AGAIN) => return Ok(()),
                Err(Errno::INTR) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Consume every pending token, returning whether any was pending
    pub fn drain(&self) -> bool {
        let mut buf = [0u8; 64];
        let mut drained = false;
        loop {
            match rustix::io::read(&self.wait_end, &mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    trace!("drain: discarded {} abort token(s)", n);
                    drained = true;
                }
                Err(Errno::INTR) => continue,
                Err(_) => break,
            }
        }
        drained
    }

    /// The end watched by the readiness wait
    pub fn wait_fd(&self) -> BorrowedFd<'_> {
        self.wait_end.as_fd()
    }
}

/// The read and write cancellation channels belonging to one data descriptor
#[derive(Debug)]
pub struct AbortPair {
    read: AbortChannel,
    write: AbortChannel,
}

impl AbortPair {
    pub fn new() -> Result<Self> {
        Ok(Self {
            read: AbortChannel::new()?,
            write: AbortChannel::new()?,
        })
    }

    pub fn channel(&self, direction: Direction) -> &AbortChannel {
        match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        }
    }

    pub fn signal(&self, direction: Direction) -> Result<()> {
        debug!("Posting {:?} abort", direction);
        self.channel(direction).signal()
    }
}

/// A cloneable, thread-safe way to cancel reads and writes on a port from elsewhere
///
/// Signals posted while nothing is in flight are kept until the next call in that direction
/// observes them.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    pair: Arc<AbortPair>,
}

impl AbortHandle {
    pub(crate) fn new(pair: Arc<AbortPair>) -> Self {
        Self { pair }
    }

    /// Cancel the current (or next) read
    pub fn abort_read(&self) -> Result<()> {
        self.pair.signal(Direction::Read)
    }

    /// Cancel the current (or next) write
    pub fn abort_write(&self) -> Result<()> {
        self.pair.signal(Direction::Write)
    }
}

use log::{debug, trace, warn};
use parking_lot::Mutex;
use rustix::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use rustix::fs::{fcntl_getfl, fcntl_setfl, open, Mode, OFlags};
use rustix::termios::{tcdrain, tcflush, tcsetattr, OptionalActions, QueueSelector, Termios};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{Hooks, SerialConfig};
use crate::abort::{AbortHandle, AbortPair};
use crate::wait::Direction;
use crate::{engine, registry, Error, Result};

/// Byte totals for a port since it was opened (or last reset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// An open serial connection
///
/// The port owns its descriptor and its two abort channels and releases all of them exactly once,
/// either through [close](Self::close) or on drop. All methods take `&self`: a port can be shared
/// between threads (for example in an [Arc]) so that one thread reads, another writes and a third
/// aborts. Calls in the same direction are serialised; reads and writes do not block each other.
///
/// While the port is alive its channels are also registered under its descriptor, so the
/// functions in [raw](crate::raw) accept it too.
#[derive(Debug)]
pub struct Port {
    fd: OwnedFd,
    abort: Arc<AbortPair>,
    original: Option<Termios>,
    config: Option<SerialConfig>,
    read_lock: Mutex<()>,
    write_lock: Mutex<()>,
    rx_total: AtomicU64,
    tx_total: AtomicU64,
    hooks: Hooks,
    released: bool,
}

impl Port {
    /// Open the device at `path` and configure the line
    pub fn open<P: AsRef<Path>>(path: P, config: &SerialConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        let fd = open(
            path,
            OFlags::RDWR | OFlags::NOCTTY | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        )?;
        debug!("Opened {}", path.display());

        Self::from_fd_with_config(fd, config)
    }

    /// Wrap an already open descriptor such as a pipe end, socket or pty
    ///
    /// The descriptor is switched to non-blocking mode; its line settings are left alone.
    pub fn from_fd(fd: OwnedFd) -> Result<Self> {
        Self::build(fd)
    }

    /// Like [from_fd](Self::from_fd), but also apply `config` (the descriptor must be a tty)
    pub fn from_fd_with_config(fd: OwnedFd, config: &SerialConfig) -> Result<Self> {
        // build first, so a failure after the line is reconfigured still goes through release
        let mut port = Self::build(fd)?;
        port.original = Some(config.apply(&port.fd)?);
        port.config = Some(*config);
        Ok(port)
    }

    fn build(fd: OwnedFd) -> Result<Self> {
        let flags = fcntl_getfl(&fd)?;
        if !flags.contains(OFlags::NONBLOCK) {
            fcntl_setfl(&fd, flags | OFlags::NONBLOCK)?;
        }

        let abort = Arc::new(AbortPair::new()?);
        registry::attach(&fd, Arc::clone(&abort));

        Ok(Self {
            fd,
            abort,
            original: None,
            config: None,
            read_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            rx_total: AtomicU64::new(0),
            tx_total: AtomicU64::new(0),
            hooks: Hooks::default(),
            released: false,
        })
    }

    /// Replace the notification sinks for this port
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Settings applied at open time, if the port was configured
    pub fn config(&self) -> Option<&SerialConfig> {
        self.config.as_ref()
    }

    /// Read up to `buf.len()` bytes
    ///
    /// Hooks run after the direction lock is released, so a sink may call back into the port.
    /// Returns `Ok(0)` if nothing arrived within `timeout`. A non-zero `multiplier` keeps reading
    /// after the first bytes, waiting up to `timeout * multiplier` for each further chunk, until
    /// `buf` is full or a chunk wait times out.
    pub fn read(&self, buf: &mut [u8], timeout: Duration, multiplier: u32) -> Result<usize> {
        let result = {
            let _guard = self.read_lock.lock();
            self.read_unlocked(buf, timeout, multiplier)
        };
        self.notify(result, Direction::Read)
    }

    /// Write `buf`, returning how many bytes went out before the deadline
    ///
    /// Fewer bytes than requested is a timeout, not an error.
    pub fn write(&self, buf: &[u8], timeout: Duration, multiplier: u32) -> Result<usize> {
        let result = {
            let _guard = self.write_lock.lock();
            self.write_unlocked(buf, timeout, multiplier)
        };
        self.notify(result, Direction::Write)
    }

    /// Read until `terminator` has been stored, `buf` is full, or a byte does not arrive in time
    ///
    /// The terminator is included in the returned count.
    pub fn read_until(
        &self,
        buf: &mut [u8],
        timeout: Duration,
        multiplier: u32,
        terminator: u8,
    ) -> Result<usize> {
        let result = {
            let _guard = self.read_lock.lock();
            self.read_until_with(buf, timeout, multiplier, |got| got.last() == Some(&terminator))
        };
        self.notify(result, Direction::Read)
    }

    /// Read until the whole of `sequence` has been received
    ///
    /// Otherwise behaves like [read_until](Self::read_until).
    pub fn read_until_sequence(
        &self,
        buf: &mut [u8],
        timeout: Duration,
        multiplier: u32,
        sequence: &[u8],
    ) -> Result<usize> {
        if sequence.is_empty() {
            return self.report(Err(Error::InvalidArgument("sequence is empty")));
        }
        if buf.len() < sequence.len() {
            return self.report(Err(Error::InvalidArgument(
                "buffer is shorter than the sequence",
            )));
        }
        let result = {
            let _guard = self.read_lock.lock();
            self.read_until_with(buf, timeout, multiplier, |got| got.ends_with(sequence))
        };
        self.notify(result, Direction::Read)
    }

    /// Read one `\n`-terminated line (newline included)
    pub fn read_line(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.read_until(buf, timeout, 0, b'\n')
    }

    /// Write `data` followed by `\n`
    pub fn write_line(&self, data: &[u8], timeout: Duration) -> Result<usize> {
        let mut line = Vec::with_capacity(data.len() + 1);
        line.extend_from_slice(data);
        line.push(b'\n');
        self.write(&line, timeout, 0)
    }

    /// Cancel the read in flight, or the next read if none is
    pub fn abort_read(&self) -> Result<()> {
        self.abort.signal(Direction::Read)
    }

    /// Cancel the write in flight, or the next write if none is
    pub fn abort_write(&self) -> Result<()> {
        self.abort.signal(Direction::Write)
    }

    /// A handle that can cancel this port's transfers from another thread
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle::new(Arc::clone(&self.abort))
    }

    /// Block until all queued output has been transmitted
    pub fn drain(&self) -> Result<()> {
        let result = {
            let _guard = self.write_lock.lock();
            tcdrain(&self.fd).map_err(Error::from)
        };
        self.report(result)
    }

    /// Discard received bytes that have not been read yet
    pub fn clear_input(&self) -> Result<()> {
        let result = {
            let _guard = self.read_lock.lock();
            tcflush(&self.fd, QueueSelector::IFlush).map_err(Error::from)
        };
        self.report(result)
    }

    /// Discard written bytes that have not been transmitted yet
    pub fn clear_output(&self) -> Result<()> {
        let result = {
            let _guard = self.write_lock.lock();
            tcflush(&self.fd, QueueSelector::OFlush).map_err(Error::from)
        };
        self.report(result)
    }

    /// Number of bytes that can be read without waiting
    pub fn bytes_waiting(&self) -> Result<usize> {
        let n = self.report(rustix::io::ioctl_fionread(&self.fd).map_err(Error::from))?;
        Ok(usize::try_from(n).unwrap_or(usize::MAX))
    }

    pub fn rx_bytes(&self) -> u64 {
        self.rx_total.load(Ordering::Relaxed)
    }

    pub fn tx_bytes(&self) -> u64 {
        self.tx_total.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> Stats {
        Stats {
            rx_bytes: self.rx_bytes(),
            tx_bytes: self.tx_bytes(),
        }
    }

    pub fn reset_stats(&self) {
        self.rx_total.store(0, Ordering::Relaxed);
        self.tx_total.store(0, Ordering::Relaxed);
    }

    /// Restore the original line settings and close the descriptor
    ///
    /// Dropping the port does the same but can only log failures.
    pub fn close(mut self) -> Result<()> {
        let result = self.release();
        if let Err(e) = &result {
            self.hooks.error(e);
        }
        result
    }

    fn read_unlocked(&self, buf: &mut [u8], timeout: Duration, multiplier: u32) -> Result<usize> {
        let n = engine::read(
            &self.fd,
            Some(self.abort.channel(Direction::Read)),
            buf,
            timeout,
            multiplier,
        )?;
        if n > 0 {
            self.rx_total.fetch_add(n as u64, Ordering::Relaxed);
        }
        Ok(n)
    }

    fn write_unlocked(&self, buf: &[u8], timeout: Duration, multiplier: u32) -> Result<usize> {
        let n = engine::write(
            &self.fd,
            Some(self.abort.channel(Direction::Write)),
            buf,
            timeout,
            multiplier,
        )?;
        if n > 0 {
            self.tx_total.fetch_add(n as u64, Ordering::Relaxed);
        }
        Ok(n)
    }

    fn read_until_with(
        &self,
        buf: &mut [u8],
        timeout: Duration,
        multiplier: u32,
        done: impl Fn(&[u8]) -> bool,
    ) -> Result<usize> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument("read buffer is empty"));
        }
        let mut total = 0;
        while total < buf.len() {
            if self.read_unlocked(&mut buf[total..=total], timeout, multiplier)? == 0 {
                break;
            }
            total += 1;
            if done(&buf[..total]) {
                break;
            }
        }
        trace!("read_until: got {} bytes", total);
        Ok(total)
    }

    /// Run the sinks for a finished transfer; must be called without a direction lock held
    fn notify(&self, result: Result<usize>, direction: Direction) -> Result<usize> {
        match (&result, direction) {
            (Ok(0), _) => {}
            (Ok(n), Direction::Read) => self.hooks.read(*n),
            (Ok(n), Direction::Write) => self.hooks.wrote(*n),
            (Err(e), _) => self.hooks.error(e),
        }
        result
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.hooks.error(e);
        }
        result
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        registry::detach(self.fd.as_raw_fd(), &self.abort);

        if let Some(original) = self.original.take() {
            tcsetattr(&self.fd, OptionalActions::Now, &original)
                .map_err(|e| Error::Configuration(format!("failed to restore termios: {}", e)))?;
        }
        debug!("Released fd {}", self.fd.as_raw_fd());
        Ok(())
    }
}

impl AsFd for Port {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Cleanup of fd {} failed: {}", self.fd.as_raw_fd(), e);
        }
    }
}

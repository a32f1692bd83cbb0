//! Process-wide map from raw descriptor to its abort channels
//!
//! [Port](crate::device::Port) carries its own channels and only publishes them here, so this map
//! is consulted on the hot path only for descriptors handed in through [raw](crate::raw). The lock
//! is held for map access only, never across a wait.

use log::debug;
use parking_lot::Mutex;
use rustix::fd::{AsFd, AsRawFd, RawFd};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::abort::AbortPair;
use crate::Result;

fn table() -> &'static Mutex<HashMap<RawFd, Arc<AbortPair>>> {
    static TABLE: OnceLock<Mutex<HashMap<RawFd, Arc<AbortPair>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Create abort channels for `fd` unless it already has some
pub fn register<Fd: AsFd>(fd: Fd) -> Result<Arc<AbortPair>> {
    let raw = fd.as_fd().as_raw_fd();
    let mut table = table().lock();
    if let Some(pair) = table.get(&raw) {
        return Ok(Arc::clone(pair));
    }
    let pair = Arc::new(AbortPair::new()?);
    table.insert(raw, Arc::clone(&pair));
    debug!("Registered abort channels for fd {}", raw);
    Ok(pair)
}

/// Publish channels that are owned elsewhere, replacing any stale entry for the same number
pub(crate) fn attach<Fd: AsFd>(fd: Fd, pair: Arc<AbortPair>) {
    let raw = fd.as_fd().as_raw_fd();
    if table().lock().insert(raw, pair).is_some() {
        debug!("Replaced stale abort channels for fd {}", raw);
    }
}

/// Drop the channels for `fd`; a no-op when none are registered
///
/// The pipes close once the last in-flight call holding the pair returns.
pub fn unregister<Fd: AsFd>(fd: Fd) {
    unregister_raw(fd.as_fd().as_raw_fd());
}

pub(crate) fn unregister_raw(raw: RawFd) {
    if table().lock().remove(&raw).is_some() {
        debug!("Unregistered abort channels for fd {}", raw);
    }
}

/// Remove the entry for `raw` only if it still points at `pair`
pub(crate) fn detach(raw: RawFd, pair: &Arc<AbortPair>) {
    let mut table = table().lock();
    if table.get(&raw).is_some_and(|p| Arc::ptr_eq(p, pair)) {
        table.remove(&raw);
        debug!("Detached abort channels for fd {}", raw);
    }
}

pub fn lookup<Fd: AsFd>(fd: Fd) -> Option<Arc<AbortPair>> {
    table().lock().get(&fd.as_fd().as_raw_fd()).cloned()
}

pub fn is_registered<Fd: AsFd>(fd: Fd) -> bool {
    table().lock().contains_key(&fd.as_fd().as_raw_fd())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustix::pipe::{pipe_with, PipeFlags};

    #[test]
    fn register_is_idempotent() {
        let (rx, _tx) = pipe_with(PipeFlags::CLOEXEC).unwrap();
        let first = register(&rx).unwrap();
        let second = register(&rx).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(is_registered(&rx));
        unregister(&rx);
        assert!(lookup(&rx).is_none());
    }

    #[test]
    fn unregister_twice_is_noop() {
        let (rx, _tx) = pipe_with(PipeFlags::CLOEXEC).unwrap();
        register(&rx).unwrap();
        unregister(&rx);
        unregister(&rx);
        assert!(!is_registered(&rx));
    }

    #[test]
    fn detach_leaves_newer_entry() {
        let (rx, _tx) = pipe_with(PipeFlags::CLOEXEC).unwrap();
        let old = Arc::new(AbortPair::new().unwrap());
        let new = Arc::new(AbortPair::new().unwrap());
        attach(&rx, Arc::clone(&old));
        attach(&rx, Arc::clone(&new));
        detach(rx.as_raw_fd(), &old);
        assert!(lookup(&rx).is_some_and(|p| Arc::ptr_eq(&p, &new)));
        detach(rx.as_raw_fd(), &new);
        assert!(!is_registered(&rx));
    }
}

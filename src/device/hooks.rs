use std::fmt;

use crate::Error;

type CountSink = Box<dyn Fn(usize) + Send + Sync>;
type ErrorSink = Box<dyn Fn(&Error) + Send + Sync>;

/// Optional per-port notification sinks
///
/// Each port carries its own set, so nothing is shared between ports.
#[derive(Default)]
pub struct Hooks {
    on_read: Option<CountSink>,
    on_write: Option<CountSink>,
    on_error: Option<ErrorSink>,
}

impl Hooks {
    /// Called with the byte count after every read that returned data
    pub fn on_read(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_read = Some(Box::new(f));
        self
    }

    /// Called with the byte count after every write that moved data
    pub fn on_write(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_write = Some(Box::new(f));
        self
    }

    /// Called with every error a port operation returns, aborts included
    pub fn on_error(mut self, f: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn read(&self, n: usize) {
        if let Some(f) = &self.on_read {
            f(n);
        }
    }

    pub(crate) fn wrote(&self, n: usize) {
        if let Some(f) = &self.on_write {
            f(n);
        }
    }

    pub(crate) fn error(&self, e: &Error) {
        if let Some(f) = &self.on_error {
            f(e);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_read", &self.on_read.is_some())
            .field("on_write", &self.on_write.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

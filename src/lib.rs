//! Cancellable, deadline-bounded I/O for serial devices
//!
//! Every read and write waits on the data descriptor and on a per-direction abort channel at the
//! same time, so another thread can cancel a blocked transfer at any moment. Timeouts are not
//! errors: a call that runs out of time returns the bytes it moved, possibly zero.
//!
//! # Usage
//! ```no_run
//! use serial_cancel::device::{Port, SerialConfig};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), serial_cancel::Error> {
//!     let port = Port::open("/dev/ttyACM0", &SerialConfig::new(115_200))?;
//!     port.write(b"Hello", Duration::from_millis(100), 0)?;
//!
//!     let aborter = port.abort_handle();
//!     std::thread::spawn(move || {
//!         std::thread::sleep(Duration::from_secs(1));
//!         aborter.abort_read()
//!     });
//!
//!     let mut buf = [0u8; 64];
//!     match port.read(&mut buf, Duration::from_secs(10), 1) {
//!         Ok(n) => println!("got {:?}", &buf[..n]),
//!         Err(serial_cancel::Error::AbortedRead) => println!("cancelled"),
//!         Err(e) => return Err(e),
//!     }
//!     port.close()
//! }
//! ```

#![forbid(unsafe_code)]

mod abort;
pub use abort::{AbortChannel, AbortHandle, AbortPair};

pub mod device;

pub mod engine;

mod error;
pub use error::{Error, Result};

pub mod raw;

pub mod registry;

mod wait;
pub use wait::{wait, Direction, Readiness};

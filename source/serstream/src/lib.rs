//! # serstream
//!
//! Byte-oriented access to a serial device, with both non-blocking reads and
//! deadline-bounded blocking reads.
//!
//! The device itself (opening it, configuring baud rate and parity, closing
//! it) is someone else's problem: this crate only needs something that
//! implements [`Device`], a primitive which waits *at most* a given duration
//! for data and returns whatever it got. On top of that primitive, a
//! [`SerialInputStream`] provides:
//!
//! - [`read_byte`](SerialInputStream::read_byte), which blocks for a single
//!   byte and fails with a [`Timeout`](ErrorKind::Timeout) error if none
//!   arrives in time,
//! - [`read_buffer`](SerialInputStream::read_buffer), which returns whatever is
//!   immediately available (possibly nothing) without blocking,
//! - [`blocking_read_buffer`](SerialInputStream::blocking_read_buffer), which
//!   blocks until the requested number of bytes have arrived or the timeout
//!   elapses, and returns however many bytes it got,
//! - [`available`](SerialInputStream::available), which reports how many bytes
//!   the device currently has buffered.
//!
//! Blocking reads wake up at least once every *poll period* to check the
//! stream's [`CancelToken`], so that even a read with an
//! [`Infinite`](Timeout::Infinite) timeout can be interrupted from another
//! thread.
//!
//! ```no_run
//! # #[cfg(feature = "serialport")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use serstream::{SerialDevice, SerialInputStream, Timeout};
//! use std::time::Duration;
//!
//! let device = SerialDevice::open(serialport::new("/dev/ttyUSB0", 115_200))?;
//! let mut stream = SerialInputStream::new(device);
//! stream.set_default_timeout(Timeout::Bounded(Duration::from_millis(500)));
//!
//! let mut buf = [0u8; 16];
//! let n = stream.blocking_read_into(&mut buf)?;
//! println!("got {n} bytes: {:02x?}", &buf[..n]);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serialport"))]
//! # fn main() {}
//! ```

pub mod cancel;
pub mod deadline;
pub mod device;
pub mod engine;
pub mod error;
mod settings;
pub mod stream;
mod timeout;

#[cfg(test)]
mod test_util;

pub use self::{
    cancel::CancelToken,
    device::{Device, DeviceFault, DeviceStatus},
    error::{Error, ErrorKind},
    settings::Settings,
    stream::SerialInputStream,
    timeout::{InvalidTimeout, ParseTimeoutError, Timeout},
};

#[cfg(feature = "serialport")]
pub use self::device::SerialDevice;

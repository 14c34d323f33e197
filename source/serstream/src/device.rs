//! The device primitive driven by [`SerialInputStream`].
//!
//! Opening, configuring and closing a device all happen outside of this
//! crate. A stream only needs a [`Device`], which can wait a bounded amount of
//! time for data.
//!
//! [`SerialInputStream`]: crate::SerialInputStream
use std::{fmt, io, time::Duration};

/// A byte source which can wait a bounded amount of time for data.
pub trait Device {
    /// The name of the port, used as context in errors.
    fn name(&self) -> &str;

    /// Waits at most `wait` for data, and copies whatever is available (up
    /// to `buf.len()` bytes) into `buf`.
    ///
    /// A zero `wait` must not block. Returning before `wait` has elapsed is
    /// always allowed, so spurious [`DeviceStatus::WouldBlock`]s are fine.
    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault>;

    /// Returns the number of bytes the device currently has buffered.
    ///
    /// Devices which report errors in-band may return a negative count.
    fn bytes_available(&mut self) -> Result<i64, DeviceFault>;
}

/// The result of a single [`Device::poll_read`] call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceStatus {
    /// `n` bytes were copied into the front of the buffer.
    Data(usize),
    /// No data arrived before the wait slice ran out.
    WouldBlock,
}

/// A failure signalled by the device layer.
///
/// [`ErrorKind::from_fault`](crate::ErrorKind::from_fault) maps every fault
/// onto the error taxonomy.
#[derive(Debug)]
pub enum DeviceFault {
    /// A native failure code.
    Code(i32),
    /// An error from the host OS.
    Io(io::Error),
}

// === impl DeviceFault ===

impl DeviceFault {
    pub const READ_INTERRUPTED: i32 = 1;
    pub const NO_MEMORY: i32 = 2;
    pub const PARAMETER_IS_NOT_CORRECT: i32 = 3;
    pub const PORT_NOT_OPENED: i32 = 4;
    pub const UNKNOWN: i32 = 5;

    /// Converts this fault into an `io::Error`, for use as an error source.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(error) => error,
            Self::Code(code) => io::Error::other(format!("device failure code {code}")),
        }
    }
}

impl From<io::Error> for DeviceFault {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "device failure code {code}"),
            Self::Io(error) => fmt::Display::fmt(error, f),
        }
    }
}

// === blanket impls ===

impl<D: Device + ?Sized> Device for &mut D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault> {
        (**self).poll_read(buf, wait)
    }

    fn bytes_available(&mut self) -> Result<i64, DeviceFault> {
        (**self).bytes_available()
    }
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault> {
        (**self).poll_read(buf, wait)
    }

    fn bytes_available(&mut self) -> Result<i64, DeviceFault> {
        (**self).bytes_available()
    }
}

#[cfg(feature = "serialport")]
pub use self::serial::SerialDevice;

#[cfg(feature = "serialport")]
mod serial {
    use super::*;
    use serialport::SerialPort;
    use std::io::Read;

    /// A [`Device`] backed by a port opened with the [`serialport`] crate.
    ///
    /// Line settings (baud rate, parity, flow control, ...) are whatever the
    /// port was opened with. Dropping the device closes the port.
    pub struct SerialDevice {
        port: Box<dyn SerialPort>,
        name: String,
        /// The read timeout currently set on `port`, so we only touch it
        /// when the wait slice changes.
        timeout: Option<Duration>,
    }

    impl SerialDevice {
        /// Wraps an already-open port.
        pub fn new(port: Box<dyn SerialPort>) -> Self {
            let name = port.name().unwrap_or_else(|| String::from("<unnamed>"));
            Self {
                port,
                name,
                timeout: None,
            }
        }

        /// Opens and configures a port.
        pub fn open(builder: serialport::SerialPortBuilder) -> serialport::Result<Self> {
            let port = builder.open()?;
            tracing::debug!(port = ?port.name(), baud = ?port.baud_rate().ok(), "opened serial port");
            Ok(Self::new(port))
        }

        pub fn get_ref(&self) -> &dyn SerialPort {
            &*self.port
        }

        pub fn get_mut(&mut self) -> &mut dyn SerialPort {
            &mut *self.port
        }

        pub fn into_inner(self) -> Box<dyn SerialPort> {
            self.port
        }
    }

    impl Device for SerialDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault> {
            if self.timeout != Some(wait) {
                self.port
                    .set_timeout(wait)
                    .map_err(|error| DeviceFault::Io(error.into()))?;
                self.timeout = Some(wait);
            }

            match self.port.read(buf) {
                Ok(0) => Ok(DeviceStatus::WouldBlock),
                Ok(n) => Ok(DeviceStatus::Data(n)),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    Ok(DeviceStatus::WouldBlock)
                }
                Err(e) => Err(DeviceFault::Io(e)),
            }
        }

        fn bytes_available(&mut self) -> Result<i64, DeviceFault> {
            let n = self
                .port
                .bytes_to_read()
                .map_err(|error| DeviceFault::Io(error.into()))?;
            Ok(i64::from(n))
        }
    }

    impl fmt::Debug for SerialDevice {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("SerialDevice")
                .field("name", &self.name)
                .field("timeout", &self.timeout)
                .finish_non_exhaustive()
        }
    }
}

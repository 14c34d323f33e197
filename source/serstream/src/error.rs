//! Errors returned by [`SerialInputStream`](crate::SerialInputStream).
//!
//! Every failure is reported as an [`Error`], which records the port and
//! method that failed along with an [`ErrorKind`] from a closed set. Device
//! faults are mapped onto that set by [`ErrorKind::from_fault`], a total
//! function: anything it doesn't recognize becomes [`ErrorKind::Unknown`].

use crate::{device::DeviceFault, Timeout};
use std::{fmt, io};

/// The kinds of failure a stream operation can report.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// The read was interrupted, either by the device or by a
    /// [`CancelToken`](crate::CancelToken).
    ReadInterrupted,
    /// The device layer ran out of memory.
    NoMemory,
    /// A parameter passed to the device (or the stream's configuration) is
    /// not valid.
    InvalidParameter,
    /// The port is not open.
    PortNotOpen,
    /// The device reported a failure we don't recognize.
    Unknown,
    /// A single-byte read got no data before its timeout elapsed.
    Timeout,
    /// The caller's buffer can't hold the requested number of bytes at the
    /// requested offset.
    BufferTooSmall,
    /// The device's buffered byte count could not be determined.
    Io,
}

/// A failed stream operation.
#[derive(Debug, thiserror::Error)]
pub struct Error {
    port: String,
    method: &'static str,
    kind: ErrorKind,
    timeout_millis: Option<i64>,
    #[source]
    source: Option<io::Error>,
}

// === impl ErrorKind ===

impl ErrorKind {
    /// Maps a native device failure code onto the taxonomy.
    pub fn from_code(code: i32) -> Self {
        match code {
            DeviceFault::READ_INTERRUPTED => Self::ReadInterrupted,
            DeviceFault::NO_MEMORY => Self::NoMemory,
            DeviceFault::PARAMETER_IS_NOT_CORRECT => Self::InvalidParameter,
            DeviceFault::PORT_NOT_OPENED => Self::PortNotOpen,
            _ => Self::Unknown,
        }
    }

    /// Maps a host OS error onto the taxonomy.
    pub fn from_io(error: &io::Error) -> Self {
        use io::ErrorKind as Io;
        match error.kind() {
            Io::Interrupted => Self::ReadInterrupted,
            Io::OutOfMemory => Self::NoMemory,
            Io::InvalidInput | Io::InvalidData => Self::InvalidParameter,
            Io::NotConnected
            | Io::BrokenPipe
            | Io::NotFound
            | Io::ConnectionReset
            | Io::ConnectionAborted
            | Io::UnexpectedEof => Self::PortNotOpen,
            _ => Self::Unknown,
        }
    }

    pub fn from_fault(fault: &DeviceFault) -> Self {
        match fault {
            DeviceFault::Code(code) => Self::from_code(*code),
            DeviceFault::Io(error) => Self::from_io(error),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::ReadInterrupted => "serstream::read_interrupted",
            Self::NoMemory => "serstream::no_memory",
            Self::InvalidParameter => "serstream::invalid_parameter",
            Self::PortNotOpen => "serstream::port_not_open",
            Self::Unknown => "serstream::unknown",
            Self::Timeout => "serstream::timeout",
            Self::BufferTooSmall => "serstream::buffer_too_small",
            Self::Io => "serstream::io",
        }
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Self::ReadInterrupted => io::ErrorKind::Interrupted,
            Self::NoMemory => io::ErrorKind::OutOfMemory,
            Self::InvalidParameter | Self::BufferTooSmall => io::ErrorKind::InvalidInput,
            Self::PortNotOpen => io::ErrorKind::NotConnected,
            Self::Timeout => io::ErrorKind::TimedOut,
            Self::Unknown | Self::Io => io::ErrorKind::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadInterrupted => "read operation interrupted",
            Self::NoMemory => "unable to allocate memory",
            Self::InvalidParameter => "parameter is not correct",
            Self::PortNotOpen => "port not opened",
            Self::Unknown => "unknown error",
            Self::Timeout => "timed out",
            Self::BufferTooSmall => "not enough buffer space for serial data",
            Self::Io => "error checking available bytes from the serial port",
        })
    }
}

// === impl Error ===

impl Error {
    pub fn new(port: impl Into<String>, method: &'static str, kind: ErrorKind) -> Self {
        Self {
            port: port.into(),
            method,
            kind,
            timeout_millis: None,
            source: None,
        }
    }

    /// A [`Timeout`](ErrorKind::Timeout) error, recording the timeout that
    /// was in effect for the call.
    pub fn timeout(port: impl Into<String>, method: &'static str, timeout: Timeout) -> Self {
        Self {
            timeout_millis: Some(timeout.as_millis()),
            ..Self::new(port, method, ErrorKind::Timeout)
        }
    }

    /// Bridges a device fault into an error.
    pub fn from_fault(port: impl Into<String>, method: &'static str, fault: DeviceFault) -> Self {
        let kind = ErrorKind::from_fault(&fault);
        let source = match fault {
            DeviceFault::Io(error) => Some(error),
            DeviceFault::Code(_) => None,
        };
        Self {
            source,
            ..Self::new(port, method, kind)
        }
    }

    pub(crate) fn with_source(self, source: io::Error) -> Self {
        Self {
            source: Some(source),
            ..self
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    /// The timeout (in milliseconds, `-1` meaning infinite) that was in
    /// effect, if this is a [`Timeout`](ErrorKind::Timeout) error.
    pub fn timeout_millis(&self) -> Option<i64> {
        self.timeout_millis
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            port,
            method,
            kind,
            timeout_millis,
            ..
        } = self;
        write!(f, "port `{port}`, method `{method}`: {kind}")?;
        if let Some(ms) = timeout_millis {
            write!(f, " (timeout: {ms} ms)")?;
        }
        Ok(())
    }
}

impl miette::Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.kind {
            ErrorKind::PortNotOpen => "is the device still connected?",
            ErrorKind::Timeout => "try a longer timeout, or `-1` to block until data arrives",
            ErrorKind::BufferTooSmall => "`offset + length` must not exceed the buffer length",
            ErrorKind::InvalidParameter if self.source.is_none() => {
                "an infinite timeout requires a non-zero poll period"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        io::Error::new(error.kind.io_kind(), error)
    }
}

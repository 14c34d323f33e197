//! The caller-facing byte stream.

use crate::{
    cancel::CancelToken,
    device::{Device, DeviceStatus},
    engine::{ReadEngine, ReadStatus},
    error::{Error, ErrorKind},
    Settings, Timeout,
};
use std::{io, ops::Range, time::Duration};

/// Byte stream access to a [`Device`], with non-blocking and blocking reads.
///
/// The stream is the only user of its device for as long as it exists. It
/// may own the device, or borrow it (`Device` is implemented for `&mut D`),
/// in which case the device's owner remains responsible for closing it.
///
/// Do not share one device between several streams unless you serialize
/// access to it yourself.
#[derive(Debug)]
pub struct SerialInputStream<D> {
    device: D,
    default_timeout: Timeout,
    poll_period: Duration,
    cancel: Option<CancelToken>,
}

impl<D: Device> SerialInputStream<D> {
    pub const DEFAULT_POLL_PERIOD: Duration =
        Duration::from_millis(Settings::DEFAULT_POLL_PERIOD_MS);

    /// Returns a stream over `device`, with an [`Immediate`](Timeout::Immediate)
    /// default timeout.
    pub fn new(device: D) -> Self {
        Self {
            device,
            default_timeout: Timeout::Immediate,
            poll_period: Self::DEFAULT_POLL_PERIOD,
            cancel: None,
        }
    }

    pub fn with_settings(self, settings: &Settings) -> Self {
        Self {
            default_timeout: settings.default_timeout,
            poll_period: settings.poll_period(),
            ..self
        }
    }

    /// Sets how often a blocked read wakes up to check for cancellation.
    ///
    /// With a zero poll period, reads with an [`Infinite`](Timeout::Infinite)
    /// timeout fail with [`InvalidParameter`](ErrorKind::InvalidParameter).
    pub fn with_poll_period(self, poll_period: Duration) -> Self {
        Self {
            poll_period,
            ..self
        }
    }

    /// Attaches a token which interrupts blocking reads on this stream.
    pub fn with_cancel_token(self, cancel: CancelToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }

    /// Sets the timeout used by [`read_byte`](Self::read_byte) and by
    /// blocking reads that don't supply their own.
    pub fn set_default_timeout(&mut self, timeout: Timeout) {
        self.default_timeout = timeout;
    }

    /// Like [`set_default_timeout`](Self::set_default_timeout), taking
    /// milliseconds: `-1` blocks forever, `0` doesn't block.
    pub fn set_default_timeout_millis(&mut self, millis: i64) -> Result<(), Error> {
        let timeout = Timeout::from_millis(millis).map_err(|error| {
            self.error("set_default_timeout", ErrorKind::InvalidParameter)
                .with_source(io::Error::new(io::ErrorKind::InvalidInput, error))
        })?;
        self.set_default_timeout(timeout);
        Ok(())
    }

    pub fn default_timeout(&self) -> Timeout {
        self.default_timeout
    }

    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub fn port_name(&self) -> &str {
        self.device.name()
    }

    /// Reads one byte, waiting as long as the default timeout allows.
    ///
    /// Unlike the buffer reads, getting no data is an error: this fails with
    /// [`ErrorKind::Timeout`] if no byte arrived in time.
    pub fn read_byte(&mut self) -> Result<u8, Error> {
        self.read_byte_timeout(self.default_timeout)
    }

    /// Reads one byte, overriding the default timeout.
    ///
    /// A [`Timeout`](ErrorKind::Timeout) error records `timeout`, not the
    /// stream's default.
    pub fn read_byte_timeout(&mut self, timeout: Timeout) -> Result<u8, Error> {
        const METHOD: &str = "read_byte";
        let outcome = self.engine(METHOD).run(1, timeout)?;
        match outcome.bytes() {
            [byte] => Ok(*byte),
            _ => Err(Error::timeout(self.device.name(), METHOD, timeout)),
        }
    }

    /// Copies whatever the device has available right now into
    /// `buf[offset..offset + len]`, without blocking.
    ///
    /// Returns the number of bytes read, which may be zero. If the buffer is
    /// shorter than `offset + len`, only the part of it after `offset` is
    /// filled.
    pub fn read_buffer(&mut self, buf: &mut [u8], offset: usize, len: usize) -> Result<usize, Error> {
        const METHOD: &str = "read_buffer";
        if offset > buf.len() {
            return Err(self.error(METHOD, ErrorKind::BufferTooSmall));
        }
        let len = len.min(buf.len() - offset);
        if len == 0 {
            return Ok(0);
        }

        let dst = &mut buf[offset..offset + len];
        match self.device.poll_read(dst, Duration::ZERO) {
            Ok(DeviceStatus::Data(n)) => Ok(n.min(len)),
            Ok(DeviceStatus::WouldBlock) => Ok(0),
            Err(fault) => Err(Error::from_fault(self.device.name(), METHOD, fault)),
        }
    }

    /// Non-blocking read into the whole of `buf`.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let len = buf.len();
        self.read_buffer(buf, 0, len)
    }

    /// Reads into `buf[offset..offset + len]` until `len` bytes have arrived
    /// or the timeout (`timeout`, or the default if `None`) elapses.
    ///
    /// Running out of time is not an error: this returns however many bytes
    /// arrived. It fails if the buffer can't hold `len` bytes at `offset`
    /// (before touching the device), if the read is cancelled, or if the
    /// device fails. In the latter two cases `buf` is left untouched.
    pub fn blocking_read_buffer(
        &mut self,
        buf: &mut [u8],
        offset: usize,
        len: usize,
        timeout: Option<Timeout>,
    ) -> Result<usize, Error> {
        const METHOD: &str = "blocking_read_buffer";
        let Some(range) = span(buf.len(), offset, len) else {
            tracing::debug!(buf.len = buf.len(), offset, len, "buffer too small");
            return Err(self.error(METHOD, ErrorKind::BufferTooSmall));
        };

        let timeout = timeout.unwrap_or(self.default_timeout);
        let outcome = self.engine(METHOD).run(len, timeout)?;
        let n = outcome.len();
        buf[range][..n].copy_from_slice(outcome.bytes());
        if outcome.status() == ReadStatus::PartialTimeout {
            tracing::trace!(n, len, %timeout, "returning partial read");
        }
        Ok(n)
    }

    /// Blocking read filling the whole of `buf`, with the default timeout.
    pub fn blocking_read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let len = buf.len();
        self.blocking_read_buffer(buf, 0, len, None)
    }

    /// Blocking read filling the whole of `buf`, overriding the default
    /// timeout.
    pub fn blocking_read_into_timeout(
        &mut self,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<usize, Error> {
        let len = buf.len();
        self.blocking_read_buffer(buf, 0, len, Some(timeout))
    }

    /// Returns the number of bytes buffered by the device.
    ///
    /// Any failure (including the device reporting a negative count) is an
    /// [`ErrorKind::Io`] error.
    pub fn available(&mut self) -> Result<usize, Error> {
        const METHOD: &str = "available";
        match self.device.bytes_available() {
            Ok(n) => usize::try_from(n).map_err(|_| {
                tracing::debug!(n, "device reported an invalid byte count");
                self.error(METHOD, ErrorKind::Io)
            }),
            Err(fault) => Err(self.error(METHOD, ErrorKind::Io).with_source(fault.into_io())),
        }
    }

    pub fn get_ref(&self) -> &D {
        &self.device
    }

    pub fn get_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_inner(self) -> D {
        self.device
    }

    fn engine(&mut self, method: &'static str) -> ReadEngine<'_, D> {
        ReadEngine::new(&mut self.device, self.poll_period, method).cancel_token(self.cancel.as_ref())
    }

    fn error(&self, method: &'static str, kind: ErrorKind) -> Error {
        Error::new(self.device.name(), method, kind)
    }
}

/// Reads from the stream without blocking.
///
/// Since a zero-length read means end-of-file to `io::Read` users, an empty
/// read into a non-empty buffer is reported as [`io::ErrorKind::WouldBlock`].
impl<D: Device> io::Read for SerialInputStream<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_into(buf)? {
            0 => Err(io::ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }
}

/// The range `offset..offset + len`, if it fits in a buffer of `buf_len`.
fn span(buf_len: usize, offset: usize, len: usize) -> Option<Range<usize>> {
    let end = offset.checked_add(len)?;
    (end <= buf_len).then_some(offset..end)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        device::DeviceFault,
        test_util::{trace_init, ScriptedDevice, Step},
    };
    use std::io::Read;

    fn ms(ms: u64) -> Timeout {
        Timeout::Bounded(Duration::from_millis(ms))
    }

    fn stream(script: impl IntoIterator<Item = Step>) -> SerialInputStream<ScriptedDevice> {
        trace_init();
        SerialInputStream::new(ScriptedDevice::new(script)).with_poll_period(Duration::from_millis(10))
    }

    #[test]
    fn default_timeout_starts_immediate() {
        let s = stream([]);
        assert_eq!(s.default_timeout(), Timeout::Immediate);
        assert_eq!(s.port_name(), ScriptedDevice::NAME);
    }

    #[test]
    fn read_buffer_empty_is_not_an_error() {
        let mut s = stream([]);
        let mut buf = [0u8; 8];
        for len in [0, 1, 8, 100] {
            assert_eq!(s.read_buffer(&mut buf, 0, len).unwrap(), 0);
        }
        assert!(s.get_ref().waits().iter().all(Duration::is_zero));
    }

    #[test]
    fn read_buffer_clamps_length() {
        let mut s = stream([Step::Data(vec![1, 2])]);
        let mut buf = [0u8; 4];
        assert_eq!(s.read_buffer(&mut buf, 2, 10).unwrap(), 2);
        assert_eq!(buf, [0, 0, 1, 2]);

        let error = s.read_buffer(&mut buf, 5, 1).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BufferTooSmall);
    }

    #[test]
    fn read_byte_times_out_with_override() {
        let mut s = stream([]);
        s.set_default_timeout(ms(5_000));

        let error = s.read_byte_timeout(ms(30)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(error.timeout_millis(), Some(30));
        assert_eq!(error.method(), "read_byte");
    }

    #[test]
    fn read_byte_immediate_without_data_fails() {
        let mut s = stream([]);
        let error = s.read_byte().unwrap_err();
        assert!(error.is_timeout());
        assert_eq!(error.timeout_millis(), Some(0));
        assert_eq!(s.get_ref().polls(), 1);
    }

    #[test]
    fn read_byte() {
        let mut s = stream([Step::Nothing, Step::Data(vec![0x7f])]);
        assert_eq!(s.read_byte_timeout(Timeout::Infinite).unwrap(), 0x7f);
    }

    #[test]
    fn blocking_read_accumulates() {
        let mut s = stream([
            Step::Data(vec![1, 2, 3]),
            Step::Data(vec![]),
            Step::Data(vec![4, 5]),
        ]);
        let mut buf = [0u8; 7];
        assert_eq!(s.blocking_read_buffer(&mut buf, 1, 5, Some(ms(1_000))).unwrap(), 5);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 0]);
    }

    #[test]
    fn blocking_read_partial_on_timeout() {
        let mut s = stream([Step::Data(vec![1, 2, 3, 4])]);
        s.set_default_timeout(ms(40));
        let mut buf = [0u8; 10];
        assert_eq!(s.blocking_read_into(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn blocking_read_checks_capacity_first() {
        let mut s = stream([Step::Data(vec![1])]);
        let mut buf = [0u8; 5];
        let error = s
            .blocking_read_buffer(&mut buf, 3, 5, Some(Timeout::Infinite))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BufferTooSmall);
        assert_eq!(error.method(), "blocking_read_buffer");
        assert_eq!(s.get_ref().polls(), 0);

        let error = s
            .blocking_read_buffer(&mut buf, usize::MAX, 2, None)
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BufferTooSmall);
    }

    #[test]
    fn blocking_read_fault_leaves_buffer_alone() {
        let mut s = stream([
            Step::Data(vec![1, 2]),
            Step::Fault(DeviceFault::Io(io::ErrorKind::Interrupted.into())),
        ]);
        let mut buf = [0u8; 4];
        let error = s.blocking_read_into_timeout(&mut buf, Timeout::Infinite).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ReadInterrupted);
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn available() {
        let mut s = SerialInputStream::new(ScriptedDevice::new([]).with_available(12));
        assert_eq!(s.available().unwrap(), 12);

        let mut s = SerialInputStream::new(ScriptedDevice::new([]).with_available(-1));
        let error = s.available().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Io);
        assert_eq!(error.method(), "available");
    }

    #[test]
    fn default_timeout_millis() {
        let mut s = stream([]);
        s.set_default_timeout_millis(-1).unwrap();
        assert_eq!(s.default_timeout(), Timeout::Infinite);
        s.set_default_timeout_millis(250).unwrap();
        assert_eq!(s.default_timeout(), ms(250));

        let error = s.set_default_timeout_millis(-5).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidParameter);
        assert_eq!(s.default_timeout(), ms(250));
    }

    #[test]
    fn io_read_would_block() {
        let mut s = stream([Step::Data(vec![b'h', b'i'])]);
        let mut buf = [0u8; 4];
        assert_eq!(s.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"hi");
        assert_eq!(
            s.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        assert_eq!(s.read(&mut []).unwrap(), 0);
    }

    #[test]
    fn borrowed_device() {
        trace_init();
        let mut dev = ScriptedDevice::new([Step::Data(vec![3])]);
        {
            let mut s = SerialInputStream::new(&mut dev);
            assert_eq!(s.read_byte().unwrap(), 3);
        }
        assert_eq!(dev.polls(), 1);
    }
}

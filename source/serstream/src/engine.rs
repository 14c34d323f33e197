//! The blocking read loop.
//!
//! A [`ReadEngine`] drives a [`Device`] through repeated bounded waits until
//! a target number of bytes has been read, the request's deadline passes, the
//! read is cancelled, or the device fails:
//!
//! ```text
//! Idle -> Waiting -> PartialData -> Waiting -> ...
//!            |            |
//!            |            +-> Satisfied
//!            +-> TimedOut
//!            +-> Error
//! ```
//!
//! Bytes are accumulated into a buffer owned by the engine and only handed
//! back in a [`ReadOutcome`]. If the read fails, whatever had been
//! accumulated is dropped along with the request.

use crate::{
    cancel::CancelToken,
    deadline,
    device::{Device, DeviceStatus},
    error::{Error, ErrorKind},
    Timeout,
};
use std::time::{Duration, Instant};

/// Drives a device until a read request completes.
pub struct ReadEngine<'a, D: ?Sized> {
    device: &'a mut D,
    poll_period: Duration,
    cancel: Option<&'a CancelToken>,
    method: &'static str,
}

/// How a read request ended, if it didn't fail.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadStatus {
    /// All requested bytes were read.
    Satisfied,
    /// The deadline passed with fewer bytes than requested.
    PartialTimeout,
}

/// The bytes read by a request that didn't fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadOutcome {
    bytes: Vec<u8>,
    status: ReadStatus,
}

// === impl ReadEngine ===

impl<'a, D: Device + ?Sized> ReadEngine<'a, D> {
    /// `method` names the stream operation on whose behalf the engine runs,
    /// and is recorded in errors.
    pub fn new(device: &'a mut D, poll_period: Duration, method: &'static str) -> Self {
        Self {
            device,
            poll_period,
            cancel: None,
            method,
        }
    }

    pub fn cancel_token(self, cancel: Option<&'a CancelToken>) -> Self {
        Self { cancel, ..self }
    }

    /// Reads until `target_len` bytes have arrived or `timeout` elapses.
    ///
    /// Running out of time is not an error: the outcome's status says
    /// whether the request was satisfied. Cancellation and device faults are.
    #[tracing::instrument(
        level = tracing::Level::DEBUG,
        name = "ReadEngine",
        skip(self),
        fields(port = self.device.name(), method = self.method),
    )]
    pub fn run(&mut self, target_len: usize, timeout: Timeout) -> Result<ReadOutcome, Error> {
        let start = Instant::now();
        let deadline = timeout.deadline_from(start);
        deadline::check_config(deadline, self.poll_period).map_err(|error| {
            tracing::debug!(%error, poll_period = ?self.poll_period, "rejecting read");
            self.error(ErrorKind::InvalidParameter)
        })?;

        let mut bytes = vec![0u8; target_len];
        let mut filled = 0;
        let mut polls = 0usize;

        while filled < target_len {
            if self.cancel.is_some_and(CancelToken::is_cancelled) {
                tracing::debug!(filled, polls, "read cancelled");
                return Err(self.error(ErrorKind::ReadInterrupted));
            }

            let slice = deadline::next_wait_slice(deadline, self.poll_period, Instant::now());
            tracing::trace!(?slice, filled, target_len, "waiting");
            polls += 1;

            match self.device.poll_read(&mut bytes[filled..], slice) {
                Ok(DeviceStatus::Data(n)) if n > 0 => {
                    let n = n.min(target_len - filled);
                    filled += n;
                    tracing::trace!(n, filled, "read data");
                }
                Ok(_) => {}
                Err(fault) => {
                    tracing::debug!(%fault, filled, polls, "device failed");
                    return Err(Error::from_fault(self.device.name(), self.method, fault));
                }
            }

            if filled < target_len && deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::debug!(filled, target_len, polls, elapsed = ?start.elapsed(), "read timed out");
                bytes.truncate(filled);
                return Ok(ReadOutcome {
                    bytes,
                    status: ReadStatus::PartialTimeout,
                });
            }
        }

        tracing::debug!(filled, polls, elapsed = ?start.elapsed(), "read satisfied");
        Ok(ReadOutcome {
            bytes,
            status: ReadStatus::Satisfied,
        })
    }

    fn error(&self, kind: ErrorKind) -> Error {
        Error::new(self.device.name(), self.method, kind)
    }
}

// === impl ReadOutcome ===

impl ReadOutcome {
    pub fn status(&self) -> ReadStatus {
        self.status
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        device::DeviceFault,
        test_util::{trace_init, ScriptedDevice, Step},
    };

    const POLL: Duration = Duration::from_millis(20);

    fn ms(ms: u64) -> Timeout {
        Timeout::Bounded(Duration::from_millis(ms))
    }

    #[test]
    fn empty_chunks_are_not_counted() {
        trace_init();
        let mut dev = ScriptedDevice::new([
            Step::Data(vec![1, 2, 3]),
            Step::Data(vec![]),
            Step::Data(vec![4, 5]),
        ]);
        let outcome = ReadEngine::new(&mut dev, POLL, "test")
            .run(5, ms(1_000))
            .unwrap();

        assert_eq!(outcome.status(), ReadStatus::Satisfied);
        assert_eq!(outcome.bytes(), &[1, 2, 3, 4, 5]);
        assert_eq!(dev.polls(), 3);
    }

    #[test]
    fn partial_timeout_returns_what_arrived() {
        trace_init();
        let mut dev = ScriptedDevice::new([Step::Data(vec![9, 8, 7, 6])]);
        let outcome = ReadEngine::new(&mut dev, POLL, "test")
            .run(10, ms(60))
            .unwrap();

        assert_eq!(outcome.status(), ReadStatus::PartialTimeout);
        assert_eq!(outcome.bytes(), &[9, 8, 7, 6]);
    }

    #[test]
    fn immediate_polls_exactly_once() {
        trace_init();
        let mut dev = ScriptedDevice::new([Step::Data(vec![1]), Step::Data(vec![2])]);
        let outcome = ReadEngine::new(&mut dev, POLL, "test")
            .run(4, Timeout::Immediate)
            .unwrap();

        assert_eq!(outcome.status(), ReadStatus::PartialTimeout);
        assert_eq!(outcome.bytes(), &[1]);
        assert_eq!(dev.polls(), 1);
        assert_eq!(dev.waits(), &[Duration::ZERO]);
    }

    #[test]
    fn wait_slices_are_capped_at_poll_period() {
        trace_init();
        let mut dev = ScriptedDevice::new([]);
        let outcome = ReadEngine::new(&mut dev, POLL, "test")
            .run(1, ms(100))
            .unwrap();

        assert!(outcome.is_empty());
        assert!(dev.polls() >= 2, "polled {} times", dev.polls());
        assert!(dev.waits().iter().all(|w| *w <= POLL), "{:?}", dev.waits());
    }

    #[test]
    fn infinite_waits_in_poll_period_slices() {
        trace_init();
        let mut dev = ScriptedDevice::new([Step::Nothing, Step::Nothing, Step::Data(vec![42])]);
        let outcome = ReadEngine::new(&mut dev, POLL, "test")
            .run(1, Timeout::Infinite)
            .unwrap();

        assert_eq!(outcome.status(), ReadStatus::Satisfied);
        assert_eq!(dev.waits(), &[POLL, POLL, POLL]);
    }

    #[test]
    fn infinite_without_poll_period_is_rejected() {
        trace_init();
        let mut dev = ScriptedDevice::new([Step::Data(vec![1])]);
        let error = ReadEngine::new(&mut dev, Duration::ZERO, "test")
            .run(1, Timeout::Infinite)
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidParameter);
        assert_eq!(dev.polls(), 0);
    }

    #[test]
    fn device_fault_discards_partial_data() {
        trace_init();
        let mut dev = ScriptedDevice::new([
            Step::Data(vec![1, 2]),
            Step::Fault(DeviceFault::Code(DeviceFault::PORT_NOT_OPENED)),
            Step::Data(vec![3]),
        ]);
        let error = ReadEngine::new(&mut dev, POLL, "blocking_read_buffer")
            .run(3, Timeout::Infinite)
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::PortNotOpen);
        assert_eq!(error.method(), "blocking_read_buffer");
        assert_eq!(error.port(), ScriptedDevice::NAME);
        assert_eq!(dev.polls(), 2);
    }

    #[test]
    fn cancelled_before_waiting() {
        trace_init();
        let token = CancelToken::new();
        token.cancel();
        let mut dev = ScriptedDevice::new([Step::Data(vec![1])]);
        let error = ReadEngine::new(&mut dev, POLL, "test")
            .cancel_token(Some(&token))
            .run(1, Timeout::Infinite)
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ReadInterrupted);
        assert_eq!(dev.polls(), 0);
    }

    #[test]
    fn zero_length_is_satisfied_without_polling() {
        let mut dev = ScriptedDevice::new([]);
        let outcome = ReadEngine::new(&mut dev, POLL, "test")
            .run(0, Timeout::Infinite)
            .unwrap();

        assert_eq!(outcome.status(), ReadStatus::Satisfied);
        assert_eq!(dev.polls(), 0);
    }
}

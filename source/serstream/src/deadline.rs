//! Wait-slice calculation for the blocking read loop.
//!
//! Each iteration of a blocking read hands the device a *wait slice*: the
//! longest it may block before returning control. The slice is the time left
//! until the request's deadline, capped at the poll period so that
//! cancellation is observed at least once per period.

use std::time::{Duration, Instant};

/// The combination of an infinite wait and a zero poll period.
///
/// Such a read could never wake up to notice it was cancelled, so it is
/// rejected before the read starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("an infinite read requires a non-zero poll period")]
pub struct UnboundedWait;

/// Checks that a request with the given deadline can be expressed as a
/// sequence of bounded waits.
pub fn check_config(deadline: Option<Instant>, poll_period: Duration) -> Result<(), UnboundedWait> {
    if deadline.is_none() && poll_period.is_zero() {
        return Err(UnboundedWait);
    }
    Ok(())
}

/// Returns the wait slice for the next polling iteration.
///
/// - with no deadline, this is always `poll_period`;
/// - with a deadline at or before `now`, this is zero (a single
///   non-blocking probe);
/// - otherwise, it's the time remaining until the deadline, capped at
///   `poll_period` unless the poll period is zero.
///
/// A missing deadline with a zero poll period means "block until woken",
/// returned as [`Duration::MAX`]. Callers reject that configuration with
/// [`check_config`] before they start polling.
pub fn next_wait_slice(deadline: Option<Instant>, poll_period: Duration, now: Instant) -> Duration {
    let Some(deadline) = deadline else {
        if poll_period.is_zero() {
            return Duration::MAX;
        }
        return poll_period;
    };

    let remaining = deadline.saturating_duration_since(now);
    if remaining.is_zero() || poll_period.is_zero() {
        return remaining;
    }
    remaining.min(poll_period)
}

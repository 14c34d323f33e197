use std::{
    fmt,
    str::FromStr,
    time::{Duration, Instant},
};

/// How long a read is allowed to wait for data.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Timeout {
    /// Block until the request is satisfied (or the read is cancelled).
    Infinite,
    /// Attempt the read once and return whatever is available.
    #[default]
    Immediate,
    /// Wait at most this long.
    Bounded(Duration),
}

/// A millisecond timeout value that doesn't describe a [`Timeout`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("invalid timeout {0} ms (expected -1, 0, or a positive number of milliseconds)")]
pub struct InvalidTimeout(pub i64);

impl Timeout {
    /// The millisecond value used to request an infinite timeout.
    pub const INFINITE_MILLIS: i64 = -1;

    /// Converts a millisecond timeout value, where `-1` means "block forever"
    /// and `0` means "don't block".
    ///
    /// Other negative values are rejected rather than guessed at.
    pub fn from_millis(millis: i64) -> Result<Self, InvalidTimeout> {
        match millis {
            Self::INFINITE_MILLIS => Ok(Self::Infinite),
            0 => Ok(Self::Immediate),
            ms if ms > 0 => Ok(Self::Bounded(Duration::from_millis(ms as u64))),
            ms => Err(InvalidTimeout(ms)),
        }
    }

    /// Returns this timeout in the same encoding accepted by
    /// [`Timeout::from_millis`].
    ///
    /// Bounded timeouts too long to fit in an `i64` saturate.
    pub fn as_millis(&self) -> i64 {
        match self {
            Self::Infinite => Self::INFINITE_MILLIS,
            Self::Immediate => 0,
            Self::Bounded(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Returns the absolute deadline for a request started at `start`, or
    /// `None` if the request may wait forever.
    ///
    /// A bounded timeout so long that the deadline can't be represented is
    /// treated as infinite.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        match *self {
            Self::Infinite => None,
            Self::Immediate => Some(start),
            Self::Bounded(d) => start.checked_add(d),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Self::Immediate
        } else {
            Self::Bounded(d)
        }
    }
}

impl TryFrom<i64> for Timeout {
    type Error = InvalidTimeout;

    fn try_from(millis: i64) -> Result<Self, Self::Error> {
        Self::from_millis(millis)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_millis(), f)
    }
}

/// Errors returned when parsing a [`Timeout`] from a string.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseTimeoutError {
    #[error("timeout must be an integer number of milliseconds, or `forever`")]
    NotANumber,
    #[error(transparent)]
    Invalid(#[from] InvalidTimeout),
}

impl FromStr for Timeout {
    type Err = ParseTimeoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("forever") || s.eq_ignore_ascii_case("infinite") {
            return Ok(Self::Infinite);
        }
        let millis = s.parse::<i64>().map_err(|_| ParseTimeoutError::NotANumber)?;
        Ok(Self::from_millis(millis)?)
    }
}

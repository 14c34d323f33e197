use crate::Timeout;
use std::time::Duration;

/// Configuration for a [`SerialInputStream`](crate::SerialInputStream).
///
/// This can be flattened into a `clap` command line.
#[derive(Debug, Clone, clap::Args)]
#[command(next_help_heading = "Stream Options")]
pub struct Settings {
    /// default timeout for blocking reads, in milliseconds.
    ///
    /// `-1` (or `forever`) blocks until data arrives, and `0` attempts each
    /// read once without blocking.
    #[arg(
        short = 't',
        long = "timeout",
        global = true,
        allow_negative_numbers = true,
        default_value_t = Timeout::Immediate,
    )]
    pub default_timeout: Timeout,

    /// how often (in milliseconds) a blocked read wakes up to check whether it
    /// has been cancelled.
    ///
    /// `0` disables periodic wakeups, which is only allowed for reads with a
    /// finite timeout.
    #[arg(long = "poll-period", global = true, default_value_t = Settings::DEFAULT_POLL_PERIOD_MS)]
    pub poll_period_ms: u64,
}

impl Settings {
    pub const DEFAULT_POLL_PERIOD_MS: u64 = 100;

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_timeout: Timeout::Immediate,
            poll_period_ms: Self::DEFAULT_POLL_PERIOD_MS,
        }
    }
}

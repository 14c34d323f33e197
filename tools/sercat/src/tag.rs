use owo_colors::{OwoColorize, Stream};
use std::{fmt, time::Instant};

/// Prefix for sercat's output lines: time since start, and which kind of
/// connection the line is about.
#[derive(Copy, Clone)]
pub struct LogTag {
    start: Instant,
    conn: &'static str,
    verbose: bool,
}

impl LogTag {
    pub fn serial() -> Self {
        Self::new("UART")
    }

    pub fn tcp() -> Self {
        Self::new(" TCP")
    }

    pub fn verbose(self, verbose: bool) -> Self {
        Self { verbose, ..self }
    }

    fn new(conn: &'static str) -> Self {
        Self {
            start: Instant::now(),
            conn,
            verbose: false,
        }
    }

    pub fn if_verbose(&self, f: impl fmt::Display) {
        if self.verbose {
            println!("{self} {f}")
        }
    }
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.start.elapsed();
        fmt::Display::fmt(
            &format_args!("[+{:04}.{:09}s] ", elapsed.as_secs(), elapsed.subsec_nanos())
                .if_supports_color(Stream::Stdout, |text| text.dimmed()),
            f,
        )?;
        fmt::Display::fmt(
            &self
                .conn
                .if_supports_color(Stream::Stdout, |text| text.magenta()),
            f,
        )
    }
}

use crate::tag::LogTag;
use miette::Context;
use owo_colors::{OwoColorize, Stream};
use serstream::{CancelToken, Device, ErrorKind, SerialInputStream, Timeout};
use std::{thread::sleep, time::Duration};

/// Which `serstream` read operation to dump with.
#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum Mode {
    /// read one byte at a time, failing each read that times out
    Byte,
    /// block until `--length` bytes arrive or the timeout elapses
    Bulk,
    /// return whatever is available without blocking
    Nonblocking,
}

pub struct Dumper<D> {
    stream: SerialInputStream<D>,
    mode: Mode,
    length: usize,
    count: Option<usize>,
    tag: LogTag,
}

impl<D: Device> Dumper<D> {
    /// How long to back off when reads don't block and nothing arrived.
    const IDLE: Duration = Duration::from_millis(10);

    pub fn new(stream: SerialInputStream<D>, tag: LogTag) -> Self {
        Self {
            stream,
            mode: Mode::Bulk,
            length: 64,
            count: None,
            tag,
        }
    }

    pub fn mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    pub fn length(self, length: usize) -> Self {
        Self {
            length: length.max(1),
            ..self
        }
    }

    pub fn count(self, count: Option<usize>) -> Self {
        Self { count, ..self }
    }

    pub fn run(mut self) -> miette::Result<()> {
        let Self { mode, tag, .. } = self;
        let rx = "  RX".if_supports_color(Stream::Stdout, |s| s.cyan());
        let time = "TIME".if_supports_color(Stream::Stdout, |s| s.bright_yellow());
        let text = "TEXT".if_supports_color(Stream::Stdout, |s| s.bright_yellow());
        let err = "ERR!".if_supports_color(Stream::Stdout, |s| s.red());

        let buffered = self
            .stream
            .available()
            .context("failed to query buffered bytes")?;
        tracing::info!(
            port = self.stream.port_name(),
            ?mode,
            timeout = %self.stream.default_timeout(),
            buffered,
            "dumping"
        );

        let never_blocks =
            mode == Mode::Nonblocking || self.stream.default_timeout() == Timeout::Immediate;
        let mut buf = vec![0u8; self.length];
        let mut reads = 0usize;
        while self.count.map_or(true, |count| reads < count) {
            if self.stream.cancel_token().is_some_and(CancelToken::is_cancelled) {
                println!("{tag} {err} cancelled after {reads} reads");
                return Ok(());
            }
            reads += 1;
            let result = match mode {
                Mode::Byte => self.stream.read_byte().map(|byte| {
                    buf[0] = byte;
                    1
                }),
                Mode::Bulk => self.stream.blocking_read_into(&mut buf),
                Mode::Nonblocking => self.stream.read_into(&mut buf),
            };

            let n = match result {
                Ok(n) => n,
                Err(error) if error.is_timeout() => {
                    tag.if_verbose(format_args!("{time} {error}"));
                    0
                }
                Err(error) if error.kind() == ErrorKind::ReadInterrupted => {
                    println!("{tag} {err} {error}");
                    return Ok(());
                }
                Err(error) => {
                    return Err(error).with_context(|| format!("read #{reads} failed"));
                }
            };

            if n == 0 {
                tag.if_verbose(format_args!("{rx} nothing"));
                if never_blocks {
                    sleep(Self::IDLE);
                }
                continue;
            }

            let data = &buf[..n];
            println!("{tag} {rx} {n:>4}B {data:02x?}");
            if let Ok(s) = std::str::from_utf8(data) {
                for line in s.lines().filter(|line| !line.trim().is_empty()) {
                    println!("{tag} {text} {line}");
                }
            }
        }

        Ok(())
    }
}

use clap::Parser;
use connection::Connect;
use miette::{Context, IntoDiagnostic};
use serstream::{CancelToken, SerialInputStream};
use std::{thread, time::Duration};
use tracing::level_filters::LevelFilter;

mod connection;
mod dump;
mod tag;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    connect: Connect,

    /// which read operation to use.
    #[arg(short, long, global = true, value_enum, default_value_t = dump::Mode::Bulk)]
    mode: dump::Mode,

    /// number of bytes to request per read.
    #[arg(
        short,
        long,
        global = true,
        default_value_t = 64,
        value_parser = clap::value_parser!(u16).range(1..),
    )]
    length: u16,

    /// stop after this many reads.
    #[arg(short = 'n', long, global = true)]
    count: Option<usize>,

    /// cancel any blocked read after this many milliseconds, and exit.
    #[arg(long, global = true)]
    cancel_after: Option<u64>,

    /// whether to log every read, including empty ones.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[clap(flatten)]
    settings: serstream::Settings,

    /// a comma-separated list of `tracing` targets and levels to enable.
    ///
    /// for example, `warn,serstream=trace` will enable the `WARN` level
    /// globally, and every event from the read engine.
    ///
    /// see <https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/targets/struct.Targets.html#filtering-with-targets>
    /// for more details on this syntax.
    #[arg(
        long = "trace",
        global = true,
        env = "SERSTREAM_TRACE",
        default_value_t = tracing_subscriber::filter::Targets::new().with_default(LevelFilter::WARN),
    )]
    trace_filter: tracing_subscriber::filter::Targets,
}

fn main() -> miette::Result<()> {
    use tracing_subscriber::prelude::*;

    let Args {
        connect,
        mode,
        length,
        count,
        cancel_after,
        verbose,
        settings,
        trace_filter,
    } = Args::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time())
        .with(trace_filter)
        .init();

    let conn = connect
        .connect()
        .into_diagnostic()
        .with_context(|| format!("failed to connect to {connect}"))?;
    let tag = conn.log_tag().verbose(verbose);
    let mut stream = SerialInputStream::new(conn).with_settings(&settings);

    if let Some(ms) = cancel_after {
        let token = CancelToken::new();
        stream = stream.with_cancel_token(token.clone());
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            tracing::debug!(after_ms = ms, "cancelling reads");
            token.cancel();
        });
    }

    dump::Dumper::new(stream, tag)
        .mode(mode)
        .length(usize::from(length))
        .count(count)
        .run()
}

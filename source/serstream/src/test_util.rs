use crate::device::{Device, DeviceFault, DeviceStatus};
use std::{collections::VecDeque, time::Duration};

/// One scripted response to [`Device::poll_read`].
#[derive(Debug)]
pub(crate) enum Step {
    /// Return these bytes (an empty vec is a zero-length chunk).
    Data(Vec<u8>),
    /// Wait out the slice and report no data.
    Nothing,
    Fault(DeviceFault),
}

/// A device that replays a script, then never has data again.
#[derive(Debug)]
pub(crate) struct ScriptedDevice {
    script: VecDeque<Step>,
    waits: Vec<Duration>,
    available: i64,
}

impl ScriptedDevice {
    pub(crate) const NAME: &'static str = "/dev/ttyTEST0";

    pub(crate) fn new(script: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: script.into_iter().collect(),
            waits: Vec::new(),
            available: 0,
        }
    }

    pub(crate) fn with_available(self, available: i64) -> Self {
        Self { available, ..self }
    }

    /// Number of `poll_read` calls made so far.
    pub(crate) fn polls(&self) -> usize {
        self.waits.len()
    }

    /// The wait slice passed to each `poll_read` call.
    pub(crate) fn waits(&self) -> &[Duration] {
        &self.waits
    }
}

impl Device for ScriptedDevice {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn poll_read(&mut self, buf: &mut [u8], wait: Duration) -> Result<DeviceStatus, DeviceFault> {
        self.waits.push(wait);
        match self.script.pop_front().unwrap_or(Step::Nothing) {
            Step::Data(data) => {
                assert!(
                    data.len() <= buf.len(),
                    "scripted {} bytes, but only {} were requested",
                    data.len(),
                    buf.len()
                );
                buf[..data.len()].copy_from_slice(&data);
                Ok(DeviceStatus::Data(data.len()))
            }
            Step::Nothing => {
                assert_ne!(wait, Duration::MAX, "asked to block forever!");
                std::thread::sleep(wait);
                Ok(DeviceStatus::WouldBlock)
            }
            Step::Fault(fault) => Err(fault),
        }
    }

    fn bytes_available(&mut self) -> Result<i64, DeviceFault> {
        Ok(self.available)
    }
}

pub(crate) fn trace_init() {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};

    let env = std::env::var("RUST_LOG").unwrap_or_default();
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    let filter = if env.is_empty() {
        builder.parse("serstream=trace").unwrap()
    } else {
        builder.parse_lossy(env)
    };

    let _res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_thread_names(true)
        .without_time()
        .try_init();
}

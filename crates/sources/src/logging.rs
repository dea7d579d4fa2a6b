//! `tracing-subscriber` log sink.
//!
//! Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to the
//! factory's verbosity when the variable is unset. Installation fails quietly
//! when the host application already set a global subscriber.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use layerconf::LogSink;

/// Default id of the fmt sink.
pub const FMT_LOG_SINK_ID: &str = "fmt";

#[derive(Debug, Default, Clone, Copy)]
pub struct FmtLogSink {
    json: bool,
}

impl FmtLogSink {
    /// Human-readable lines.
    pub fn new() -> Self {
        Self { json: false }
    }

    /// One JSON object per event.
    pub fn json() -> Self {
        Self { json: true }
    }

    fn filter(level: LevelFilter) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy()
    }
}

impl LogSink for FmtLogSink {
    fn id(&self) -> &str {
        FMT_LOG_SINK_ID
    }

    fn priority(&self) -> i32 {
        0
    }

    fn install(&self, level: LevelFilter) -> bool {
        let registry = tracing_subscriber::registry().with(Self::filter(level));
        let installed = if self.json {
            registry.with(fmt::layer().json()).try_init()
        } else {
            registry.with(fmt::layer()).try_init()
        };
        installed.is_ok()
    }
}

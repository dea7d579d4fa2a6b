//! Log sink selection.
//!
//! The engine logs through `tracing` macros only. A `LogSink` decides where
//! those events go; the factory installs the available sink with the highest
//! priority once, at build time. `NullLogSink` installs nothing, which leaves
//! whatever subscriber the host application configured in charge.

use std::sync::Arc;

use tracing::debug;
use tracing::level_filters::LevelFilter;

use crate::constants::NULL_LOG_SINK_ID;

pub trait LogSink: Send + Sync {
    fn id(&self) -> &str;

    /// Higher wins among available sinks.
    fn priority(&self) -> i32;

    fn is_available(&self) -> bool {
        true
    }

    /// Installs the sink at `level`; returns false if it could not be installed.
    fn install(&self, level: LevelFilter) -> bool;
}

/// Always available; installs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn id(&self) -> &str {
        NULL_LOG_SINK_ID
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn install(&self, _level: LevelFilter) -> bool {
        true
    }
}

/// Picks and installs the best sink, falling back to `NullLogSink`.
pub fn install_sink(
    candidates: &[Arc<dyn LogSink>],
    is_disabled: impl Fn(&str) -> bool,
    level: LevelFilter,
) -> Arc<dyn LogSink> {
    let mut available: Vec<&Arc<dyn LogSink>> = candidates
        .iter()
        .filter(|sink| !is_disabled(sink.id()) && sink.is_available())
        .collect();
    available.sort_by_key(|sink| std::cmp::Reverse(sink.priority()));

    for sink in available {
        if sink.install(level) {
            debug!(sink = %sink.id(), level = %level, "Installed log sink");
            return Arc::clone(sink);
        }
        debug!(sink = %sink.id(), "Log sink declined installation");
    }
    Arc::new(NullLogSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestSink {
        id: &'static str,
        priority: i32,
        available: bool,
        accepts: bool,
        installed: AtomicBool,
    }

    impl TestSink {
        fn new(id: &'static str, priority: i32, available: bool, accepts: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                available,
                accepts,
                installed: AtomicBool::new(false),
            })
        }
    }

    impl LogSink for TestSink {
        fn id(&self) -> &str {
            self.id
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn install(&self, _level: LevelFilter) -> bool {
            self.installed.store(self.accepts, Ordering::SeqCst);
            self.accepts
        }
    }

    #[test]
    fn test_highest_priority_available_sink_wins() {
        let low = TestSink::new("low", 1, true, true);
        let high = TestSink::new("high", 10, true, true);
        let missing = TestSink::new("missing", 100, false, true);
        let candidates: Vec<Arc<dyn LogSink>> = vec![low.clone(), high.clone(), missing.clone()];

        let chosen = install_sink(&candidates, |_| false, LevelFilter::WARN);
        assert_eq!(chosen.id(), "high");
        assert!(high.installed.load(Ordering::SeqCst));
        assert!(!low.installed.load(Ordering::SeqCst));
        assert!(!missing.installed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_disabled_and_declining_sinks_fall_through() {
        let declining = TestSink::new("declining", 10, true, false);
        let disabled = TestSink::new("disabled", 20, true, true);
        let candidates: Vec<Arc<dyn LogSink>> = vec![declining, disabled];

        let chosen = install_sink(&candidates, |id| id == "disabled", LevelFilter::INFO);
        assert_eq!(chosen.id(), "null");
    }
}

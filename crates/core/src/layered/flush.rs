//! Aggregated flush outcomes.

use crate::error::{ConfigError, LayerError};
use crate::location::Location;

/// Result of flushing one layer.
#[derive(Debug)]
pub struct FlushOutcome {
    pub location: Location,
    pub result: Result<usize, LayerError>,
}

/// One outcome per dirty layer; a failure never stops the other layers.
#[derive(Debug, Default)]
pub struct FlushReport {
    outcomes: Vec<FlushOutcome>,
}

impl FlushReport {
    pub(crate) fn push(&mut self, location: Location, result: Result<usize, LayerError>) {
        self.outcomes.push(FlushOutcome { location, result });
    }

    pub(crate) fn merge(&mut self, other: FlushReport) {
        self.outcomes.extend(other.outcomes);
    }

    pub fn outcomes(&self) -> &[FlushOutcome] {
        &self.outcomes
    }

    /// Entries written across all successful layers.
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FlushOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Collapses the report into the number written or `ConfigError::Flush`.
    pub fn into_result(self) -> Result<usize, ConfigError> {
        let failed = self.failures().count();
        if failed == 0 {
            Ok(self.written())
        } else {
            Err(ConfigError::Flush {
                failed,
                total: self.outcomes.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;

    fn location(name: &str) -> Location {
        Location::new(
            Scope::User,
            "test",
            Location::opaque_uri("test", &[name]).unwrap(),
        )
    }

    #[test]
    fn test_partial_failure_is_reported() {
        let mut report = FlushReport::default();
        report.push(location("a"), Ok(2));
        report.push(
            location("b"),
            Err(LayerError::NotWriteable {
                location: "b".to_string(),
            }),
        );
        report.push(location("c"), Ok(1));

        assert_eq!(report.written(), 3);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);
        assert!(matches!(
            report.into_result(),
            Err(ConfigError::Flush { failed: 1, total: 3 })
        ));
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = FlushReport::default();
        assert!(report.is_success());
        assert_eq!(report.into_result().unwrap(), 0);
    }
}

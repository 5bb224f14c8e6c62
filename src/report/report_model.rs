use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scenario::scenario_model::{RunOutcome, ScenarioResult};

// ============================================================================
// Suite report: aggregates ScenarioResult instances
// ============================================================================

/// Wall-clock time of one scenario, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDuration {
    pub scenario: String,
    pub elapsed_ms: u128,
}

/// Outcome counts for a suite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub aborted: usize,

    /// Sum of scenario durations (not suite wall time when runs overlap)
    pub scenario_time_ms: u128,

    pub durations: Vec<ScenarioDuration>,
}

/// Collects scenario results as they finish.
///
/// Append-only: a recorded result is never touched again.
#[derive(Debug, Clone, Default)]
pub struct ReportCollector {
    suite_name: String,
    results: Vec<ScenarioResult>,
}

impl ReportCollector {
    pub fn new(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            results: Vec::new(),
        }
    }

    pub fn record(&mut self, result: ScenarioResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[ScenarioResult] {
        &self.results
    }

    pub fn summary(&self) -> SuiteSummary {
        let mut summary = SuiteSummary {
            total: self.results.len(),
            ..SuiteSummary::default()
        };
        for result in &self.results {
            match result.outcome {
                RunOutcome::Completed => summary.passed += 1,
                RunOutcome::Failed => summary.failed += 1,
                RunOutcome::Aborted => summary.aborted += 1,
            }
            let elapsed_ms = result.elapsed.as_millis();
            summary.scenario_time_ms += elapsed_ms;
            summary.durations.push(ScenarioDuration {
                scenario: result.scenario.clone(),
                elapsed_ms,
            });
        }
        summary
    }

    pub fn into_report(self) -> SuiteReport {
        SuiteReport {
            summary: self.summary(),
            suite_name: self.suite_name,
            duration_ms: None,
            results: self.results,
        }
    }
}

/// Aggregated report for a suite of scenario runs.
///
/// Consumed by the console and JSON reporters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite_name: String,

    pub summary: SuiteSummary,

    /// Suite wall time in milliseconds (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,

    pub results: Vec<ScenarioResult>,
}

impl SuiteReport {
    /// Build a report from results already in declaration order.
    pub fn from_results(suite_name: &str, results: Vec<ScenarioResult>) -> Self {
        let mut collector = ReportCollector::new(suite_name);
        for result in results {
            collector.record(result);
        }
        collector.into_report()
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_ms = Some(elapsed.as_millis());
        self
    }

    /// Every scenario completed.
    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total
    }
}

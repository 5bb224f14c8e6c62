use crate::error::{HarnessError, HarnessResult};
use crate::report::report_model::SuiteReport;
use crate::scenario::scenario_model::{RunOutcome, ScenarioResult, StepOutcome};

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format a suite report for terminal output.
///
/// Produces output like:
/// ```text
/// === Scenario Suite: storefront ===
///
/// ✓ PASS  valid login (5 steps, 412 ms)
///     [0] PASS     3 ms  Type(username, "standard_user")
///     ...
/// ✗ FAIL  missing first name (7 steps, 4210 ms)
///     [5] FAIL  4003 ms  TextEquals(error_banner, "...") | expected "...", observed "<absent>"
///     [6] SKIP     0 ms  Exists(finish_button)
///
/// === Results: 1 passed, 1 failed, 0 aborted (2 total) in 4.6s ===
/// ```
pub fn format_console_report(report: &SuiteReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== Scenario Suite: {} ===\n\n", report.suite_name));

    for result in &report.results {
        out.push_str(&format_scenario(result));
    }

    let summary = &report.summary;
    out.push_str(&format!(
        "\n=== Results: {} passed, {} failed, {} aborted ({} total)",
        summary.passed, summary.failed, summary.aborted, summary.total
    ));

    if let Some(ms) = report.duration_ms {
        let secs = ms as f64 / 1000.0;
        out.push_str(&format!(" in {:.1}s", secs));
    }

    out.push_str(" ===\n");

    out
}

/// Header line plus one line per recorded step.
pub fn format_scenario(result: &ScenarioResult) -> String {
    let marker = match result.outcome {
        RunOutcome::Completed => "\u{2713} PASS ",
        RunOutcome::Failed => "\u{2717} FAIL ",
        RunOutcome::Aborted => "\u{2717} ABORT",
    };

    let mut out = format!(
        "{} {} ({} steps, {} ms)\n",
        marker,
        result.scenario,
        result.steps.len(),
        result.elapsed.as_millis()
    );

    for step in &result.steps {
        out.push_str(&format!(
            "    [{}] {:<7} {:>5} ms  {}",
            step.index,
            step.outcome.label(),
            step.elapsed.as_millis(),
            step.step
        ));
        if step.outcome.is_failure() {
            if let Some(detail) = &step.message {
                out.push_str(&format!(" | {}", detail));
            }
        }
        out.push('\n');
    }

    if let Some(diagnostic) = &result.diagnostic {
        out.push_str(&format!("    [ERROR] {}\n", diagnostic));
    }

    out
}

/// Pretty JSON rendition of the whole report.
pub fn format_json_report(report: &SuiteReport) -> HarnessResult<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| HarnessError::config(format!("cannot encode report: {}", e)))
}

/// Steps that did not pass, across the whole suite.
pub fn failing_steps(report: &SuiteReport) -> usize {
    report
        .results
        .iter()
        .map(|r| r.count(StepOutcome::Failed) + r.count(StepOutcome::TimedOut))
        .sum()
}

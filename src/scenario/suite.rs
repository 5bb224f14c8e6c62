use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::model::state::StateModel;
use crate::page::context::PageContext;
use crate::report::report_model::{ReportCollector, SuiteReport};
use crate::scenario::runner::{CancelToken, ScenarioRunner};
use crate::scenario::scenario_model::{RunOutcome, Scenario, ScenarioResult, StepResult};
use crate::trace::logger::TraceLogger;

/// Cross-run options for a suite.
#[derive(Default)]
pub struct SuiteOptions<'a> {
    pub tracer: Option<&'a TraceLogger>,
    pub cancel: Option<CancelToken>,
}

/// Run `scenarios` across the given page contexts.
///
/// At most `max_parallel_scenarios` workers run, and never more than there
/// are contexts. Each worker owns one context for its whole lifetime and
/// pulls the next undispatched scenario when it finishes one. Results come
/// back in declaration order regardless of completion order.
pub fn run_suite<C>(
    suite_name: &str,
    scenarios: &[Scenario],
    contexts: Vec<C>,
    model: &StateModel,
    config: &HarnessConfig,
    options: SuiteOptions<'_>,
) -> HarnessResult<SuiteReport>
where
    C: PageContext,
{
    config.validate()?;
    if contexts.is_empty() && !scenarios.is_empty() {
        return Err(HarnessError::config("run_suite needs at least one page context"));
    }

    let workers = config
        .max_parallel_scenarios
        .min(contexts.len())
        .min(scenarios.len().max(1));
    tracing::info!(suite = suite_name, scenarios = scenarios.len(), workers, "suite started");

    let started = Instant::now();
    let next = AtomicUsize::new(0);

    let finished: Vec<(usize, ScenarioResult)> = thread::scope(|s| {
        let handles: Vec<_> = contexts
            .into_iter()
            .take(workers)
            .enumerate()
            .map(|(worker, mut ctx)| {
                let next = &next;
                let options = &options;
                s.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(scenario) = scenarios.get(index) else {
                            break;
                        };
                        tracing::debug!(worker, scenario = %scenario.name, "dispatch");

                        let mut runner = ScenarioRunner::new(model, config);
                        if let Some(tracer) = options.tracer {
                            runner = runner.with_tracer(tracer);
                        }
                        if let Some(token) = &options.cancel {
                            runner = runner.with_cancel(token.clone());
                        }
                        done.push((index, runner.run(scenario, &mut ctx)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(done) => done,
                Err(_) => {
                    tracing::warn!("scenario worker panicked");
                    Vec::new()
                }
            })
            .collect()
    });

    let mut slots: Vec<Option<ScenarioResult>> = vec![None; scenarios.len()];
    for (index, result) in finished {
        slots[index] = Some(result);
    }

    let mut collector = ReportCollector::new(suite_name);
    for (scenario, slot) in scenarios.iter().zip(slots) {
        collector.record(slot.unwrap_or_else(|| lost_result(scenario)));
    }

    let report = collector.into_report().with_duration(started.elapsed());
    tracing::info!(
        suite = suite_name,
        passed = report.summary.passed,
        failed = report.summary.failed,
        aborted = report.summary.aborted,
        "suite finished"
    );
    Ok(report)
}

/// Placeholder for a scenario whose worker died before reporting it.
fn lost_result(scenario: &Scenario) -> ScenarioResult {
    ScenarioResult {
        scenario: scenario.name.clone(),
        steps: scenario
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| StepResult::skipped(i, step))
            .collect(),
        outcome: RunOutcome::Aborted,
        elapsed: Duration::ZERO,
        diagnostic: Some("worker stopped before reporting this scenario".to_string()),
    }
}

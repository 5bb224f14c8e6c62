use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::engine::action::ActionExecutor;
use crate::engine::assertion::AssertionEngine;
use crate::engine::locator::Scope;
use crate::engine::poll::PollConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::model::state::{ModelState, StateModel, TransitionOutcome};
use crate::page::context::PageContext;
use crate::scenario::scenario_model::{
    RunOutcome, Scenario, ScenarioResult, ScenarioStep, StepOutcome, StepResult,
};
use crate::trace::logger::TraceLogger;

/// Cooperative cancellation shared between a caller and its runs.
///
/// Checked between steps only; a poll in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Finished(RunOutcome),
}

impl RunPhase {
    fn can_enter(&self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (RunPhase::Idle, RunPhase::Running) | (RunPhase::Running, RunPhase::Finished(_))
        )
    }
}

/// How the step loop stopped early.
struct Halt {
    outcome: RunOutcome,
    diagnostic: Option<String>,
}

/// Executes a single scenario against one page context.
///
/// `run` consumes the runner, so an instance can never drive a second
/// scenario; concurrent scenarios use separate runners and contexts.
pub struct ScenarioRunner<'a> {
    model: &'a StateModel,
    executor: ActionExecutor,
    engine: AssertionEngine,
    config: &'a HarnessConfig,
    tracer: Option<&'a TraceLogger>,
    cancel: Option<CancelToken>,
    phase: RunPhase,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(model: &'a StateModel, config: &'a HarnessConfig) -> Self {
        ScenarioRunner {
            model,
            executor: ActionExecutor::new(config),
            engine: AssertionEngine::new(PollConfig::from_config(config)),
            config,
            tracer: None,
            cancel: None,
            phase: RunPhase::Idle,
        }
    }

    pub fn with_tracer(mut self, tracer: &'a TraceLogger) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn enter(&mut self, next: RunPhase) {
        debug_assert!(self.phase.can_enter(next), "{:?} -> {:?}", self.phase, next);
        tracing::trace!(from = ?self.phase, to = ?next, "run phase");
        self.phase = next;
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(mut self, scenario: &Scenario, ctx: &mut dyn PageContext) -> ScenarioResult {
        self.enter(RunPhase::Running);
        tracing::info!(scenario = %scenario.name, steps = scenario.steps.len(), "scenario started");

        if scenario.steps.is_empty() {
            self.enter(RunPhase::Finished(RunOutcome::Completed));
            return ScenarioResult {
                scenario: scenario.name.clone(),
                steps: Vec::new(),
                outcome: RunOutcome::Completed,
                elapsed: Duration::ZERO,
                diagnostic: None,
            };
        }

        let started = Instant::now();
        let mut state = ModelState::new(scenario.start);
        let mut steps = Vec::with_capacity(scenario.steps.len());

        let mut halt = self.setup(scenario, ctx).err().map(|e| Halt {
            outcome: RunOutcome::Aborted,
            diagnostic: Some(format!("setup failed: {}", e)),
        });

        for (index, step) in scenario.steps.iter().enumerate() {
            if halt.is_none() && self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                halt = Some(Halt {
                    outcome: RunOutcome::Aborted,
                    diagnostic: Some(format!("cancelled before step {}", index)),
                });
            }
            if halt.is_some() {
                let skipped = StepResult::skipped(index, step);
                self.trace(scenario, &skipped);
                steps.push(skipped);
                continue;
            }

            let (result, error) = self.run_step(index, step, &mut state, ctx);
            self.trace(scenario, &result);

            if let Some(error) = error {
                halt = Some(if error.is_context_lost() {
                    tracing::warn!(scenario = %scenario.name, step = index, %error, "context lost");
                    Halt {
                        outcome: RunOutcome::Aborted,
                        diagnostic: Some(error.to_string()),
                    }
                } else {
                    Halt {
                        outcome: RunOutcome::Failed,
                        diagnostic: None,
                    }
                });
            }
            steps.push(result);
        }

        let (outcome, diagnostic) = match halt {
            Some(halt) => (halt.outcome, halt.diagnostic),
            None => match scenario.expect_final {
                Some(expected) if expected != state.current => (
                    RunOutcome::Failed,
                    Some(format!(
                        "expected to finish on {} but the model is on {}",
                        expected, state.current
                    )),
                ),
                _ => (RunOutcome::Completed, None),
            },
        };

        self.enter(RunPhase::Finished(outcome));
        let elapsed = started.elapsed();
        tracing::info!(
            scenario = %scenario.name,
            ?outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "scenario finished"
        );

        ScenarioResult {
            scenario: scenario.name.clone(),
            steps,
            outcome,
            elapsed,
            diagnostic,
        }
    }

    /// Fresh session, then the declared start page.
    fn setup(&self, scenario: &Scenario, ctx: &mut dyn PageContext) -> HarnessResult<()> {
        ctx.reset()?;
        if let Some(path) = &scenario.start_path {
            ctx.navigate(&self.config.resolve_url(path))?;
        }
        Ok(())
    }

    fn run_step(
        &self,
        index: usize,
        step: &ScenarioStep,
        state: &mut ModelState,
        ctx: &mut dyn PageContext,
    ) -> (StepResult, Option<HarnessError>) {
        let started = Instant::now();
        let scope = Scope::new(self.model, state.current);

        let result: HarnessResult<Option<String>> = match step {
            ScenarioStep::Act(action) => match self.executor.execute(action, &scope, ctx) {
                Ok(()) => match self.model.transition(state, action) {
                    TransitionOutcome::Error(reason) => Err(HarnessError::IllegalTransition {
                        action: action.to_string(),
                        state: state.current,
                        reason,
                    }),
                    outcome => {
                        state.advance(action, &outcome);
                        Ok(None)
                    }
                },
                Err(e) => Err(e),
            },
            ScenarioStep::Check(assertion) => self
                .engine
                .check(assertion, &scope, ctx)
                .map(|pass| Some(format!("observed {:?}", pass.observed))),
        };

        let elapsed = started.elapsed();
        match result {
            Ok(message) => {
                tracing::debug!(step = index, %step, "passed");
                (
                    StepResult {
                        index,
                        step: step.to_string(),
                        outcome: StepOutcome::Passed,
                        elapsed,
                        message,
                        page_state: Some(state.current),
                    },
                    None,
                )
            }
            Err(error) => {
                let outcome = if error.is_timeout() {
                    StepOutcome::TimedOut
                } else {
                    StepOutcome::Failed
                };
                tracing::debug!(step = index, %step, %error, "step stopped the run");
                (
                    StepResult {
                        index,
                        step: step.to_string(),
                        outcome,
                        elapsed,
                        message: Some(error.to_string()),
                        page_state: Some(state.current),
                    },
                    Some(error),
                )
            }
        }
    }

    fn trace(&self, scenario: &Scenario, result: &StepResult) {
        if let Some(tracer) = self.tracer {
            tracer.record_step(&scenario.name, result);
        }
    }
}

/// Run one scenario with a fresh runner.
pub fn run_scenario(
    scenario: &Scenario,
    ctx: &mut dyn PageContext,
    model: &StateModel,
    config: &HarnessConfig,
) -> ScenarioResult {
    ScenarioRunner::new(model, config).run(scenario, ctx)
}

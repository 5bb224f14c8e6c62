use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::action::Action;
use crate::engine::assertion::Assertion;
use crate::model::state::PageStateName;

// ============================================================================
// Compiled scenarios
// ============================================================================

/// One step of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioStep {
    Act(Action),
    Check(Assertion),
}

impl fmt::Display for ScenarioStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioStep::Act(action) => write!(f, "{}", action),
            ScenarioStep::Check(assertion) => write!(f, "{}", assertion),
        }
    }
}

impl From<Action> for ScenarioStep {
    fn from(action: Action) -> Self {
        ScenarioStep::Act(action)
    }
}

impl From<Assertion> for ScenarioStep {
    fn from(assertion: Assertion) -> Self {
        ScenarioStep::Check(assertion)
    }
}

/// An end-to-end user journey, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,

    /// Page the model starts on
    pub start: PageStateName,

    /// Visited before the first step, after the session is reset
    pub start_path: Option<String>,

    pub steps: Vec<ScenarioStep>,

    /// Page the model must end on for the run to count as completed
    pub expect_final: Option<PageStateName>,
}

impl Scenario {
    pub fn new(name: &str, start: PageStateName) -> Self {
        Scenario {
            name: name.to_string(),
            start,
            start_path: None,
            steps: Vec::new(),
            expect_final: None,
        }
    }

    pub fn starting_at(mut self, path: &str) -> Self {
        self.start_path = Some(path.to_string());
        self
    }

    pub fn step(mut self, step: impl Into<ScenarioStep>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn ending_on(mut self, state: PageStateName) -> Self {
        self.expect_final = Some(state);
        self
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed,
    TimedOut,
    Skipped,
}

impl StepOutcome {
    /// Outcomes that stop the scenario.
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Failed | StepOutcome::TimedOut)
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Passed => "PASS",
            StepOutcome::Failed => "FAIL",
            StepOutcome::TimedOut => "TIMEOUT",
            StepOutcome::Skipped => "SKIP",
        }
    }
}

/// Result of one recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 0-based position in the scenario
    pub index: usize,

    /// Human-readable step, e.g. `Click(login_button)`
    pub step: String,

    pub outcome: StepOutcome,

    pub elapsed: Duration,

    /// Failure detail (expected / observed / waited) or pass observation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Model page after the step; `None` for skipped steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_state: Option<PageStateName>,
}

impl StepResult {
    pub fn skipped(index: usize, step: &ScenarioStep) -> Self {
        StepResult {
            index,
            step: step.to_string(),
            outcome: StepOutcome::Skipped,
            elapsed: Duration::ZERO,
            message: None,
            page_state: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed,
    Aborted,
}

/// Result of running one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario: String,

    pub steps: Vec<StepResult>,

    pub outcome: RunOutcome,

    pub elapsed: Duration,

    /// Scenario-level problem (setup, cancellation, final state mismatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ScenarioResult {
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }

    /// First step that stopped the run, if any.
    pub fn first_failure(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.outcome.is_failure())
    }
}

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::scenario::scenario_model::{StepOutcome, StepResult};

/// One line of the JSONL step trace.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,

    pub scenario: String,
    pub step_index: usize,
    pub step: String,

    pub outcome: StepOutcome,
    pub elapsed_ms: u128,

    pub page_state: Option<String>,
    pub message: Option<String>,
}

impl TraceEvent {
    pub fn now(scenario: &str, step_index: usize, step: impl ToString) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            scenario: scenario.to_string(),
            step_index,
            step: step.to_string(),
            outcome: StepOutcome::Passed,
            elapsed_ms: 0,
            page_state: None,
            message: None,
        }
    }

    pub fn for_step(scenario: &str, result: &StepResult) -> Self {
        let mut event = Self::now(scenario, result.index, &result.step)
            .with_outcome(result.outcome, result.elapsed.as_millis());
        if let Some(state) = result.page_state {
            event = event.with_page_state(state);
        }
        if let Some(message) = &result.message {
            event = event.with_message(message);
        }
        event
    }

    pub fn with_outcome(mut self, outcome: StepOutcome, elapsed_ms: u128) -> Self {
        self.outcome = outcome;
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn with_page_state(mut self, state: impl ToString) -> Self {
        self.page_state = Some(state.to_string());
        self
    }

    pub fn with_message(mut self, message: impl ToString) -> Self {
        self.message = Some(message.to_string());
        self
    }
}

//! Scenario verification for a storefront web app.
//!
//! Scenarios are ordered actions and assertions. Each action is resolved
//! against the element map of the page the state model is on, performed
//! against a [`PageContext`], and mirrored by a model transition. Assertions
//! poll the live page until they hold or their timeout runs out.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod page;
pub mod report;
pub mod scenario;
pub mod trace;

pub use crate::config::HarnessConfig;
pub use crate::error::{HarnessError, HarnessResult, PageError};
pub use crate::page::context::PageContext;
pub use crate::report::report_model::{ReportCollector, SuiteReport, SuiteSummary};
pub use crate::scenario::runner::{CancelToken, ScenarioRunner, run_scenario};
pub use crate::scenario::scenario_model::{
    RunOutcome, Scenario, ScenarioResult, ScenarioStep, StepOutcome, StepResult,
};
pub use crate::scenario::suite::{SuiteOptions, run_suite};

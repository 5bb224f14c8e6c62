use std::time::Duration;

use thiserror::Error;

use crate::model::state::PageStateName;
use crate::page::context::NodeId;

/// Failures reported by a page context provider.
#[derive(Debug, Error)]
pub enum PageError {
    /// The context can no longer be used (process died, tab closed, ...)
    #[error("page context lost: {0}")]
    ContextLost(String),

    /// A node handle no longer refers to an attached element
    #[error("node {0} is no longer attached")]
    StaleNode(NodeId),

    /// The provider rejected or failed a command
    #[error("{command} failed: {error}")]
    Protocol { command: String, error: String },

    /// Failed to talk to the driver process
    #[error("driver I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Driver emitted a line that is not a valid response
    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PageError {
    /// Whether the context is unusable and the run must abort.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PageError::ContextLost(_) | PageError::Io { .. } | PageError::Json { .. }
        )
    }
}

/// Every way a harness operation can fail.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Element referenced outside the current state's element map
    #[error("element '{element}' is not part of the {state} page")]
    UnknownElement { element: String, state: PageStateName },

    /// Element never attached within the locator timeout
    #[error("{element} ({selector}) not found after {}ms", .waited.as_millis())]
    NotFound {
        element: String,
        selector: String,
        waited: Duration,
    },

    /// Element attached but never became visible and enabled
    #[error(
        "{element} not interactable after {}ms (visible={visible}, enabled={enabled})",
        .waited.as_millis()
    )]
    NotInteractable {
        element: String,
        waited: Duration,
        visible: bool,
        enabled: bool,
    },

    /// Observable never matched the expected value
    #[error(
        "{assertion}: expected {expected:?}, last observed {}, after {}ms",
        describe_observed(.actual),
        .waited.as_millis()
    )]
    AssertionMismatch {
        assertion: String,
        expected: String,
        actual: Option<String>,
        waited: Duration,
    },

    /// The state model rejected the action
    #[error("no legal transition for {action} from {state}: {reason}")]
    IllegalTransition {
        action: String,
        state: PageStateName,
        reason: String,
    },

    /// Invalid model, config or scenario definition
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Page context became unusable mid-run
    #[error(transparent)]
    ContextLost(PageError),

    /// Non-fatal provider error surfaced from a step
    #[error(transparent)]
    Page(PageError),
}

impl HarnessError {
    pub fn config(msg: impl Into<String>) -> Self {
        HarnessError::Configuration(msg.into())
    }

    /// Polling timeouts from locator or executor.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HarnessError::NotFound { .. } | HarnessError::NotInteractable { .. }
        )
    }

    pub fn is_context_lost(&self) -> bool {
        matches!(self, HarnessError::ContextLost(_))
    }
}

impl From<PageError> for HarnessError {
    fn from(err: PageError) -> Self {
        if err.is_fatal() {
            HarnessError::ContextLost(err)
        } else {
            HarnessError::Page(err)
        }
    }
}

/// Render a last-observed value for diagnostics.
pub fn describe_observed(actual: &Option<String>) -> String {
    match actual {
        Some(value) => format!("{:?}", value),
        None => "<absent>".to_string(),
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

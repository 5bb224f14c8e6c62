use std::fmt;
use std::thread;
use std::time::Instant;

use crate::config::HarnessConfig;
use crate::engine::locator::{ElementLocator, Scope};
use crate::engine::poll::{PollConfig, PollOutcome, Probe, poll_until};
use crate::error::{HarnessError, HarnessResult, PageError};
use crate::model::element::{ElementHandle, ElementRef};
use crate::page::context::{NodeId, NodeSnapshot, PageContext};

/// A user interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Type(ElementRef, String),
    Click(ElementRef),
    /// Path relative to the base URL, or an absolute URL
    Navigate(String),
}

impl Action {
    pub fn target(&self) -> Option<&ElementRef> {
        match self {
            Action::Type(element, _) | Action::Click(element) => Some(element),
            Action::Navigate(_) => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Type(element, text) => write!(f, "Type({}, {:?})", element.name, text),
            Action::Click(element) => write!(f, "Click({})", element.name),
            Action::Navigate(path) => write!(f, "Navigate({:?})", path),
        }
    }
}

/// Performs actions against the live page. Never touches the state model.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    poll: PollConfig,
    config: HarnessConfig,
}

impl ActionExecutor {
    pub fn new(config: &HarnessConfig) -> Self {
        ActionExecutor {
            poll: PollConfig::from_config(config),
            config: config.clone(),
        }
    }

    pub fn execute(
        &self,
        action: &Action,
        scope: &Scope<'_>,
        ctx: &mut dyn PageContext,
    ) -> HarnessResult<()> {
        match action {
            Action::Navigate(path) => {
                let url = self.config.resolve_url(path);
                tracing::debug!(%url, "navigate");
                ctx.navigate(&url)?;
                Ok(())
            }
            Action::Type(element, text) => {
                self.dispatch(element, scope, ctx, |ctx, node| ctx.type_text(node, text))
            }
            Action::Click(element) => self.dispatch(element, scope, ctx, |ctx, node| ctx.click(node)),
        }
    }

    /// Wait for `element` to be actionable and send the interaction.
    ///
    /// A node that detaches between resolution and dispatch is resolved and
    /// sent again until the operation timeout runs out. Pages that are still
    /// settling serve nodes from the previous render, so several detaches in
    /// a row are expected.
    fn dispatch<F>(
        &self,
        element: &ElementRef,
        scope: &Scope<'_>,
        ctx: &mut dyn PageContext,
        mut send: F,
    ) -> HarnessResult<()>
    where
        F: FnMut(&mut dyn PageContext, NodeId) -> Result<(), PageError>,
    {
        let started = Instant::now();
        let mut detached = 0u32;
        loop {
            let remaining = self.poll.timeout.saturating_sub(started.elapsed());
            let poll = PollConfig::new(remaining, self.poll.interval);
            let handle = self.actionable(element, scope, ctx, poll)?;

            match send(&mut *ctx, handle.node) {
                Err(PageError::StaleNode(node)) => {
                    detached += 1;
                    let waited = started.elapsed();
                    if waited >= self.poll.timeout {
                        tracing::debug!(element = element.name, detached, "node kept detaching");
                        return Err(HarnessError::NotInteractable {
                            element: element.label.to_string(),
                            waited,
                            visible: true,
                            enabled: true,
                        });
                    }
                    tracing::trace!(%node, element = element.name, "node detached before dispatch");
                    thread::sleep(self.poll.interval.min(self.poll.timeout - waited));
                }
                other => return Ok(other?),
            }
        }
    }

    /// Resolve `element` and wait until it is visible and enabled.
    ///
    /// A node that detaches during the wait is re-resolved; `poll` is the
    /// budget shared by resolution and the wait.
    fn actionable(
        &self,
        element: &ElementRef,
        scope: &Scope<'_>,
        ctx: &mut dyn PageContext,
        poll: PollConfig,
    ) -> HarnessResult<ElementHandle> {
        let started = Instant::now();
        let (mut handle, first) = ElementLocator::new(poll).resolve_snapshot(element, scope, ctx)?;
        if first.is_actionable() {
            return Ok(handle);
        }

        let poll = PollConfig::new(poll.timeout.saturating_sub(started.elapsed()), poll.interval);
        let outcome = poll_until(poll, || {
            let snapshot = match ctx.inspect(handle.node)? {
                Some(snapshot) => snapshot,
                None => match ctx.query(element.selector)?.into_iter().next() {
                    Some(fresh) => {
                        handle.node = fresh.node;
                        fresh
                    }
                    None => return Err(PageError::StaleNode(handle.node)),
                },
            };
            Ok(if snapshot.is_actionable() {
                Probe::Ready(())
            } else {
                Probe::Pending(snapshot)
            })
        })?;

        match outcome {
            PollOutcome::Ready { .. } => Ok(handle),
            PollOutcome::Expired { last, elapsed, .. } => {
                let last: Option<NodeSnapshot> = last;
                let (visible, enabled) = last
                    .map(|s| (s.visible, s.enabled))
                    .unwrap_or((first.visible, first.enabled));
                Err(HarnessError::NotInteractable {
                    element: element.label.to_string(),
                    waited: elapsed,
                    visible,
                    enabled,
                })
            }
        }
    }
}

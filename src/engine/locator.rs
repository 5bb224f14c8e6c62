use crate::engine::poll::{PollConfig, PollOutcome, Probe, poll_until};
use crate::error::{HarnessError, HarnessResult};
use crate::model::element::{ElementHandle, ElementRef};
use crate::model::state::{PageStateName, StateModel};
use crate::page::context::{NodeSnapshot, PageContext};

/// Which element map resolution is checked against.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub model: &'a StateModel,
    pub state: PageStateName,
}

impl<'a> Scope<'a> {
    pub fn new(model: &'a StateModel, state: PageStateName) -> Self {
        Scope { model, state }
    }

    pub fn check(&self, element: &ElementRef) -> HarnessResult<()> {
        self.model.check_element(self.state, element)
    }
}

/// Resolves symbolic element refs to live nodes.
#[derive(Debug, Clone, Copy)]
pub struct ElementLocator {
    poll: PollConfig,
}

impl ElementLocator {
    pub fn new(poll: PollConfig) -> Self {
        ElementLocator { poll }
    }

    /// Wait for the first node matching `element` to attach.
    pub fn resolve(
        &self,
        element: &ElementRef,
        scope: &Scope<'_>,
        ctx: &mut dyn PageContext,
    ) -> HarnessResult<ElementHandle> {
        let (handle, _) = self.resolve_snapshot(element, scope, ctx)?;
        Ok(handle)
    }

    /// Like [`resolve`](Self::resolve) but also returns what was observed.
    pub fn resolve_snapshot(
        &self,
        element: &ElementRef,
        scope: &Scope<'_>,
        ctx: &mut dyn PageContext,
    ) -> HarnessResult<(ElementHandle, NodeSnapshot)> {
        scope.check(element)?;

        let outcome = poll_until(self.poll, || {
            let nodes = ctx.query(element.selector)?;
            Ok(match nodes.into_iter().next() {
                Some(first) => Probe::Ready(first),
                None => Probe::Pending(()),
            })
        })?;

        match outcome {
            PollOutcome::Ready { value, .. } => Ok((
                ElementHandle {
                    element: *element,
                    node: value.node,
                },
                value,
            )),
            PollOutcome::Expired { elapsed, attempts, .. } => {
                tracing::debug!(element = element.name, attempts, "element never attached");
                Err(HarnessError::NotFound {
                    element: element.label.to_string(),
                    selector: element.selector.to_string(),
                    waited: elapsed,
                })
            }
        }
    }
}

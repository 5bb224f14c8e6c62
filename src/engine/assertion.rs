use std::fmt;
use std::time::Duration;

use crate::engine::locator::Scope;
use crate::engine::poll::{PollConfig, PollOutcome, Probe, poll_until};
use crate::error::{HarnessError, HarnessResult, PageError};
use crate::model::element::ElementRef;
use crate::page::context::PageContext;

/// An expectation about the current page.
#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    TextEquals(ElementRef, String),
    UrlIncludes(String),
    UrlEquals(String),
    Exists(ElementRef),
    NotExists(ElementRef),
    CountEquals(ElementRef, usize),
}

impl Assertion {
    pub fn target(&self) -> Option<&ElementRef> {
        match self {
            Assertion::TextEquals(element, _)
            | Assertion::Exists(element)
            | Assertion::NotExists(element)
            | Assertion::CountEquals(element, _) => Some(element),
            Assertion::UrlIncludes(_) | Assertion::UrlEquals(_) => None,
        }
    }

    /// Expected value as printed in diagnostics.
    pub fn expected(&self) -> String {
        match self {
            Assertion::TextEquals(_, text) => text.clone(),
            Assertion::UrlIncludes(fragment) => fragment.clone(),
            Assertion::UrlEquals(url) => url.clone(),
            Assertion::Exists(_) => "at least 1".to_string(),
            Assertion::NotExists(_) => "0".to_string(),
            Assertion::CountEquals(_, n) => n.to_string(),
        }
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::TextEquals(element, text) => {
                write!(f, "TextEquals({}, {:?})", element.name, text)
            }
            Assertion::UrlIncludes(fragment) => write!(f, "UrlIncludes({:?})", fragment),
            Assertion::UrlEquals(url) => write!(f, "UrlEquals({:?})", url),
            Assertion::Exists(element) => write!(f, "Exists({})", element.name),
            Assertion::NotExists(element) => write!(f, "NotExists({})", element.name),
            Assertion::CountEquals(element, n) => write!(f, "CountEquals({}, {})", element.name, n),
        }
    }
}

/// Successful check.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub observed: String,
    pub waited: Duration,
}

/// Evaluates assertions with bounded-retry polling.
#[derive(Debug, Clone, Copy)]
pub struct AssertionEngine {
    poll: PollConfig,
}

impl AssertionEngine {
    pub fn new(poll: PollConfig) -> Self {
        AssertionEngine { poll }
    }

    /// Poll the assertion's observable until it matches or time runs out.
    ///
    /// A timeout yields [`HarnessError::AssertionMismatch`] carrying the
    /// expected value, the last observation and the time waited.
    pub fn check(
        &self,
        assertion: &Assertion,
        scope: &Scope<'_>,
        ctx: &mut dyn PageContext,
    ) -> HarnessResult<Pass> {
        if let Some(element) = assertion.target() {
            scope.check(element)?;
        }

        let outcome = match assertion {
            Assertion::TextEquals(element, expected) => {
                let mut previous: Option<Option<String>> = None;
                let outcome = poll_until(self.poll, || {
                    let current = first_text(ctx, element)?;
                    let stable = previous.as_ref() == Some(&current);
                    previous = Some(current.clone());
                    Ok(match current {
                        Some(text) if stable && text == *expected => Probe::Ready(text),
                        other => Probe::Pending(other),
                    })
                })?;
                confirm_text(outcome, ctx, element, expected)?
            }
            Assertion::UrlIncludes(fragment) => poll_until(self.poll, || {
                let url = ctx.current_url()?;
                Ok(if url.contains(fragment.as_str()) {
                    Probe::Ready(url)
                } else {
                    Probe::Pending(Some(url))
                })
            })?,
            Assertion::UrlEquals(expected) => poll_until(self.poll, || {
                let url = ctx.current_url()?;
                Ok(if url == *expected {
                    Probe::Ready(url)
                } else {
                    Probe::Pending(Some(url))
                })
            })?,
            Assertion::Exists(element) => count_matches(self.poll, ctx, element, |n| n > 0)?,
            Assertion::NotExists(element) => count_matches(self.poll, ctx, element, |n| n == 0)?,
            Assertion::CountEquals(element, expected) => {
                let expected = *expected;
                count_matches(self.poll, ctx, element, |n| n == expected)?
            }
        };

        match outcome {
            PollOutcome::Ready { value, elapsed, .. } => Ok(Pass {
                observed: value,
                waited: elapsed,
            }),
            PollOutcome::Expired { last, elapsed, attempts } => {
                tracing::debug!(%assertion, attempts, "assertion never matched");
                Err(HarnessError::AssertionMismatch {
                    assertion: assertion.to_string(),
                    expected: assertion.expected(),
                    actual: last.flatten(),
                    waited: elapsed,
                })
            }
        }
    }
}

/// Take the stabilizing read the deadline cut off.
///
/// Stability needs two consecutive matching reads; when the last read before
/// expiry already matched, one more read decides.
fn confirm_text(
    outcome: PollOutcome<String, Option<String>>,
    ctx: &mut dyn PageContext,
    element: &ElementRef,
    expected: &str,
) -> Result<PollOutcome<String, Option<String>>, PageError> {
    match outcome {
        PollOutcome::Expired { last: Some(Some(seen)), elapsed, attempts } if seen == expected => {
            let confirmed = first_text(ctx, element)?;
            Ok(match confirmed {
                Some(text) if text == expected => PollOutcome::Ready {
                    value: text,
                    elapsed,
                    attempts: attempts + 1,
                },
                other => PollOutcome::Expired {
                    last: Some(other),
                    elapsed,
                    attempts: attempts + 1,
                },
            })
        }
        other => Ok(other),
    }
}

fn first_text(ctx: &mut dyn PageContext, element: &ElementRef) -> Result<Option<String>, PageError> {
    Ok(ctx.query(element.selector)?.into_iter().next().map(|n| n.text))
}

/// Presence checks count attached nodes, so a hidden node still counts.
fn count_matches(
    poll: PollConfig,
    ctx: &mut dyn PageContext,
    element: &ElementRef,
    matches: impl Fn(usize) -> bool,
) -> Result<PollOutcome<String, Option<String>>, PageError> {
    poll_until(poll, || {
        let count = ctx.query(element.selector)?.len();
        Ok(if matches(count) {
            Probe::Ready(count.to_string())
        } else {
            Probe::Pending(Some(count.to_string()))
        })
    })
}

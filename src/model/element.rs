use std::fmt;

use serde::Serialize;

/// Symbolic reference to a UI element.
///
/// `name` is the stable key scenarios use, `selector` is what the page
/// context is queried with, and `label` is what reports print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ElementRef {
    pub name: &'static str,
    pub selector: &'static str,
    pub label: &'static str,
}

impl ElementRef {
    pub const fn new(name: &'static str, selector: &'static str, label: &'static str) -> Self {
        ElementRef { name, selector, label }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

/// Live handle produced by the locator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle {
    pub element: ElementRef,
    pub node: crate::page::context::NodeId,
}

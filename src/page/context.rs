use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PageError;

/// Provider-assigned identity of a DOM node.
///
/// Stable for as long as the node stays attached; a fresh page load hands
/// out fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time view of one attached node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: NodeId,

    /// Text content, exactly as rendered
    #[serde(default)]
    pub text: String,

    pub visible: bool,

    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl NodeSnapshot {
    pub fn is_actionable(&self) -> bool {
        self.visible && self.enabled
    }
}

/// A live page the harness drives.
///
/// Implementations own their page exclusively; the harness never shares one
/// context between two concurrent runs.
pub trait PageContext: Send {
    /// Drop session state (cookies, storage, cart) before a scenario.
    fn reset(&mut self) -> Result<(), PageError>;

    /// Load an absolute URL.
    fn navigate(&mut self, url: &str) -> Result<(), PageError>;

    fn current_url(&mut self) -> Result<String, PageError>;

    /// All nodes currently attached that match `selector`, in document order.
    fn query(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, PageError>;

    /// Re-read a node. `None` once it is detached.
    fn inspect(&mut self, node: NodeId) -> Result<Option<NodeSnapshot>, PageError>;

    /// Append text to an input node.
    fn type_text(&mut self, node: NodeId, text: &str) -> Result<(), PageError>;

    fn click(&mut self, node: NodeId) -> Result<(), PageError>;
}

impl<T: PageContext + ?Sized> PageContext for Box<T> {
    fn reset(&mut self) -> Result<(), PageError> {
        (**self).reset()
    }

    fn navigate(&mut self, url: &str) -> Result<(), PageError> {
        (**self).navigate(url)
    }

    fn current_url(&mut self) -> Result<String, PageError> {
        (**self).current_url()
    }

    fn query(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, PageError> {
        (**self).query(selector)
    }

    fn inspect(&mut self, node: NodeId) -> Result<Option<NodeSnapshot>, PageError> {
        (**self).inspect(node)
    }

    fn type_text(&mut self, node: NodeId, text: &str) -> Result<(), PageError> {
        (**self).type_text(node, text)
    }

    fn click(&mut self, node: NodeId) -> Result<(), PageError> {
        (**self).click(node)
    }
}

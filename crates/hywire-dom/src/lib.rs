//! hywire DOM - Document tree
//!
//! Arena-based document tree the engine mutates when applying swaps.
//! Also hosts fragment parsing, simple selector matching, HTML
//! serialization and native form-constraint checks.

mod node;
mod tree;
mod document;
mod selector;
mod parse;
mod serialize;
mod forms;

pub use node::{Node, NodeData, ElementData, Attribute};
pub use tree::DomTree;
pub use document::Document;
pub use selector::{Selector, CompoundSelector};
pub use parse::FragmentParser;
pub use serialize::{inner_html, outer_html};
pub use forms::{FormValues, FormValue, ValidityState, ValidationError, collect_values, validate_node};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);
    /// Document root ID
    pub const ROOT: NodeId = NodeId(0);

    /// Check if this is the sentinel
    #[inline]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// Check if this refers to a node
    #[inline]
    pub fn is_some(&self) -> bool {
        *self != Self::NONE
    }

    /// Raw index value
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// DOM error
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("No such node: {0:?}")]
    NoSuchNode(NodeId),

    #[error("Not an element: {0:?}")]
    NotAnElement(NodeId),

    #[error("Node is detached: {0:?}")]
    Detached(NodeId),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

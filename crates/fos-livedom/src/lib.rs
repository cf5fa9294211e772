//! fOS Live DOM - mutable document tree with live ranges
//!
//! Arena-based node store, validated tree mutation, and Range objects
//! that repair themselves as the tree underneath them is edited.
//!
//! # Example
//! ```rust
//! use fos_livedom::{DomTree, NodeOperations};
//!
//! let mut tree = DomTree::new();
//! let doc = tree.create_document();
//! let html = tree.create_element(doc, "html");
//! tree.append_child(doc, html).unwrap();
//!
//! let text = tree.create_text(doc, "hello");
//! tree.append_child(html, text).unwrap();
//!
//! let range = tree.create_range_at(text, 1, text, 4).unwrap();
//! tree.insert_data(text, 0, "oh, ").unwrap();
//! assert_eq!(tree.range_to_string(range).unwrap(), "ell");
//! ```

mod arena;
mod character_data;
mod config;
mod dispatch;
mod document;
mod error;
mod generation;
mod gravity;
mod hierarchy;
mod node;
mod observer;
mod operations;
mod position;
mod range;
mod selection_index;
mod tree;

pub use arena::{GenArena, GenIndex};
pub use config::TreeConfig;
pub use dispatch::{ListenerId, SharedListener};
pub use error::{DomError, DomResult};
pub use generation::{Generation, MutationGuard};
pub use node::{AttrData, ElementData, Node, NodeData, NodeFlags, NodeType, TextData};
pub use observer::{
    CharacterDataChange, ChangeDetails, MutationListener, MutationObserverInit, MutationRecord,
    MutationRecorder, MutationType,
};
pub use operations::NodeOperations;
pub use position::DocumentPosition;
pub use range::{BoundaryPoint, Range, RangeCompare, RangeId};
pub use tree::{Ancestors, DomTree};

/// Node identifier (index into the tree arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Raw arena index
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

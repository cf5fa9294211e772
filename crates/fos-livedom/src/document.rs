//! Document - document-level services

use crate::error::{DomError, DomResult};
use crate::operations::NodeOperations;
use crate::{DomTree, NodeId};

impl DomTree {
    /// The document's root element, if it has one
    pub fn document_element(&self, doc: NodeId) -> Option<NodeId> {
        self.children(doc).iter().copied().find(|&c| self.node(c).is_element())
    }

    /// The document's doctype child, if it has one
    pub fn doctype(&self, doc: NodeId) -> Option<NodeId> {
        self.children(doc).iter().copied().find(|&c| self.node(c).is_doctype())
    }

    /// Move `node` (and its subtree) into `doc`, detaching it first
    pub fn adopt_node(&mut self, doc: NodeId, node: NodeId) -> DomResult<NodeId> {
        if !self.node(doc).is_document() {
            return Err(DomError::InvalidNodeType);
        }
        if self.node(node).is_document() {
            return Err(DomError::NotSupported);
        }
        if self.is_root_of_anonymous_subtree(node) {
            return Err(DomError::NotSupported);
        }
        if let Some(parent) = self.parent(node) {
            if self.node(node).is_attribute() {
                return Err(DomError::NotSupported);
            }
            self.remove_child(parent, node)?;
        }
        if let Some(owner) = self.node(node).as_attribute().and_then(|a| a.owner()) {
            self.detach_attribute(owner, node);
        }
        if self.owner_document(node) != doc {
            self.adopt_subtree(node, doc);
        }
        Ok(node)
    }

    /// Re-own a detached subtree, attribute nodes included
    pub(crate) fn adopt_subtree(&mut self, root: NodeId, doc: NodeId) {
        let mut stack = vec![root];
        let mut count = 0usize;
        while let Some(node) = stack.pop() {
            self.node_mut(node).owner_document = doc;
            count += 1;
            let n = self.node(node);
            stack.extend_from_slice(&n.children);
            if let Some(element) = n.as_element() {
                stack.extend_from_slice(&element.attributes);
            }
        }
        tracing::debug!(?root, ?doc, nodes = count, "subtree adopted");
    }

    fn detach_attribute(&mut self, owner: NodeId, attr: NodeId) {
        if let Some(element) = self.node_mut(owner).as_element_mut() {
            element.attributes.retain(|&a| a != attr);
        }
        if let crate::NodeData::Attribute(data) = &mut self.node_mut(attr).data {
            data.owner = None;
        }
    }
}

//! Hierarchy Validation
//!
//! Decides whether a node may become a child of a container, given the
//! reference child the insertion or replacement is relative to.

use crate::node::NodeData;
use crate::{DomTree, NodeId};

impl DomTree {
    /// Whether `candidate` may be inserted under `parent`
    ///
    /// `ref_child` is the child being replaced when `is_replace` is set,
    /// otherwise the child the candidate goes in front of (`None` appends).
    pub fn is_allowed_as_child(
        &self,
        candidate: NodeId,
        parent: NodeId,
        is_replace: bool,
        ref_child: Option<NodeId>,
    ) -> bool {
        // A childless candidate can only contain the parent by being it
        if candidate == parent
            || (self.first_child(candidate).is_some()
                && self.is_inclusive_descendant_of(parent, candidate))
        {
            return false;
        }

        let parent_is_document = self.node(parent).is_document();
        match &self.node(candidate).data {
            NodeData::Comment(_) | NodeData::ProcessingInstruction { .. } => true,
            NodeData::Text(_) => !parent_is_document,
            NodeData::Element(_) => {
                if !parent_is_document {
                    return true;
                }
                if let Some(root) = self.document_element(parent) {
                    // Only replacing the existing root element is allowed
                    return is_replace && ref_child == Some(root);
                }
                let Some(ref_child) = ref_child else {
                    return true;
                };
                let Some(doctype) = self.doctype(parent) else {
                    return true;
                };
                let doctype_index = self.child_position(parent, doctype);
                let insert_index = self.child_position(parent, ref_child);
                if is_replace {
                    insert_index >= doctype_index
                } else {
                    insert_index > doctype_index
                }
            }
            NodeData::Doctype { .. } => {
                if !parent_is_document {
                    return false;
                }
                if let Some(doctype) = self.doctype(parent) {
                    return is_replace && ref_child == Some(doctype);
                }
                let Some(root) = self.document_element(parent) else {
                    return true;
                };
                let Some(ref_child) = ref_child else {
                    // Appending would put the doctype after the root element
                    return false;
                };
                self.child_position(parent, ref_child) <= self.child_position(parent, root)
            }
            NodeData::DocumentFragment => {
                !parent_is_document
                    || self.fragment_children_allowed(
                        self.children(candidate),
                        parent,
                        is_replace,
                        ref_child,
                    )
            }
            NodeData::Document | NodeData::Attribute(_) => false,
        }
    }

    /// Validate a fragment's children as a group against a document parent:
    /// each must be allowed on its own and at most one may be an element
    pub(crate) fn fragment_children_allowed(
        &self,
        children: &[NodeId],
        parent: NodeId,
        is_replace: bool,
        ref_child: Option<NodeId>,
    ) -> bool {
        let mut saw_element = false;
        for &child in children {
            if self.node(child).is_element() {
                if saw_element {
                    return false;
                }
                saw_element = true;
            }
            if !self.is_allowed_as_child(child, parent, is_replace, ref_child) {
                return false;
            }
        }
        true
    }

    /// Child index as a signed position; nodes without a slot sort first
    pub(crate) fn child_position(&self, parent: NodeId, child: NodeId) -> i64 {
        self.index_of(parent, child).map_or(-1, |i| i as i64)
    }
}

//! Document Position
//!
//! Tree-order comparison of nodes and of (node, offset) points.

use std::cmp::Ordering;

use bitflags::bitflags;

use crate::{DomTree, NodeId};

bitflags! {
    /// Result of [`DomTree::compare_document_position`], DOM bit values
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DocumentPosition: u16 {
        const DISCONNECTED = 0x01;
        const PRECEDING = 0x02;
        const FOLLOWING = 0x04;
        const CONTAINS = 0x08;
        const CONTAINED_BY = 0x10;
        const IMPLEMENTATION_SPECIFIC = 0x20;
    }
}

impl DomTree {
    /// Position of `other` relative to `reference`
    ///
    /// Attributes are treated as children of their owner element that
    /// precede every real child. Nodes in different trees are reported as
    /// disconnected with an order that is arbitrary but stable.
    pub fn compare_document_position(&self, reference: NodeId, other: NodeId) -> DocumentPosition {
        if reference == other {
            return DocumentPosition::empty();
        }

        let mut other_chain: Vec<NodeId> = Vec::with_capacity(32);
        let mut reference_chain: Vec<NodeId> = Vec::with_capacity(32);
        let mut other_node = other;
        let mut reference_node = reference;
        let mut other_attr = None;

        if let Some(owner) = self.attribute_owner(other_node) {
            other_attr = Some(other_node);
            other_chain.push(other_node);
            other_node = owner;
        }
        if let Some(owner) = self.attribute_owner(reference_node) {
            if let Some(attr) = other_attr.filter(|_| owner == other_node) {
                return self.compare_sibling_attributes(owner, attr, reference_node);
            }
            reference_chain.push(reference_node);
            reference_node = owner;
        }

        other_chain.extend(self.ancestors(other_node));
        reference_chain.extend(self.ancestors(reference_node));

        let (Some(&other_top), Some(&reference_top)) = (other_chain.last(), reference_chain.last())
        else {
            return DocumentPosition::DISCONNECTED;
        };
        if other_top != reference_top {
            let order = if other_top < reference_top {
                DocumentPosition::PRECEDING
            } else {
                DocumentPosition::FOLLOWING
            };
            return DocumentPosition::DISCONNECTED
                | DocumentPosition::IMPLEMENTATION_SPECIFIC
                | order;
        }

        // Walk down from the shared root until the chains diverge
        let mut parent = other_top;
        let mut i = other_chain.len() - 1;
        let mut j = reference_chain.len() - 1;
        while i > 0 && j > 0 {
            i -= 1;
            j -= 1;
            let other_child = other_chain[i];
            let reference_child = reference_chain[j];
            if other_child != reference_child {
                let other_index = self.child_position(parent, other_child);
                return if other_index < self.child_position(parent, reference_child) {
                    DocumentPosition::PRECEDING
                } else {
                    DocumentPosition::FOLLOWING
                };
            }
            parent = other_child;
        }

        // One chain is a prefix of the other
        if i < j {
            DocumentPosition::PRECEDING | DocumentPosition::CONTAINS
        } else {
            DocumentPosition::FOLLOWING | DocumentPosition::CONTAINED_BY
        }
    }

    fn attribute_owner(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).as_attribute().and_then(|a| a.owner())
    }

    fn compare_sibling_attributes(
        &self,
        owner: NodeId,
        other: NodeId,
        reference: NodeId,
    ) -> DocumentPosition {
        let attributes = self.node(owner).as_element().map(|e| e.attributes()).unwrap_or_default();
        for &attr in attributes {
            if attr == other {
                return DocumentPosition::IMPLEMENTATION_SPECIFIC | DocumentPosition::PRECEDING;
            }
            if attr == reference {
                return DocumentPosition::IMPLEMENTATION_SPECIFIC | DocumentPosition::FOLLOWING;
            }
        }
        DocumentPosition::DISCONNECTED
    }

    /// Order of two boundary points, `None` when they share no root
    pub fn compare_points(
        &self,
        node1: NodeId,
        offset1: u32,
        node2: NodeId,
        offset2: u32,
    ) -> Option<Ordering> {
        if node1 == node2 {
            return Some(offset1.cmp(&offset2));
        }

        let chain1: Vec<NodeId> = self.ancestors(node1).collect();
        let chain2: Vec<NodeId> = self.ancestors(node2).collect();
        let mut i = chain1.len() - 1;
        let mut j = chain2.len() - 1;
        if chain1[i] != chain2[j] {
            return None;
        }

        // Find the first pair of differing ancestors below the shared root
        let mut parent = chain1[i];
        while i > 0 && j > 0 {
            if chain1[i - 1] != chain2[j - 1] {
                break;
            }
            i -= 1;
            j -= 1;
            parent = chain1[i];
        }

        let before = if i == 0 {
            // node1 is an ancestor of node2; its point sits before the
            // branch when the offset does not pass the branch index
            (offset1 as i64) <= self.child_position(parent, chain2[j - 1])
        } else if j == 0 {
            self.child_position(parent, chain1[i - 1]) < offset2 as i64
        } else {
            self.child_position(parent, chain1[i - 1]) < self.child_position(parent, chain2[j - 1])
        };
        Some(if before { Ordering::Less } else { Ordering::Greater })
    }

    /// Deepest inclusive ancestor shared by both nodes
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if a == b {
            return Some(a);
        }
        let chain_a: Vec<NodeId> = self.ancestors(a).collect();
        let chain_b: Vec<NodeId> = self.ancestors(b).collect();

        let mut common = None;
        for (x, y) in chain_a.iter().rev().zip(chain_b.iter().rev()) {
            if x != y {
                break;
            }
            common = Some(*x);
        }
        common
    }

    /// Whether `other` is `node` or lies inside it, following the rules for
    /// anonymous content and cross-document nodes
    pub fn contains(&self, node: NodeId, other: NodeId) -> bool {
        if node == other {
            return true;
        }
        if self.owner_document(node) != self.owner_document(other) {
            return false;
        }
        let target = self.node(other);
        if !target.is_content() || self.first_child(node).is_none() {
            return false;
        }
        if self.node(node).is_document() {
            // Anonymous content is not a descendant of the document
            return self.root_of(other) == node && target.binding_parent().is_none();
        }
        let container = self.node(node);
        if !container.is_element() && !container.is_fragment() {
            return false;
        }
        if container.binding_parent() != target.binding_parent() {
            return false;
        }
        self.is_inclusive_descendant_of(other, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeOperations;

    /// doc > html > [a > [t1], b > [t2]]
    fn sample() -> (DomTree, [NodeId; 6]) {
        let mut tree = DomTree::new();
        let doc = tree.create_document();
        let html = tree.create_element(doc, "html");
        let a = tree.create_element(doc, "a");
        let b = tree.create_element(doc, "b");
        let t1 = tree.create_text(doc, "one");
        let t2 = tree.create_text(doc, "two");
        tree.append_child(doc, html).unwrap();
        tree.append_child(html, a).unwrap();
        tree.append_child(html, b).unwrap();
        tree.append_child(a, t1).unwrap();
        tree.append_child(b, t2).unwrap();
        (tree, [doc, html, a, b, t1, t2])
    }

    #[test]
    fn test_document_position() {
        let (tree, [doc, html, a, b, t1, t2]) = sample();
        assert_eq!(tree.compare_document_position(a, b), DocumentPosition::FOLLOWING);
        assert_eq!(tree.compare_document_position(b, a), DocumentPosition::PRECEDING);
        assert_eq!(
            tree.compare_document_position(t1, html),
            DocumentPosition::PRECEDING | DocumentPosition::CONTAINS
        );
        assert_eq!(
            tree.compare_document_position(doc, t2),
            DocumentPosition::FOLLOWING | DocumentPosition::CONTAINED_BY
        );
        assert_eq!(tree.compare_document_position(t1, t2), DocumentPosition::FOLLOWING);
        assert!(tree.compare_document_position(a, a).is_empty());
    }

    #[test]
    fn test_disconnected_is_consistent() {
        let (mut tree, [doc, ..]) = sample();
        let orphan = tree.create_element(doc, "orphan");
        let forward = tree.compare_document_position(doc, orphan);
        let backward = tree.compare_document_position(orphan, doc);

        assert!(forward.contains(
            DocumentPosition::DISCONNECTED | DocumentPosition::IMPLEMENTATION_SPECIFIC
        ));
        assert_eq!(
            forward.contains(DocumentPosition::FOLLOWING),
            backward.contains(DocumentPosition::PRECEDING)
        );
    }

    #[test]
    fn test_attributes() {
        let (mut tree, [doc, _html, a, _b, t1, _t2]) = sample();
        let id = tree.create_attribute(doc, "id", "x");
        let class = tree.create_attribute(doc, "class", "y");
        tree.set_attribute_node(a, id).unwrap();
        tree.set_attribute_node(a, class).unwrap();

        // attribute precedes the owner's children
        assert_eq!(tree.compare_document_position(t1, id), DocumentPosition::PRECEDING);
        assert_eq!(
            tree.compare_document_position(id, class),
            DocumentPosition::IMPLEMENTATION_SPECIFIC | DocumentPosition::FOLLOWING
        );
        assert_eq!(
            tree.compare_document_position(class, id),
            DocumentPosition::IMPLEMENTATION_SPECIFIC | DocumentPosition::PRECEDING
        );
        assert_eq!(
            tree.compare_document_position(id, a),
            DocumentPosition::PRECEDING | DocumentPosition::CONTAINS
        );
    }

    #[test]
    fn test_compare_points() {
        let (tree, [_doc, html, a, b, t1, t2]) = sample();
        assert_eq!(tree.compare_points(t1, 1, t1, 2), Some(Ordering::Less));
        assert_eq!(tree.compare_points(t1, 3, t2, 0), Some(Ordering::Less));
        // (html, 0) is before everything in a
        assert_eq!(tree.compare_points(html, 0, t1, 0), Some(Ordering::Less));
        // (html, 1) sits between a and b
        assert_eq!(tree.compare_points(html, 1, a, 0), Some(Ordering::Greater));
        assert_eq!(tree.compare_points(html, 1, b, 0), Some(Ordering::Less));
        assert_eq!(tree.compare_points(b, 0, html, 1), Some(Ordering::Greater));
        assert_eq!(tree.compare_points(html, 2, t2, 3), Some(Ordering::Greater));
    }

    #[test]
    fn test_compare_points_disconnected() {
        let (mut tree, [doc, _, a, ..]) = sample();
        let orphan = tree.create_element(doc, "x");
        assert_eq!(tree.compare_points(a, 0, orphan, 0), None);
    }

    #[test]
    fn test_common_ancestor() {
        let (mut tree, [doc, html, a, _b, t1, t2]) = sample();
        assert_eq!(tree.common_ancestor(t1, t2), Some(html));
        assert_eq!(tree.common_ancestor(t1, a), Some(a));
        assert_eq!(tree.common_ancestor(doc, doc), Some(doc));
        let orphan = tree.create_element(doc, "x");
        assert_eq!(tree.common_ancestor(orphan, t1), None);
    }

    #[test]
    fn test_contains() {
        let (mut tree, [doc, html, a, b, t1, _t2]) = sample();
        assert!(tree.contains(doc, t1));
        assert!(tree.contains(html, t1));
        assert!(!tree.contains(b, t1));
        assert!(tree.contains(t1, t1));

        let anon = tree.create_element(doc, "anon");
        tree.attach_anonymous_content(a, anon).unwrap();
        assert!(!tree.contains(doc, anon));
        assert!(!tree.contains(html, anon));
    }
}

//! Selection Ancestor Index
//!
//! Ranges that belong to a selection register on their closest common
//! ancestor. Every strict descendant of such a node carries the
//! descendant flag, so "is this node selected" only has to walk up to
//! the nearest flagged ancestor instead of scanning every range.

use std::cmp::Ordering;

use crate::node::NodeFlags;
use crate::range::RangeId;
use crate::{DomTree, NodeId};

impl DomTree {
    pub(crate) fn register_common_ancestor(&mut self, id: RangeId, node: NodeId) {
        self.mark_descendants(node);
        let entry = self.node_mut(node);
        entry.ranges.get_or_insert_with(Default::default).push(id);
        entry.flags.insert(NodeFlags::COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
        if let Some(range) = self.ranges.get_mut(id.0) {
            range.registered_ancestor = Some(node);
        }
        tracing::trace!(?id, ?node, "registered common ancestor");
    }

    pub(crate) fn unregister_common_ancestor(&mut self, id: RangeId, node: NodeId) {
        let entry = self.node_mut(node);
        let emptied = match entry.ranges.as_mut() {
            Some(set) => {
                set.retain(|&r| r != id);
                set.is_empty()
            }
            None => false,
        };
        if emptied {
            entry.ranges = None;
            entry.flags.remove(NodeFlags::COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
            self.unmark_descendants(node);
        }
        if let Some(range) = self.ranges.get_mut(id.0) {
            range.registered_ancestor = None;
        }
        tracing::trace!(?id, ?node, emptied, "unregistered common ancestor");
    }

    /// Flag the strict descendants of `node`, skipping subtrees rooted at
    /// another common ancestor (already flagged)
    pub(crate) fn mark_descendants(&mut self, node: NodeId) {
        if self.node(node).is_selection_descendant() {
            return;
        }
        let mut current = self.next_node(node, node);
        while let Some(n) = current {
            let entry = self.node_mut(n);
            entry.flags.insert(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
            current = if entry.is_common_ancestor_for_range_in_selection() {
                self.next_non_child_node(n, node)
            } else {
                self.next_node(n, node)
            };
        }
    }

    /// Inverse of [`Self::mark_descendants`]; a node still covered by an
    /// outer common ancestor keeps its descendants flagged
    pub(crate) fn unmark_descendants(&mut self, node: NodeId) {
        if self.node(node).is_selection_descendant() {
            return;
        }
        let mut current = self.next_node(node, node);
        while let Some(n) = current {
            let entry = self.node_mut(n);
            entry.flags.remove(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
            current = if entry.is_common_ancestor_for_range_in_selection() {
                self.next_non_child_node(n, node)
            } else {
                self.next_node(n, node)
            };
        }
    }

    /// Ranges registered on `node` as their common ancestor
    pub fn registered_ranges(&self, node: NodeId) -> &[RangeId] {
        self.get(node)
            .and_then(|n| n.ranges.as_deref())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn next_range_common_ancestor(&self, mut node: Option<NodeId>) -> Option<NodeId> {
        while let Some(n) = node {
            let entry = self.node(n);
            if entry.is_common_ancestor_for_range_in_selection() {
                return Some(n);
            }
            if !entry.is_descendant_of_common_ancestor_for_range_in_selection() {
                return None;
            }
            node = entry.parent();
        }
        None
    }

    /// Whether the span `[start_offset, end_offset]` of `node` overlaps any
    /// non-collapsed range in the selection
    pub fn is_node_selected(&self, node: NodeId, start_offset: u32, end_offset: u32) -> bool {
        let mut ancestor = self.next_range_common_ancestor(Some(node));
        while let Some(common) = ancestor {
            for &id in self.registered_ranges(common) {
                let Some(range) = self.ranges.get(id.0) else {
                    continue;
                };
                if !range.in_selection || range.collapsed() {
                    continue;
                }
                let Some((start, end)) = range.bounds() else {
                    continue;
                };
                let starts_before = self.compare_points(node, end_offset, start.node, start.offset);
                let ends_after = self.compare_points(node, start_offset, end.node, end.offset);
                if starts_before == Some(Ordering::Greater) && ends_after == Some(Ordering::Less) {
                    return true;
                }
            }
            ancestor = self.next_range_common_ancestor(self.parent(common));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeOperations;

    /// doc > body > [p > [t1], div > [t2, span > [t3]]]
    fn sample() -> (DomTree, [NodeId; 8]) {
        let mut tree = DomTree::new();
        let doc = tree.create_document();
        let body = tree.create_element(doc, "body");
        let p = tree.create_element(doc, "p");
        let div = tree.create_element(doc, "div");
        let span = tree.create_element(doc, "span");
        let t1 = tree.create_text(doc, "first");
        let t2 = tree.create_text(doc, "second");
        let t3 = tree.create_text(doc, "third");
        tree.append_child(doc, body).unwrap();
        tree.append_child(body, p).unwrap();
        tree.append_child(body, div).unwrap();
        tree.append_child(p, t1).unwrap();
        tree.append_child(div, t2).unwrap();
        tree.append_child(div, span).unwrap();
        tree.append_child(span, t3).unwrap();
        (tree, [doc, body, p, div, span, t1, t2, t3])
    }

    fn descendant(tree: &DomTree, node: NodeId) -> bool {
        tree.node(node).is_descendant_of_common_ancestor_for_range_in_selection()
    }

    #[test]
    fn test_register_marks_subtree() {
        let (mut tree, [_doc, body, p, div, span, t1, t2, t3]) = sample();
        let id = tree.create_range_at(t2, 1, t3, 2).unwrap();
        tree.set_in_selection(id, true).unwrap();

        assert!(tree.node(div).is_common_ancestor_for_range_in_selection());
        assert_eq!(tree.registered_ranges(div), &[id]);
        assert!(descendant(&tree, t2) && descendant(&tree, span) && descendant(&tree, t3));
        assert!(!descendant(&tree, div));
        assert!(!descendant(&tree, p) && !descendant(&tree, t1) && !descendant(&tree, body));
    }

    #[test]
    fn test_unregister_clears_on_last_range() {
        let (mut tree, [_doc, _body, _p, div, _span, _t1, t2, t3]) = sample();
        let a = tree.create_range_at(t2, 0, t3, 1).unwrap();
        let b = tree.create_range_at(t2, 2, t3, 3).unwrap();
        tree.set_in_selection(a, true).unwrap();
        tree.set_in_selection(b, true).unwrap();

        tree.set_in_selection(a, false).unwrap();
        assert_eq!(tree.registered_ranges(div), &[b]);
        assert!(tree.node(div).is_common_ancestor_for_range_in_selection());
        assert!(descendant(&tree, t3));

        tree.set_in_selection(b, false).unwrap();
        assert!(tree.registered_ranges(div).is_empty());
        assert!(!tree.node(div).is_selection_descendant());
        assert!(!descendant(&tree, t2) && !descendant(&tree, t3));
    }

    #[test]
    fn test_nested_common_ancestors() {
        let (mut tree, [_doc, body, _p, div, span, t1, _t2, t3]) = sample();
        let inner = tree.create_range_at(t3, 0, t3, 2).unwrap();
        tree.set_in_selection(inner, true).unwrap();
        assert!(tree.node(t3).is_common_ancestor_for_range_in_selection());

        let outer = tree.create_range_at(t1, 0, t3, 1).unwrap();
        tree.set_in_selection(outer, true).unwrap();
        assert_eq!(tree.registered_ranges(body), &[outer]);
        assert!(descendant(&tree, span));
        // the inner common ancestor is flagged both ways
        assert!(descendant(&tree, t3));

        // dropping the outer range must not unmark below the inner one
        tree.set_in_selection(outer, false).unwrap();
        assert!(!descendant(&tree, div));
        assert!(tree.node(t3).is_common_ancestor_for_range_in_selection());
    }

    #[test]
    fn test_is_node_selected() {
        let (mut tree, [_doc, _body, p, _div, _span, t1, t2, t3]) = sample();
        let id = tree.create_range_at(t1, 2, t2, 3).unwrap();
        assert!(!tree.is_node_selected(t1, 0, 5));

        tree.set_in_selection(id, true).unwrap();
        assert!(tree.is_node_selected(t1, 0, 5));
        assert!(tree.is_node_selected(t2, 0, 1));
        assert!(!tree.is_node_selected(t1, 0, 2));
        assert!(!tree.is_node_selected(t2, 3, 6));
        assert!(!tree.is_node_selected(t3, 0, 5));
        assert!(tree.is_node_selected(p, 0, 1));

        tree.collapse(id, true).unwrap();
        assert!(!tree.is_node_selected(t1, 0, 5));
    }

    #[test]
    fn test_insertion_marks_new_subtree() {
        let (mut tree, [doc, _body, _p, div, _span, _t1, t2, t3]) = sample();
        let id = tree.create_range_at(t2, 0, t3, 1).unwrap();
        tree.set_in_selection(id, true).unwrap();

        let em = tree.create_element(doc, "em");
        let inner = tree.create_text(doc, "new");
        tree.append_child(em, inner).unwrap();
        tree.insert_before(div, em, Some(t2)).unwrap();
        assert!(descendant(&tree, em) && descendant(&tree, inner));

        let appended = tree.create_element(doc, "b");
        tree.append_child(div, appended).unwrap();
        assert!(descendant(&tree, appended));

        tree.remove_child(div, em).unwrap();
        assert!(!descendant(&tree, em) && !descendant(&tree, inner));
    }

    #[test]
    fn test_range_moves_reregister() {
        let (mut tree, [_doc, body, _p, div, span, t1, _t2, t3]) = sample();
        let id = tree.create_range_at(t3, 0, t3, 2).unwrap();
        tree.set_in_selection(id, true).unwrap();

        tree.set_start(id, t1, 0).unwrap();
        assert!(tree.registered_ranges(t3).is_empty());
        assert_eq!(tree.registered_ranges(body), &[id]);

        // removing the subtree holding the end gravitates it to div
        tree.remove_child(div, span).unwrap();
        assert_eq!(tree.registered_ranges(body), &[id]);
        assert!(!descendant(&tree, t3));

        tree.reset_range(id).unwrap();
        assert!(tree.registered_ranges(body).is_empty());
        assert!(!tree.range(id).unwrap().is_in_selection());
    }
}

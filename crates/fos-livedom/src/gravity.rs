//! Range Gravity
//!
//! Per-range repair for each mutation notification. Each handler touches
//! only the range's own boundaries; subtree marking for the selection
//! index piggybacks on the insert, append and remove handlers.

use crate::node::NodeFlags;
use crate::observer::{CharacterDataChange, ChangeDetails};
use crate::range::{BoundaryPoint, RangeId};
use crate::{DomTree, NodeId};

/// Offset after a splice that did not split or merge the node
fn shift_offset(offset: u32, change: &CharacterDataChange) -> u32 {
    if offset <= change.change_end {
        change.change_start
    } else {
        offset - change.change_end + change.change_start + change.replace_length
    }
}

impl DomTree {
    pub(crate) fn range_character_data_changed(
        &mut self,
        id: RangeId,
        content: NodeId,
        change: &CharacterDataChange,
    ) {
        let Some(range) = self.ranges.get(id.0) else {
            return;
        };
        let Some((mut start, mut end)) = range.bounds() else {
            return;
        };
        let root = range.root;
        let may_span = range.may_span_anonymous_subtrees;

        let mut new_start = None;
        let mut new_end = None;
        let mut new_root = None;

        if content == start.node && change.change_start < start.offset {
            match change.details {
                Some(ChangeDetails::Split { new_sibling }) => {
                    let offset = start.offset - change.change_start;
                    new_start = Some(BoundaryPoint::new(new_sibling, offset));
                    if root == Some(content) {
                        new_root = self.valid_boundary_root(new_sibling, may_span);
                    }
                }
                _ => start.offset = shift_offset(start.offset, change),
            }
        }

        if content == end.node && change.change_start < end.offset {
            match change.details {
                // A detached node only hands its end over if the start went too
                Some(ChangeDetails::Split { new_sibling })
                    if self.parent(content).is_some() || new_start.is_some() =>
                {
                    let offset = end.offset - change.change_start;
                    new_end = Some(BoundaryPoint::new(new_sibling, offset));
                }
                _ => end.offset = shift_offset(end.offset, change),
            }
        }

        if let Some(ChangeDetails::Merge { absorbed }) = change.details {
            if absorbed == start.node {
                new_start = Some(BoundaryPoint::new(content, start.offset + change.change_start));
                if root == Some(absorbed) {
                    new_root = self.valid_boundary_root(content, may_span);
                }
            }
            if absorbed == end.node {
                new_end = Some(BoundaryPoint::new(content, end.offset + change.change_start));
            }
        }

        if new_start.is_some() || new_end.is_some() {
            let bounds = (new_start.unwrap_or(start), new_end.unwrap_or(end));
            tracing::trace!(?id, ?bounds, "boundary moved by split or merge");
            self.do_set_range(id, Some(bounds), new_root.or(root));
        } else if let Some(range) = self.ranges.get_mut(id.0) {
            range.start = Some(start);
            range.end = Some(end);
        }
    }

    pub(crate) fn range_child_inserted(
        &mut self,
        id: RangeId,
        container: NodeId,
        child: NodeId,
        index: usize,
    ) {
        let Some(range) = self.ranges.get_mut(id.0) else {
            return;
        };
        for point in [&mut range.start, &mut range.end].into_iter().flatten() {
            if point.node == container && index < point.offset as usize {
                point.offset += 1;
            }
        }

        if self.node(container).is_selection_descendant()
            && !self.node(child).is_descendant_of_common_ancestor_for_range_in_selection()
        {
            self.mark_descendants(child);
            self.node_mut(child)
                .flags
                .insert(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
        }
    }

    /// Appends land after every boundary offset, so only marking is needed
    pub(crate) fn range_child_appended(&mut self, id: RangeId, container: NodeId, index: usize) {
        let Some(range) = self.ranges.get(id.0) else {
            return;
        };
        if !range.in_selection || !self.node(container).is_selection_descendant() {
            return;
        }
        let appended = self
            .children(container)
            .get(index..)
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default();
        for child in appended {
            if !self.node(child).is_descendant_of_common_ancestor_for_range_in_selection() {
                self.mark_descendants(child);
                self.node_mut(child)
                    .flags
                    .insert(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
            }
        }
    }

    pub(crate) fn range_child_removed(
        &mut self,
        id: RangeId,
        container: NodeId,
        child: NodeId,
        index: usize,
    ) {
        let Some(range) = self.ranges.get(id.0) else {
            return;
        };
        let Some((mut start, mut end)) = range.bounds() else {
            return;
        };
        let root = range.root;
        let gravity = range.gravity;

        let mut gravitated = false;
        let mut dangling = false;
        for point in [&mut start, &mut end] {
            if point.node == container {
                if index < point.offset as usize {
                    point.offset -= 1;
                }
            } else if self.is_inclusive_descendant_of(point.node, child) {
                if gravity {
                    *point = BoundaryPoint::new(container, index as u32);
                    gravitated = true;
                } else {
                    dangling = true;
                }
            }
        }

        if gravitated {
            tracing::trace!(?id, ?container, index, "boundary gravitated out of removed subtree");
            self.do_set_range(id, Some((start, end)), root);
        } else if let Some(range) = self.ranges.get_mut(id.0) {
            range.start = Some(start);
            range.end = Some(end);
        }
        if dangling {
            tracing::warn!(?id, ?child, "range left dangling in removed subtree");
        }

        let child_node = self.node(child);
        if self.node(container).is_selection_descendant()
            && child_node.is_descendant_of_common_ancestor_for_range_in_selection()
        {
            self.node_mut(child)
                .flags
                .remove(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
            self.unmark_descendants(child);
        }
    }

    /// The range's root gained a parent; move the subscription up
    pub(crate) fn range_parent_chain_changed(&mut self, id: RangeId) {
        let Some(range) = self.ranges.get(id.0) else {
            return;
        };
        let Some((start, end)) = range.bounds() else {
            return;
        };
        let new_root = self.valid_boundary_root(start.node, range.may_span_anonymous_subtrees);
        tracing::trace!(?id, ?new_root, "range root changed");
        self.do_set_range(id, Some((start, end)), new_root);
    }
}

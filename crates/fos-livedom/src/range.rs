//! Range API
//!
//! Live ranges stored in a generational arena inside the tree. A range
//! observes its root node: mutation notifications under that root repair
//! its boundaries (see `gravity.rs`), and ranges flagged as part of a
//! selection register their common ancestor with the selection index.

use std::cmp::Ordering;

use crate::arena::GenIndex;
use crate::error::{DomError, DomResult};
use crate::node::NodeData;
use crate::operations::NodeOperations;
use crate::{DomTree, NodeId};

/// Handle to a range owned by a [`DomTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeId(pub(crate) GenIndex);

/// Range boundary point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryPoint {
    /// The container node
    pub node: NodeId,
    /// Offset within the container (code unit for character data, child index otherwise)
    pub offset: u32,
}

impl BoundaryPoint {
    pub fn new(node: NodeId, offset: u32) -> Self {
        Self { node, offset }
    }
}

/// Boundary pairing for [`DomTree::compare_boundary_points`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCompare {
    StartToStart = 0,
    StartToEnd = 1,
    EndToEnd = 2,
    EndToStart = 3,
}

/// Range - a live interval over the tree
#[derive(Debug, Clone)]
pub struct Range {
    pub(crate) start: Option<BoundaryPoint>,
    pub(crate) end: Option<BoundaryPoint>,
    /// Node whose subtree this range observes
    pub(crate) root: Option<NodeId>,
    pub(crate) in_selection: bool,
    pub(crate) gravity: bool,
    pub(crate) may_span_anonymous_subtrees: bool,
    /// Node this range is registered on in the selection index
    pub(crate) registered_ancestor: Option<NodeId>,
}

impl Range {
    fn new(gravity: bool, may_span_anonymous_subtrees: bool) -> Self {
        Self {
            start: None,
            end: None,
            root: None,
            in_selection: false,
            gravity,
            may_span_anonymous_subtrees,
            registered_ancestor: None,
        }
    }

    // --- Getters ---

    pub fn is_positioned(&self) -> bool {
        self.start.is_some()
    }

    pub fn start(&self) -> Option<BoundaryPoint> {
        self.start
    }

    pub fn end(&self) -> Option<BoundaryPoint> {
        self.end
    }

    pub fn start_container(&self) -> Option<NodeId> {
        self.start.map(|p| p.node)
    }

    pub fn start_offset(&self) -> Option<u32> {
        self.start.map(|p| p.offset)
    }

    pub fn end_container(&self) -> Option<NodeId> {
        self.end.map(|p| p.node)
    }

    pub fn end_offset(&self) -> Option<u32> {
        self.end.map(|p| p.offset)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Positioned with identical boundaries
    pub fn collapsed(&self) -> bool {
        self.is_positioned() && self.start == self.end
    }

    pub fn is_in_selection(&self) -> bool {
        self.in_selection
    }

    pub fn gravity_enabled(&self) -> bool {
        self.gravity
    }

    pub fn may_span_anonymous_subtrees(&self) -> bool {
        self.may_span_anonymous_subtrees
    }

    pub(crate) fn bounds(&self) -> Option<(BoundaryPoint, BoundaryPoint)> {
        Some((self.start?, self.end?))
    }
}

impl DomTree {
    // --- Lifecycle ---

    /// Create an unpositioned range
    pub fn create_range(&mut self) -> RangeId {
        let range = Range::new(
            self.config.gravity_on_removal,
            self.config.may_span_anonymous_subtrees,
        );
        let id = RangeId(self.ranges.insert(range));
        tracing::trace!(?id, "range created");
        id
    }

    /// Create a range and set both boundaries
    pub fn create_range_at(
        &mut self,
        start: NodeId,
        start_offset: u32,
        end: NodeId,
        end_offset: u32,
    ) -> DomResult<RangeId> {
        let id = self.create_range();
        let result = self
            .set_start(id, start, start_offset)
            .and_then(|()| self.set_end(id, end, end_offset));
        if let Err(err) = result {
            self.destroy_range(id)?;
            return Err(err);
        }
        Ok(id)
    }

    /// Reset, unregister and free a range; the handle becomes stale
    pub fn destroy_range(&mut self, id: RangeId) -> DomResult<()> {
        self.reset_range(id)?;
        self.ranges.remove(id.0);
        tracing::trace!(?id, "range destroyed");
        Ok(())
    }

    /// Return a range to the unpositioned state
    pub fn reset_range(&mut self, id: RangeId) -> DomResult<()> {
        self.range_ref(id)?;
        self.do_set_range(id, None, None);
        Ok(())
    }

    /// Kept for API parity; a detached range keeps working
    pub fn detach_range(&mut self, id: RangeId) -> DomResult<()> {
        self.range_ref(id).map(|_| ())
    }

    pub fn range(&self, id: RangeId) -> Option<&Range> {
        self.ranges.get(id.0)
    }

    pub(crate) fn range_ref(&self, id: RangeId) -> DomResult<&Range> {
        self.ranges.get(id.0).ok_or(DomError::InvalidState)
    }

    fn positioned_bounds(&self, id: RangeId) -> DomResult<(BoundaryPoint, BoundaryPoint)> {
        self.range_ref(id)?.bounds().ok_or(DomError::InvalidState)
    }

    /// Root a boundary in `node` would give the range, `None` for doctypes
    pub(crate) fn valid_boundary_root(
        &self,
        node: NodeId,
        may_span_anonymous_subtrees: bool,
    ) -> Option<NodeId> {
        if self.node(node).is_doctype() {
            return None;
        }
        if !may_span_anonymous_subtrees {
            if let Some(binding_parent) = self.binding_parent(node) {
                return Some(binding_parent);
            }
        }
        Some(self.root_of(node))
    }

    /// Single entry point for every boundary change
    ///
    /// Keeps the root subscription and the selection-index registration in
    /// step with the new boundaries.
    pub(crate) fn do_set_range(
        &mut self,
        id: RangeId,
        bounds: Option<(BoundaryPoint, BoundaryPoint)>,
        root: Option<NodeId>,
    ) {
        let Some(range) = self.ranges.get_mut(id.0) else {
            return;
        };
        let old_root = range.root;
        let containers_changed = range.start.map(|p| p.node) != bounds.map(|b| b.0.node)
            || range.end.map(|p| p.node) != bounds.map(|b| b.1.node);
        range.start = bounds.map(|b| b.0);
        range.end = bounds.map(|b| b.1);
        range.root = root;
        let in_selection = range.in_selection;
        let registered = range.registered_ancestor;

        if old_root != root {
            if let Some(old) = old_root {
                self.unsubscribe_range(old, id);
            }
            if let Some(new) = root {
                self.subscribe_range(new, id);
            }
        }

        if in_selection && containers_changed {
            let new_ancestor = bounds.and_then(|(s, e)| self.common_ancestor(s.node, e.node));
            if new_ancestor != registered {
                if let Some(old) = registered {
                    self.unregister_common_ancestor(id, old);
                }
                match new_ancestor {
                    Some(node) => self.register_common_ancestor(id, node),
                    None => {
                        if let Some(range) = self.ranges.get_mut(id.0) {
                            range.in_selection = false;
                        }
                    }
                }
            }
        }
    }

    fn subscribe_range(&mut self, root: NodeId, id: RangeId) {
        self.subscriptions.entry(root).or_default().push(id);
    }

    fn unsubscribe_range(&mut self, root: NodeId, id: RangeId) {
        if let Some(list) = self.subscriptions.get_mut(&root) {
            list.retain(|&r| r != id);
            if list.is_empty() {
                self.subscriptions.remove(&root);
            }
        }
    }

    // --- Setters ---

    fn validate_boundary(&self, id: RangeId, node: NodeId, offset: u32) -> DomResult<NodeId> {
        let range = self.range_ref(id)?;
        let root = self
            .valid_boundary_root(node, range.may_span_anonymous_subtrees)
            .ok_or(DomError::InvalidNodeType)?;
        if offset > self.length(node) {
            return Err(DomError::IndexSize);
        }
        Ok(root)
    }

    pub fn set_start(&mut self, id: RangeId, node: NodeId, offset: u32) -> DomResult<()> {
        let new_root = self.validate_boundary(id, node, offset)?;
        let range = self.range_ref(id)?;
        let point = BoundaryPoint::new(node, offset);

        match (range.end, range.root) {
            (Some(end), Some(root))
                if root == new_root
                    && !matches!(
                        self.compare_points(node, offset, end.node, end.offset),
                        None | Some(Ordering::Greater)
                    ) =>
            {
                self.do_set_range(id, Some((point, end)), Some(root));
            }
            _ => self.do_set_range(id, Some((point, point)), Some(new_root)),
        }
        tracing::trace!(?id, ?point, "range start set");
        Ok(())
    }

    pub fn set_end(&mut self, id: RangeId, node: NodeId, offset: u32) -> DomResult<()> {
        let new_root = self.validate_boundary(id, node, offset)?;
        let range = self.range_ref(id)?;
        let point = BoundaryPoint::new(node, offset);

        match (range.start, range.root) {
            (Some(start), Some(root))
                if root == new_root
                    && !matches!(
                        self.compare_points(start.node, start.offset, node, offset),
                        None | Some(Ordering::Greater)
                    ) =>
            {
                self.do_set_range(id, Some((start, point)), Some(root));
            }
            _ => self.do_set_range(id, Some((point, point)), Some(new_root)),
        }
        tracing::trace!(?id, ?point, "range end set");
        Ok(())
    }

    /// Parent and index of a node, for the *_before/*_after setters
    fn slot_of(&self, node: NodeId) -> DomResult<(NodeId, u32)> {
        let parent = self.parent(node).ok_or(DomError::InvalidNodeType)?;
        let index = self.index_of(parent, node).ok_or(DomError::IndexSize)?;
        Ok((parent, index as u32))
    }

    pub fn set_start_before(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let (parent, index) = self.slot_of(node)?;
        self.set_start(id, parent, index)
    }

    pub fn set_start_after(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let (parent, index) = self.slot_of(node)?;
        self.set_start(id, parent, index + 1)
    }

    pub fn set_end_before(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let (parent, index) = self.slot_of(node)?;
        self.set_end(id, parent, index)
    }

    pub fn set_end_after(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let (parent, index) = self.slot_of(node)?;
        self.set_end(id, parent, index + 1)
    }

    /// Collapse onto one boundary
    pub fn collapse(&mut self, id: RangeId, to_start: bool) -> DomResult<()> {
        let (start, end) = self.positioned_bounds(id)?;
        let root = self.range_ref(id)?.root;
        let point = if to_start { start } else { end };
        self.do_set_range(id, Some((point, point)), root);
        Ok(())
    }

    /// Select `node` itself within its parent
    pub fn select_node(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let may_span = self.range_ref(id)?.may_span_anonymous_subtrees;
        let parent = self.parent(node).ok_or(DomError::InvalidNodeType)?;
        let root = self.valid_boundary_root(parent, may_span).ok_or(DomError::InvalidNodeType)?;
        let index = self.index_of(parent, node).ok_or(DomError::InvalidNodeType)? as u32;
        self.do_set_range(
            id,
            Some((BoundaryPoint::new(parent, index), BoundaryPoint::new(parent, index + 1))),
            Some(root),
        );
        Ok(())
    }

    /// Select everything inside `node`
    pub fn select_node_contents(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let may_span = self.range_ref(id)?.may_span_anonymous_subtrees;
        let root = self.valid_boundary_root(node, may_span).ok_or(DomError::InvalidNodeType)?;
        let length = self.length(node);
        self.do_set_range(
            id,
            Some((BoundaryPoint::new(node, 0), BoundaryPoint::new(node, length))),
            Some(root),
        );
        Ok(())
    }

    /// Enable or disable repositioning out of removed subtrees
    pub fn set_gravity(&mut self, id: RangeId, enabled: bool) -> DomResult<()> {
        let range = self.ranges.get_mut(id.0).ok_or(DomError::InvalidState)?;
        range.gravity = enabled;
        Ok(())
    }

    /// Takes effect on the next boundary change
    pub fn set_may_span_anonymous_subtrees(&mut self, id: RangeId, enabled: bool) -> DomResult<()> {
        let range = self.ranges.get_mut(id.0).ok_or(DomError::InvalidState)?;
        range.may_span_anonymous_subtrees = enabled;
        Ok(())
    }

    /// Add the range to, or take it out of, the selection index
    pub fn set_in_selection(&mut self, id: RangeId, in_selection: bool) -> DomResult<()> {
        let range = self.range_ref(id)?;
        if range.in_selection == in_selection {
            return Ok(());
        }
        if in_selection {
            let (start, end) = range.bounds().ok_or(DomError::InvalidState)?;
            let ancestor = self
                .common_ancestor(start.node, end.node)
                .ok_or(DomError::InvalidState)?;
            if let Some(range) = self.ranges.get_mut(id.0) {
                range.in_selection = true;
            }
            self.register_common_ancestor(id, ancestor);
        } else {
            let registered = range.registered_ancestor;
            if let Some(range) = self.ranges.get_mut(id.0) {
                range.in_selection = false;
            }
            if let Some(node) = registered {
                self.unregister_common_ancestor(id, node);
            }
        }
        Ok(())
    }

    // --- Queries ---

    pub fn common_ancestor_container(&self, id: RangeId) -> DomResult<NodeId> {
        let (start, end) = self.positioned_bounds(id)?;
        self.common_ancestor(start.node, end.node).ok_or(DomError::InvalidState)
    }

    /// Whether a boundary was left inside a subtree removed while gravity was off
    pub fn range_is_dangling(&self, id: RangeId) -> bool {
        let Some(range) = self.range(id) else {
            return false;
        };
        match (range.bounds(), range.root) {
            (Some((start, end)), Some(root)) => {
                !self.is_inclusive_descendant_of(start.node, root)
                    || !self.is_inclusive_descendant_of(end.node, root)
            }
            _ => false,
        }
    }

    /// Where (node, offset) lies relative to the range
    pub fn compare_point(&self, id: RangeId, node: NodeId, offset: u32) -> DomResult<Ordering> {
        let (start, end) = self.positioned_bounds(id)?;
        let root = self.range_ref(id)?.root.ok_or(DomError::InvalidState)?;
        if !self.is_inclusive_descendant_of(node, root) {
            return Err(DomError::WrongDocument);
        }
        if self.node(node).is_doctype() {
            return Err(DomError::InvalidNodeType);
        }
        if offset > self.length(node) {
            return Err(DomError::IndexSize);
        }

        match self.compare_points(node, offset, start.node, start.offset) {
            None => return Err(DomError::WrongDocument),
            Some(Ordering::Less) => return Ok(Ordering::Less),
            Some(_) => {}
        }
        match self.compare_points(end.node, end.offset, node, offset) {
            None => Err(DomError::WrongDocument),
            Some(Ordering::Less) => Ok(Ordering::Greater),
            Some(_) => Ok(Ordering::Equal),
        }
    }

    pub fn is_point_in_range(&self, id: RangeId, node: NodeId, offset: u32) -> DomResult<bool> {
        match self.compare_point(id, node, offset) {
            Ok(ordering) => Ok(ordering == Ordering::Equal),
            Err(DomError::WrongDocument) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Whether any part of `node` lies inside the range
    pub fn intersects_node(&self, id: RangeId, node: NodeId) -> DomResult<bool> {
        let (start, end) = self.positioned_bounds(id)?;
        let Some(parent) = self.parent(node) else {
            return Ok(self.range_ref(id)?.root == Some(node));
        };
        let (before, after) = match self.index_of(parent, node) {
            Some(index) => ((parent, index as u32), (parent, index as u32 + 1)),
            None => ((node, 0), (node, self.length(node))),
        };
        let starts_before_end =
            self.compare_points(before.0, before.1, end.node, end.offset) == Some(Ordering::Less);
        let ends_after_start = self.compare_points(after.0, after.1, start.node, start.offset)
            == Some(Ordering::Greater);
        Ok(starts_before_end && ends_after_start)
    }

    /// Compare one boundary of this range with one of `other`
    pub fn compare_boundary_points(
        &self,
        id: RangeId,
        how: RangeCompare,
        other: RangeId,
    ) -> DomResult<Ordering> {
        let (start, end) = self.positioned_bounds(id)?;
        let (other_start, other_end) = self.positioned_bounds(other)?;
        if self.range_ref(id)?.root != self.range_ref(other)?.root {
            return Err(DomError::WrongDocument);
        }
        let (ours, theirs) = match how {
            RangeCompare::StartToStart => (start, other_start),
            RangeCompare::StartToEnd => (end, other_start),
            RangeCompare::EndToEnd => (end, other_end),
            RangeCompare::EndToStart => (start, other_end),
        };
        self.compare_points(ours.node, ours.offset, theirs.node, theirs.offset)
            .ok_or(DomError::WrongDocument)
    }

    /// `(before, after)`: whether the node starts before the range and
    /// whether it ends after it
    pub fn compare_node_to_range(&self, id: RangeId, node: NodeId) -> DomResult<(bool, bool)> {
        let (start, end) = self.positioned_bounds(id)?;
        let (container, node_start, node_end) = match self.parent(node) {
            Some(parent) => match self.index_of(parent, node) {
                Some(index) => (parent, index as u32, index as u32 + 1),
                None => (node, 0, self.length(node)),
            },
            None => (node, 0, self.length(node)),
        };
        let before = self
            .compare_points(start.node, start.offset, container, node_start)
            .ok_or(DomError::WrongDocument)?
            == Ordering::Greater;
        let after = self
            .compare_points(end.node, end.offset, container, node_end)
            .ok_or(DomError::WrongDocument)?
            == Ordering::Less;
        Ok((before, after))
    }

    /// New range with the same boundaries and flags, not in the selection
    pub fn clone_range(&mut self, id: RangeId) -> DomResult<RangeId> {
        let source = self.range_ref(id)?;
        let bounds = source.bounds();
        let root = source.root;
        let gravity = source.gravity;
        let may_span = source.may_span_anonymous_subtrees;

        let clone = RangeId(self.ranges.insert(Range::new(gravity, may_span)));
        if bounds.is_some() {
            self.do_set_range(clone, bounds, root);
        }
        Ok(clone)
    }

    /// Text covered by the range, partial at the edges
    pub fn range_to_string(&self, id: RangeId) -> DomResult<String> {
        let (start, end) = self.positioned_bounds(id)?;
        if start.node == end.node {
            if let NodeData::Text(text) = &self.node(start.node).data {
                return Ok(text.substring(start.offset, end.offset));
            }
        }

        let within = self.common_ancestor(start.node, end.node).ok_or(DomError::WrongDocument)?;
        let mut out = String::new();
        let mut current = Some(within);
        while let Some(node) = current {
            if let NodeData::Text(text) = &self.node(node).data {
                if node == start.node {
                    out.push_str(&text.substring(start.offset, text.len()));
                } else if node == end.node {
                    out.push_str(&text.substring(0, end.offset));
                } else if self.compare_points(start.node, start.offset, node, 0)
                    != Some(Ordering::Greater)
                    && self.compare_points(node, text.len(), end.node, end.offset)
                        != Some(Ordering::Greater)
                {
                    out.push_str(&text.to_string_lossy());
                }
            }
            current = self.next_node(node, within);
        }
        Ok(out)
    }

    /// Insert `node` at the range start, splitting a text start container
    pub fn insert_node(&mut self, id: RangeId, node: NodeId) -> DomResult<()> {
        let (start, end) = self.positioned_bounds(id)?;
        let start_node = self.node(start.node);
        let start_is_text = start_node.is_text();
        if matches!(start_node.data, NodeData::Comment(_) | NodeData::ProcessingInstruction { .. })
            || (start_is_text && start_node.parent().is_none())
            || start.node == node
        {
            return Err(DomError::HierarchyRequest);
        }
        let was_collapsed = start == end;

        // Validate against the pre-split tree so a failed insert leaves no trace
        let (parent, reference) = if start_is_text {
            let parent = self.parent(start.node).ok_or(DomError::HierarchyRequest)?;
            (parent, self.next_sibling(start.node))
        } else {
            (start.node, self.child_at(start.node, start.offset as usize))
        };
        if !self.node(node).is_content()
            || !self.is_allowed_as_child(node, parent, false, reference)
        {
            return Err(DomError::HierarchyRequest);
        }

        let mut reference = if start_is_text {
            Some(self.split_text(start.node, start.offset)?)
        } else {
            reference
        };
        if reference == Some(node) {
            reference = self.next_sibling(node);
        }
        if let Some(old_parent) = self.parent(node) {
            self.remove_child(old_parent, node)?;
        }

        let inserted = if self.node(node).is_fragment() { self.length(node) } else { 1 };
        let new_offset = match reference {
            Some(r) => self.index_of(parent, r).ok_or(DomError::NotFound)? as u32,
            None => self.length(parent),
        } + inserted;

        self.insert_before(parent, node, reference)?;
        if was_collapsed {
            self.set_end(id, parent, new_offset)?;
        }
        tracing::debug!(?id, ?node, ?parent, "node inserted into range");
        Ok(())
    }
}

/// Whether content between two boundary points is moved out or copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentAction {
    Extract,
    Clone,
}

// --- Content operations ---
//
// These edit the tree through `NodeOperations` and `replace_data`, so every
// other live range is repaired by the usual notifications. The range being
// operated on is snapshotted first and repositioned at the end.

impl DomTree {
    /// Remove everything the range covers and collapse it
    pub fn delete_contents(&mut self, id: RangeId) -> DomResult<()> {
        let (start, end) = self.positioned_bounds(id)?;
        if start == end {
            return Ok(());
        }
        if start.node == end.node && self.node(start.node).is_character_data() {
            self.replace_data(start.node, start.offset, end.offset - start.offset, "")?;
            return self.collapse_after_cut(id, start, None);
        }

        let removed = self.outermost_contained_nodes(start, end)?;
        let after = self.collapse_target(start, end)?;

        if self.node(start.node).is_character_data() {
            let length = self.length(start.node);
            self.replace_data(start.node, start.offset, length - start.offset, "")?;
        }
        for node in removed {
            if let Some(parent) = self.parent(node) {
                self.remove_child(parent, node)?;
            }
        }
        if self.node(end.node).is_character_data() {
            self.replace_data(end.node, 0, end.offset, "")?;
        }
        tracing::debug!(?id, "range contents deleted");
        self.collapse_after_cut(id, start, after)
    }

    /// Move the covered content into a new fragment and collapse the range
    ///
    /// Partially covered containers stay in place; shallow copies of them
    /// carry the moved part in the fragment.
    pub fn extract_contents(&mut self, id: RangeId) -> DomResult<NodeId> {
        let (start, end) = self.positioned_bounds(id)?;
        let after = self.collapse_target(start, end)?;
        let fragment = self.cut_between(start, end, ContentAction::Extract)?;
        tracing::debug!(?id, ?fragment, "range contents extracted");
        self.collapse_after_cut(id, start, after)?;
        Ok(fragment)
    }

    /// Copy the covered content into a new fragment
    pub fn clone_contents(&mut self, id: RangeId) -> DomResult<NodeId> {
        let (start, end) = self.positioned_bounds(id)?;
        self.cut_between(start, end, ContentAction::Clone)
    }

    /// Move the covered content into `new_parent`, put `new_parent` where
    /// the content was and select it
    ///
    /// Fails with `InvalidState` when the range partially selects a node
    /// that is not text.
    pub fn surround_contents(&mut self, id: RangeId, new_parent: NodeId) -> DomResult<()> {
        let (start, end) = self.positioned_bounds(id)?;
        if start.node != end.node {
            let start_text = self.node(start.node).is_text();
            let end_text = self.node(end.node).is_text();
            let start_parent = self.parent(start.node);
            let end_parent = self.parent(end.node);
            let siblings =
                start_text && end_text && start_parent.is_some() && start_parent == end_parent;
            let start_in_end = start_text && start_parent == Some(end.node);
            let end_in_start = end_text && end_parent == Some(start.node);
            if !(siblings || start_in_end || end_in_start) {
                return Err(DomError::InvalidState);
            }
        }
        if matches!(
            self.node(new_parent).data,
            NodeData::Document
                | NodeData::Doctype { .. }
                | NodeData::DocumentFragment
                | NodeData::Attribute(_)
        ) {
            return Err(DomError::InvalidNodeType);
        }

        let fragment = self.extract_contents(id)?;
        while let Some(child) = self.last_child(new_parent) {
            self.remove_child(new_parent, child)?;
        }
        self.insert_node(id, new_parent)?;
        self.append_child(new_parent, fragment)?;
        self.select_node(id, new_parent)
    }

    /// Shared walk for extraction and cloning: partially covered
    /// character data is split by copy, partially covered containers are
    /// copied shallow and filled recursively, and fully covered children of
    /// the common ancestor are moved or deep-copied
    fn cut_between(
        &mut self,
        start: BoundaryPoint,
        end: BoundaryPoint,
        action: ContentAction,
    ) -> DomResult<NodeId> {
        let fragment = self.create_document_fragment(start.node);
        if start == end {
            return Ok(fragment);
        }

        if start.node == end.node && self.node(start.node).is_character_data() {
            let copy = self.copy_character_data(start.node, start.offset, end.offset)?;
            self.append_child(fragment, copy)?;
            if action == ContentAction::Extract {
                self.replace_data(start.node, start.offset, end.offset - start.offset, "")?;
            }
            return Ok(fragment);
        }

        let common = self.common_ancestor(start.node, end.node).ok_or(DomError::WrongDocument)?;
        let first_partial = if self.is_inclusive_descendant_of(end.node, start.node) {
            None
        } else {
            Some(self.child_toward(common, start.node)?)
        };
        let last_partial = if self.is_inclusive_descendant_of(start.node, end.node) {
            None
        } else {
            Some(self.child_toward(common, end.node)?)
        };

        let first_contained = match first_partial {
            Some(node) => self.index_of(common, node).ok_or(DomError::InvalidState)? + 1,
            None => start.offset as usize,
        };
        let past_contained = match last_partial {
            Some(node) => self.index_of(common, node).ok_or(DomError::InvalidState)?,
            None => end.offset as usize,
        };
        let contained = self
            .children(common)
            .get(first_contained..past_contained)
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default();
        if contained.iter().any(|&c| self.node(c).is_doctype()) {
            return Err(DomError::HierarchyRequest);
        }

        if let Some(first) = first_partial {
            if self.node(first).is_character_data() {
                let length = self.length(first);
                let copy = self.copy_character_data(first, start.offset, length)?;
                self.append_child(fragment, copy)?;
                if action == ContentAction::Extract {
                    self.replace_data(first, start.offset, length - start.offset, "")?;
                }
            } else {
                let copy = self.clone_node(first, false)?;
                self.append_child(fragment, copy)?;
                let inner_end = BoundaryPoint::new(first, self.length(first));
                let inner = self.cut_between(start, inner_end, action)?;
                self.append_child(copy, inner)?;
            }
        }

        for child in contained {
            match action {
                ContentAction::Extract => {
                    // a listener may have moved it while earlier content left
                    if self.parent(child) != Some(common) {
                        return Err(DomError::InvalidState);
                    }
                    self.append_child(fragment, child)?;
                }
                ContentAction::Clone => {
                    let copy = self.clone_node(child, true)?;
                    self.append_child(fragment, copy)?;
                }
            }
        }

        if let Some(last) = last_partial {
            if self.node(last).is_character_data() {
                let copy = self.copy_character_data(last, 0, end.offset)?;
                self.append_child(fragment, copy)?;
                if action == ContentAction::Extract {
                    self.replace_data(last, 0, end.offset, "")?;
                }
            } else {
                let copy = self.clone_node(last, false)?;
                self.append_child(fragment, copy)?;
                let inner = self.cut_between(BoundaryPoint::new(last, 0), end, action)?;
                self.append_child(copy, inner)?;
            }
        }
        Ok(fragment)
    }

    /// Shallow copy of a character-data node holding `from..to` of its data
    fn copy_character_data(&mut self, node: NodeId, from: u32, to: u32) -> DomResult<NodeId> {
        let units = self
            .node(node)
            .character_data()
            .and_then(|data| data.units().get(from as usize..to as usize))
            .map(<[u16]>::to_vec)
            .ok_or(DomError::IndexSize)?;
        let copy = self.clone_node(node, false)?;
        if let Some(data) = self.node_mut(copy).character_data_mut() {
            data.units = units;
        }
        Ok(copy)
    }

    /// Child of `ancestor` on the path down to `node`
    fn child_toward(&self, ancestor: NodeId, node: NodeId) -> DomResult<NodeId> {
        self.ancestors(node)
            .find(|&n| self.parent(n) == Some(ancestor))
            .ok_or(DomError::InvalidState)
    }

    /// Whether `node` lies wholly between the two points
    fn is_contained(&self, node: NodeId, start: BoundaryPoint, end: BoundaryPoint) -> bool {
        self.compare_points(node, 0, start.node, start.offset) == Some(Ordering::Greater)
            && self.compare_points(node, self.length(node), end.node, end.offset)
                == Some(Ordering::Less)
    }

    /// Contained nodes whose parent is not contained, in tree order
    fn outermost_contained_nodes(
        &self,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<Vec<NodeId>> {
        let common = self.common_ancestor(start.node, end.node).ok_or(DomError::WrongDocument)?;
        let mut out = Vec::new();
        let mut current = self.next_node(common, common);
        while let Some(node) = current {
            if self.compare_points(node, 0, end.node, end.offset) != Some(Ordering::Less) {
                break;
            }
            if self.is_contained(node, start, end) {
                out.push(node);
                current = self.next_non_child_node(node, common);
            } else if self.compare_points(node, self.length(node), start.node, start.offset)
                != Some(Ordering::Greater)
            {
                current = self.next_non_child_node(node, common);
            } else {
                current = self.next_node(node, common);
            }
        }
        Ok(out)
    }

    /// The node the range collapses behind once content between the points
    /// is gone, or `None` when it collapses onto the start
    fn collapse_target(
        &self,
        start: BoundaryPoint,
        end: BoundaryPoint,
    ) -> DomResult<Option<NodeId>> {
        if self.is_inclusive_descendant_of(end.node, start.node) {
            return Ok(None);
        }
        let mut reference = start.node;
        while let Some(parent) = self.parent(reference) {
            if self.is_inclusive_descendant_of(end.node, parent) {
                return Ok(Some(reference));
            }
            reference = parent;
        }
        Err(DomError::WrongDocument)
    }

    fn collapse_after_cut(
        &mut self,
        id: RangeId,
        start: BoundaryPoint,
        after: Option<NodeId>,
    ) -> DomResult<()> {
        let point = match after {
            Some(node) => {
                let (parent, index) = self.slot_of(node).map_err(|_| DomError::InvalidState)?;
                BoundaryPoint::new(parent, index + 1)
            }
            None => start,
        };
        let may_span = self.range_ref(id)?.may_span_anonymous_subtrees;
        let root = self.valid_boundary_root(point.node, may_span);
        self.do_set_range(id, Some((point, point)), root);
        Ok(())
    }
}

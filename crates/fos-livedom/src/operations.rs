//! DOM Node Operations
//!
//! Core node manipulation: appendChild, insertBefore, replaceChild,
//! removeChild and normalize.
//!
//! Insertion hands control to listeners several times (removal hooks for
//! the replaced node, for the candidate's old parent, for fragment
//! children). Every check made before such a hand-off is repeated when
//! the [`MutationGuard`] shows that more happened than the operation did
//! itself.

use crate::error::{DomError, DomResult};
use crate::generation::MutationGuard;
use crate::observer::{CharacterDataChange, ChangeDetails};
use crate::{DomTree, NodeId};

/// Node operations trait
pub trait NodeOperations {
    /// Append a child node
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId>;

    /// Remove a child node
    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId>;

    /// Insert before a reference node (`None` appends)
    fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<NodeId>;

    /// Replace a child with another node, returning the replaced child
    fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> DomResult<NodeId>;

    /// Normalize text nodes (drop empty ones, merge adjacent)
    fn normalize(&mut self, node: NodeId) -> DomResult<()>;
}

impl NodeOperations for DomTree {
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.replace_or_insert_before(false, parent, child, None)?;
        Ok(child)
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        if !self.node(parent).is_container() {
            return Err(DomError::NotFound);
        }
        if self.parent(child) == Some(parent) {
            self.fire_node_will_be_removed(child, parent);
        }
        let index = self.index_of(parent, child).ok_or(DomError::NotFound)?;
        self.remove_child_at(parent, index);
        Ok(child)
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<NodeId> {
        self.replace_or_insert_before(false, parent, new_child, ref_child)?;
        Ok(new_child)
    }

    fn replace_child(
        &mut self,
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    ) -> DomResult<NodeId> {
        self.replace_or_insert_before(true, parent, new_child, Some(old_child))?;
        Ok(old_child)
    }

    fn normalize(&mut self, node: NodeId) -> DomResult<()> {
        // Collect the text nodes that go away: empty ones and every text
        // node that directly follows another text node
        let mut doomed = Vec::new();
        let mut can_merge = false;
        let mut current = self.first_child(node);
        while let Some(n) = current {
            if self.node(n).is_text() {
                if can_merge || self.length(n) == 0 {
                    doomed.push(n);
                } else {
                    can_merge = true;
                }
                can_merge = can_merge && self.next_sibling(n).is_some();
            } else {
                can_merge = false;
            }
            current = self.next_node(n, node);
        }

        if doomed.is_empty() {
            return Ok(());
        }

        for &n in &doomed {
            if let Some(parent) = self.parent(n) {
                self.fire_node_will_be_removed(n, parent);
            }
        }

        let mut merged = 0usize;
        for &n in &doomed {
            // Listeners may have moved things around; merge only into a
            // text node that still directly precedes this one
            if self.length(n) > 0 {
                if let Some(target) = self.previous_sibling(n).filter(|&p| self.node(p).is_text()) {
                    self.append_text_for_normalize(target, n);
                    merged += 1;
                }
            }
            if let Some(parent) = self.parent(n) {
                if let Some(index) = self.index_of(parent, n) {
                    self.remove_child_at(parent, index);
                }
            }
        }
        tracing::debug!(?node, removed = doomed.len(), merged, "normalized");
        Ok(())
    }
}

impl DomTree {
    /// Shared body of insert_before, append_child and replace_child
    fn replace_or_insert_before(
        &mut self,
        replace: bool,
        parent: NodeId,
        new_child: NodeId,
        ref_child: Option<NodeId>,
    ) -> DomResult<()> {
        if replace && ref_child.is_none() {
            return Err(DomError::NotFound);
        }
        if !self.node(parent).is_container() || !self.node(new_child).is_content() {
            return Err(DomError::HierarchyRequest);
        }
        let is_fragment = self.node(new_child).is_fragment();

        // Step 1: the reference child must be ours before anything runs
        if let Some(r) = ref_child {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotFound);
            }
        }

        // Removal hooks; listeners may mutate the tree from here on
        if let Some(r) = ref_child.filter(|&r| replace && r != new_child) {
            self.fire_node_will_be_removed(r, parent);
        }
        if let Some(old_parent) = self.parent(new_child) {
            self.fire_node_will_be_removed(new_child, old_parent);
        }
        if is_fragment {
            for child in self.children(new_child).to_vec() {
                self.fire_node_will_be_removed(child, new_child);
            }
        }

        // Step 2: recheck after the hooks
        if let Some(r) = ref_child {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotFound);
            }
        }

        // Step 3
        if self.is_root_of_anonymous_subtree(new_child) {
            return Err(DomError::NotSupported);
        }

        // Step 4
        if !self.is_allowed_as_child(new_child, parent, replace, ref_child) {
            return Err(DomError::HierarchyRequest);
        }

        let mut insert_before = if replace {
            ref_child.and_then(|r| self.next_sibling(r))
        } else {
            ref_child
        };
        if insert_before == Some(new_child) {
            insert_before = self.next_sibling(new_child);
        }

        // Step 5: detach the candidate, or empty the fragment
        let mut fragment_children = Vec::new();
        if let Some(old_parent) = self.parent(new_child) {
            let Some(remove_index) = self.index_of(old_parent, new_child) else {
                // Anonymous content that escaped the flag check
                return Err(DomError::NotSupported);
            };

            let guard = MutationGuard::new(self);
            self.remove_child_at(old_parent, remove_index);

            if guard.mutated(self, 1) {
                tracing::warn!(?parent, ?new_child, "tree changed during removal, revalidating");
                if insert_before.is_some_and(|b| self.parent(b) != Some(parent)) {
                    return Err(DomError::HierarchyRequest);
                }
                if self.parent(new_child).is_some() {
                    return Err(DomError::HierarchyRequest);
                }
                if ref_child == Some(new_child) {
                    // Replacing or inserting before itself; the recorded
                    // successor is the only anchor left
                    if !self.is_allowed_as_child(new_child, parent, false, insert_before) {
                        return Err(DomError::HierarchyRequest);
                    }
                } else {
                    if ref_child.is_some_and(|r| self.parent(r) != Some(parent))
                        || !self.is_allowed_as_child(new_child, parent, replace, ref_child)
                    {
                        return Err(DomError::HierarchyRequest);
                    }
                    insert_before = if replace {
                        ref_child.and_then(|r| self.next_sibling(r))
                    } else {
                        ref_child
                    };
                }
            }
        } else if is_fragment {
            fragment_children = self.children(new_child).to_vec();
            let count = fragment_children.len();

            let guard = MutationGuard::new(self);
            for index in (0..count).rev() {
                if index < self.child_count(new_child) {
                    self.remove_child_at(new_child, index);
                }
            }

            if guard.mutated(self, count as u64) {
                tracing::warn!(
                    ?parent,
                    fragment = ?new_child,
                    "tree changed while emptying fragment, revalidating"
                );
                if insert_before.is_some_and(|b| self.parent(b) != Some(parent)) {
                    return Err(DomError::HierarchyRequest);
                }
                if fragment_children.iter().any(|&c| self.parent(c).is_some()) {
                    return Err(DomError::HierarchyRequest);
                }
                if ref_child.is_some_and(|r| self.parent(r) != Some(parent)) {
                    return Err(DomError::HierarchyRequest);
                }
                insert_before = if replace {
                    ref_child.and_then(|r| self.next_sibling(r))
                } else {
                    ref_child
                };
                if self.node(parent).is_document()
                    && !self.fragment_children_allowed(
                        &fragment_children,
                        parent,
                        replace,
                        ref_child,
                    )
                {
                    return Err(DomError::HierarchyRequest);
                }
            }
        }

        // Step 6: take out the replaced child
        if let Some(old) = ref_child.filter(|&r| replace && r != new_child) {
            if let Some(index) = self.index_of(parent, old) {
                self.remove_child_at(parent, index);
            }
        }

        // Positions are re-derived from the anchor node, never reused
        let insert_index = match insert_before {
            Some(before) => self.index_of(parent, before).ok_or(DomError::NotFound)?,
            None => self.child_count(parent),
        };

        // Steps 7-9: adoption happens per node inside insert_child_at
        if is_fragment {
            let doc = self.owner_document(parent);
            if self.owner_document(new_child) != doc {
                self.adopt_subtree(new_child, doc);
            }
            let Some(&first) = fragment_children.first() else {
                return Ok(());
            };

            let appending =
                !self.node(parent).is_document() && insert_index == self.child_count(parent);
            for (offset, &child) in fragment_children.iter().enumerate() {
                let index = insert_index + offset;
                if let Err(err) = self.insert_child_at(parent, child, index, !appending) {
                    if appending && offset > 0 {
                        self.notify_child_appended(parent, first, insert_index);
                    }
                    return Err(err);
                }
            }
            if appending {
                self.notify_child_appended(parent, first, insert_index);
            }
            tracing::debug!(
                ?parent,
                count = fragment_children.len(),
                index = insert_index,
                "fragment inserted"
            );
        } else {
            self.insert_child_at(parent, new_child, insert_index, true)?;
        }
        Ok(())
    }

    /// Put a parentless node into `parent`'s child list
    pub(crate) fn insert_child_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
        notify: bool,
    ) -> DomResult<()> {
        debug_assert!(self.parent(child).is_none(), "inserting an attached node");
        let count = self.child_count(parent);
        if index > count {
            return Err(DomError::IndexSize);
        }
        self.node_mut(parent).children.try_reserve(1)?;

        let doc = self.owner_document(parent);
        if self.owner_document(child) != doc {
            self.adopt_subtree(child, doc);
        }

        self.bump_generation();
        let p = self.node_mut(parent);
        p.children.insert(index, child);
        if index == 0 {
            p.first_child = Some(child);
        }
        let binding_parent = p.binding_parent;
        let prev = index.checked_sub(1).and_then(|i| p.children.get(i).copied());
        let next = p.children.get(index + 1).copied();
        self.link_siblings(prev, Some(child));
        self.link_siblings(Some(child), next);
        self.node_mut(child).parent = Some(parent);
        self.set_subtree_binding_parent(child, binding_parent);

        self.root_gained_parent(child);

        if notify {
            if !self.node(parent).is_document() && index == count {
                self.notify_child_appended(parent, child, index);
            } else {
                self.notify_child_inserted(parent, child, index);
            }
        }
        tracing::debug!(?parent, ?child, index, "child inserted");
        Ok(())
    }

    fn link_siblings(&mut self, prev: Option<NodeId>, next: Option<NodeId>) {
        if let Some(p) = prev {
            self.node_mut(p).next_sibling = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev_sibling = prev;
        }
    }

    /// Remove the child at `index`, notify, then detach it
    pub(crate) fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Option<NodeId> {
        let child = self.child_at(parent, index)?;
        let previous = self.node(child).prev_sibling;
        let next = self.node(child).next_sibling;

        self.bump_generation();
        let p = self.node_mut(parent);
        p.children.remove(index);
        if index == 0 {
            p.first_child = p.children.first().copied();
        }
        self.link_siblings(previous, next);
        let c = self.node_mut(child);
        c.prev_sibling = None;
        c.next_sibling = None;

        self.notify_child_removed(parent, child, index, previous);

        self.node_mut(child).parent = None;
        self.set_subtree_binding_parent(child, None);
        tracing::debug!(?parent, ?child, index, "child removed");

        self.fire_node_unbound(child);
        Some(child)
    }

    /// Append `absorbed`'s text to `target` as a merge edit
    fn append_text_for_normalize(&mut self, target: NodeId, absorbed: NodeId) {
        let Some(units) = self.node(absorbed).character_data().map(|t| t.units.clone()) else {
            return;
        };
        let Some(data) = self.node_mut(target).character_data_mut() else {
            return;
        };
        let old_len = data.len();
        data.units.extend_from_slice(&units);
        let change = CharacterDataChange {
            change_start: old_len,
            change_end: old_len,
            replace_length: units.len() as u32,
            details: Some(ChangeDetails::Merge { absorbed }),
        };
        self.notify_character_data_changed(target, &change);
    }
}

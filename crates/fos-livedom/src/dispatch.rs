//! Notification Dispatch
//!
//! Routes mutation notifications to the live ranges observing the
//! affected subtree first, then to registered listeners in registration
//! order.

use std::cell::RefCell;
use std::rc::Rc;

use crate::observer::{CharacterDataChange, MutationListener};
use crate::range::RangeId;
use crate::{DomTree, NodeId};

/// Listener handle as stored by the tree
pub type SharedListener = Rc<RefCell<dyn MutationListener>>;

/// Registration handle returned by [`DomTree::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

impl DomTree {
    /// Register a listener for every mutation in this tree
    pub fn add_listener(&mut self, listener: SharedListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Unregister a listener; returns false if it was not registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }

    fn listener_snapshot(&self) -> Vec<SharedListener> {
        self.listeners.iter().map(|(_, l)| Rc::clone(l)).collect()
    }

    /// Ranges subscribed on any inclusive ancestor of `container`
    fn ranges_observing(&self, container: NodeId) -> Vec<RangeId> {
        let mut out = Vec::new();
        for node in self.ancestors(container) {
            if let Some(ranges) = self.subscriptions.get(&node) {
                out.extend_from_slice(ranges);
            }
        }
        out
    }

    // --- Removal hooks (may mutate the tree) ---

    pub(crate) fn fire_node_will_be_removed(&mut self, child: NodeId, parent: NodeId) {
        if !self.config.fire_removal_callbacks {
            return;
        }
        for listener in self.listener_snapshot() {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                continue;
            };
            listener.node_will_be_removed(self, child, parent);
        }
    }

    pub(crate) fn fire_node_unbound(&mut self, node: NodeId) {
        if !self.config.fire_removal_callbacks {
            return;
        }
        for listener in self.listener_snapshot() {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                continue;
            };
            listener.node_unbound(self, node);
        }
    }

    // --- Structural notifications ---

    pub(crate) fn notify_character_data_changed(
        &mut self,
        node: NodeId,
        change: &CharacterDataChange,
    ) {
        tracing::trace!(?node, ?change, "character data changed");
        for range in self.ranges_observing(node) {
            self.range_character_data_changed(range, node, change);
        }
        for listener in self.listener_snapshot() {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                continue;
            };
            listener.character_data_changed(self, node, change);
        }
    }

    pub(crate) fn notify_child_inserted(&mut self, parent: NodeId, child: NodeId, index: usize) {
        tracing::trace!(?parent, ?child, index, "child inserted");
        for range in self.ranges_observing(parent) {
            self.range_child_inserted(range, parent, child, index);
        }
        for listener in self.listener_snapshot() {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                continue;
            };
            listener.child_inserted(self, parent, child, index);
        }
    }

    pub(crate) fn notify_child_appended(
        &mut self,
        parent: NodeId,
        first_new: NodeId,
        index: usize,
    ) {
        tracing::trace!(?parent, ?first_new, index, "children appended");
        for range in self.ranges_observing(parent) {
            self.range_child_appended(range, parent, index);
        }
        for listener in self.listener_snapshot() {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                continue;
            };
            listener.child_appended(self, parent, first_new, index);
        }
    }

    pub(crate) fn notify_child_removed(
        &mut self,
        parent: NodeId,
        child: NodeId,
        index: usize,
        previous_sibling: Option<NodeId>,
    ) {
        tracing::trace!(?parent, ?child, index, "child removed");
        for range in self.ranges_observing(parent) {
            self.range_child_removed(range, parent, child, index);
        }
        for listener in self.listener_snapshot() {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                continue;
            };
            listener.child_removed(self, parent, child, index, previous_sibling);
        }
    }
}

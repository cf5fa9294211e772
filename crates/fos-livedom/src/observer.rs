//! DOM Observers
//!
//! Listener hooks fired by the mutation engine, plus [`MutationRecorder`],
//! a listener that queues mutation records for later inspection.

use crate::{DomTree, NodeId};

/// Extra information for edits that split or merge text nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDetails {
    /// Tail of the node moved into a new following sibling
    Split { new_sibling: NodeId },
    /// Another node's text was appended to this one
    Merge { absorbed: NodeId },
}

/// Description of a character-data edit: code units
/// `change_start..change_end` were replaced by `replace_length` new ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterDataChange {
    pub change_start: u32,
    pub change_end: u32,
    pub replace_length: u32,
    pub details: Option<ChangeDetails>,
}

/// Callbacks fired around tree mutations
///
/// The removal hooks run before and after a node leaves the tree and may
/// mutate it. The remaining notifications describe a finished change and
/// get a read-only view. A listener that is already running is skipped
/// for any notification its own mutations trigger.
pub trait MutationListener {
    /// `child` is about to leave `parent`
    fn node_will_be_removed(&mut self, _tree: &mut DomTree, _child: NodeId, _parent: NodeId) {}

    /// `node` was detached from its parent
    fn node_unbound(&mut self, _tree: &mut DomTree, _node: NodeId) {}

    fn character_data_changed(
        &mut self,
        _tree: &DomTree,
        _node: NodeId,
        _change: &CharacterDataChange,
    ) {
    }

    fn child_inserted(&mut self, _tree: &DomTree, _parent: NodeId, _child: NodeId, _index: usize) {}

    /// One or more children were appended, starting with `first_new` at `index`
    fn child_appended(
        &mut self,
        _tree: &DomTree,
        _parent: NodeId,
        _first_new: NodeId,
        _index: usize,
    ) {
    }

    fn child_removed(
        &mut self,
        _tree: &DomTree,
        _parent: NodeId,
        _child: NodeId,
        _index: usize,
        _previous_sibling: Option<NodeId>,
    ) {
    }
}

/// Recorder options
#[derive(Debug, Clone, Default)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub character_data: bool,
    pub subtree: bool,
}

/// Mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    /// Child-list index of the first affected child
    pub index: usize,
    pub change: Option<CharacterDataChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    CharacterData,
    ChildInserted,
    ChildAppended,
    ChildRemoved,
}

/// Listener that queues records for observed nodes
///
/// Each observed target keeps its own options; observing a target again
/// replaces that target's options only.
#[derive(Debug, Default)]
pub struct MutationRecorder {
    observed: Vec<(NodeId, MutationObserverInit)>,
    records: Vec<MutationRecord>,
}

impl MutationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, target: NodeId, options: MutationObserverInit) {
        match self.observed.iter_mut().find(|(node, _)| *node == target) {
            Some((_, existing)) => *existing = options,
            None => self.observed.push((target, options)),
        }
    }

    pub fn disconnect(&mut self) {
        self.observed.clear();
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Whether any observation covering `target` asks for `kind`
    fn watches(
        &self,
        tree: &DomTree,
        target: NodeId,
        kind: impl Fn(&MutationObserverInit) -> bool,
    ) -> bool {
        self.observed.iter().any(|(observed, options)| {
            kind(options)
                && (*observed == target
                    || (options.subtree && tree.is_inclusive_descendant_of(target, *observed)))
        })
    }

    fn push_child_list(
        &mut self,
        tree: &DomTree,
        mutation_type: MutationType,
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
        index: usize,
    ) {
        if !self.watches(tree, target, |o| o.child_list) {
            return;
        }
        let previous_sibling = index.checked_sub(1).and_then(|i| tree.child_at(target, i));
        self.records.push(MutationRecord {
            mutation_type,
            target,
            added_nodes: added,
            removed_nodes: removed,
            previous_sibling,
            index,
            change: None,
        });
    }
}

impl MutationListener for MutationRecorder {
    fn character_data_changed(
        &mut self,
        tree: &DomTree,
        node: NodeId,
        change: &CharacterDataChange,
    ) {
        if !self.watches(tree, node, |o| o.character_data) {
            return;
        }
        self.records.push(MutationRecord {
            mutation_type: MutationType::CharacterData,
            target: node,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            index: change.change_start as usize,
            change: Some(*change),
        });
    }

    fn child_inserted(&mut self, tree: &DomTree, parent: NodeId, child: NodeId, index: usize) {
        let added = vec![child];
        self.push_child_list(tree, MutationType::ChildInserted, parent, added, Vec::new(), index);
    }

    fn child_appended(&mut self, tree: &DomTree, parent: NodeId, _first_new: NodeId, index: usize) {
        let added = tree.children(parent).get(index..).map(<[NodeId]>::to_vec).unwrap_or_default();
        self.push_child_list(tree, MutationType::ChildAppended, parent, added, Vec::new(), index);
    }

    fn child_removed(
        &mut self,
        tree: &DomTree,
        parent: NodeId,
        child: NodeId,
        index: usize,
        _previous_sibling: Option<NodeId>,
    ) {
        let removed = vec![child];
        self.push_child_list(tree, MutationType::ChildRemoved, parent, Vec::new(), removed, index);
    }
}

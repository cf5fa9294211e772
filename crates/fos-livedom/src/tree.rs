//! DOM Tree (arena-based allocation)
//!
//! Owns every node, every live range and the listener list. Nodes are
//! never freed: a detached node keeps its slot and can be reinserted.
//! `NodeId`s are only meaningful for the tree that issued them.

use std::collections::HashMap;
use std::fmt;

use crate::arena::GenArena;
use crate::config::TreeConfig;
use crate::dispatch::{ListenerId, SharedListener};
use crate::error::{DomError, DomResult};
use crate::generation::Generation;
use crate::node::{AttrData, ElementData, Node, NodeData, NodeFlags, NodeType, TextData};
use crate::range::{Range, RangeId};
use crate::NodeId;

/// Arena-based DOM tree
#[derive(Default)]
pub struct DomTree {
    nodes: Vec<Node>,
    pub(crate) ranges: GenArena<Range>,
    /// Ranges keyed by the root node they observe
    pub(crate) subscriptions: HashMap<NodeId, Vec<RangeId>>,
    pub(crate) listeners: Vec<(ListenerId, SharedListener)>,
    pub(crate) next_listener: u32,
    pub(crate) generation: Generation,
    pub(crate) config: TreeConfig,
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create a tree with explicit configuration
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            ranges: GenArena::new(),
            subscriptions: HashMap::new(),
            listeners: Vec::new(),
            next_listener: 0,
            generation: Generation::INITIAL,
            config,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Number of nodes ever created
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    fn push_node(&mut self, data: NodeData, owner_document: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data, owner_document));
        tracing::trace!(?id, "node created");
        id
    }

    // --- Creation ---

    /// Create a new document; it owns itself
    pub fn create_document(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.push_node(NodeData::Document, id)
    }

    /// Create an element owned by `doc`'s document
    pub fn create_element(&mut self, doc: NodeId, name: &str) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(NodeData::Element(ElementData::new(name)), owner)
    }

    pub fn create_text(&mut self, doc: NodeId, content: &str) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(NodeData::Text(TextData::new(content)), owner)
    }

    pub fn create_comment(&mut self, doc: NodeId, content: &str) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(NodeData::Comment(TextData::new(content)), owner)
    }

    pub fn create_processing_instruction(
        &mut self,
        doc: NodeId,
        target: &str,
        data: &str,
    ) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(
            NodeData::ProcessingInstruction {
                target: target.to_string(),
                data: TextData::new(data),
            },
            owner,
        )
    }

    pub fn create_doctype(
        &mut self,
        doc: NodeId,
        name: &str,
        public_id: &str,
        system_id: &str,
    ) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(
            NodeData::Doctype {
                name: name.to_string(),
                public_id: public_id.to_string(),
                system_id: system_id.to_string(),
            },
            owner,
        )
    }

    pub fn create_document_fragment(&mut self, doc: NodeId) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(NodeData::DocumentFragment, owner)
    }

    /// Create a detached attribute node
    pub fn create_attribute(&mut self, doc: NodeId, name: &str, value: &str) -> NodeId {
        let owner = self.owner_document(doc);
        self.push_node(
            NodeData::Attribute(AttrData {
                name: name.to_string(),
                value: value.to_string(),
                owner: None,
            }),
            owner,
        )
    }

    /// Copy a node and its attributes, plus its descendants when `deep`
    ///
    /// The copy is detached and shares the original's owner document;
    /// anonymous content stays behind.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> DomResult<NodeId> {
        let data = match &self.node(node).data {
            NodeData::Document => NodeData::Document,
            NodeData::DocumentFragment => NodeData::DocumentFragment,
            NodeData::Doctype { name, public_id, system_id } => NodeData::Doctype {
                name: name.clone(),
                public_id: public_id.clone(),
                system_id: system_id.clone(),
            },
            NodeData::Element(element) => NodeData::Element(ElementData::new(element.name.clone())),
            NodeData::Text(text) => NodeData::Text(text.clone()),
            NodeData::Comment(text) => NodeData::Comment(text.clone()),
            NodeData::ProcessingInstruction { target, data } => NodeData::ProcessingInstruction {
                target: target.clone(),
                data: data.clone(),
            },
            NodeData::Attribute(attr) => NodeData::Attribute(AttrData {
                name: attr.name.clone(),
                value: attr.value.clone(),
                owner: None,
            }),
        };
        let copy = if matches!(data, NodeData::Document) {
            let id = NodeId(self.nodes.len() as u32);
            self.push_node(data, id)
        } else {
            let owner = self.owner_document(node);
            self.push_node(data, owner)
        };

        let attributes = self
            .node(node)
            .as_element()
            .map(|e| e.attributes.clone())
            .unwrap_or_default();
        for attr in attributes {
            let attr_copy = self.clone_node(attr, false)?;
            self.set_attribute_node(copy, attr_copy)?;
        }
        if deep {
            let children = self.node(node).children.clone();
            for (index, child) in children.into_iter().enumerate() {
                let child_copy = self.clone_node(child, true)?;
                self.insert_child_at(copy, child_copy, index, false)?;
            }
        }
        tracing::trace!(?node, ?copy, deep, "node cloned");
        Ok(copy)
    }

    /// Attach an attribute node to an element, returning the attribute it replaced
    pub fn set_attribute_node(
        &mut self,
        element: NodeId,
        attr: NodeId,
    ) -> DomResult<Option<NodeId>> {
        let name = match &self.node(attr).data {
            NodeData::Attribute(a) if a.owner.is_none() || a.owner == Some(element) => {
                a.name.clone()
            }
            NodeData::Attribute(_) => return Err(DomError::InvalidState),
            _ => return Err(DomError::InvalidNodeType),
        };
        if !self.node(element).is_element() {
            return Err(DomError::InvalidNodeType);
        }

        let doc = self.node(element).owner_document;
        self.node_mut(attr).owner_document = doc;

        let existing = self.node(element).as_element().and_then(|e| {
            e.attributes.iter().copied().find(|&a| {
                self.node(a).as_attribute().is_some_and(|data| data.name == name)
            })
        });
        if existing == Some(attr) {
            return Ok(None);
        }
        if let Some(old) = existing {
            if let NodeData::Attribute(data) = &mut self.node_mut(old).data {
                data.owner = None;
            }
        }
        if let Some(data) = self.node_mut(element).as_element_mut() {
            match existing {
                Some(old) => {
                    if let Some(slot) = data.attributes.iter_mut().find(|a| **a == old) {
                        *slot = attr;
                    }
                }
                None => data.attributes.push(attr),
            }
        }
        if let NodeData::Attribute(data) = &mut self.node_mut(attr).data {
            data.owner = Some(element);
        }
        Ok(existing)
    }

    /// Value of the named attribute on an element
    pub fn get_attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        let data = self.node(element).as_element()?;
        data.attributes
            .iter()
            .filter_map(|&a| self.node(a).as_attribute())
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    // --- Navigation ---

    pub fn node_type(&self, node: NodeId) -> NodeType {
        self.node(node).node_type()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.node(node).children.len()
    }

    pub fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.node(node).children.get(index).copied()
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).first_child
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).children.last().copied()
    }

    /// Index of `child` in `parent`'s child list; `None` for anonymous
    /// content and attributes, which have a parent but no slot
    pub fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        if self.node(child).parent != Some(parent) {
            return None;
        }
        self.node(parent).children.iter().position(|&c| c == child)
    }

    /// Index of a node within its own parent
    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        self.index_of(self.parent(node)?, node)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).prev_sibling
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).next_sibling
    }

    /// Inclusive ancestor chain, starting at `node`
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors { tree: self, next: Some(node) }
    }

    pub fn is_inclusive_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(node).any(|n| n == ancestor)
    }

    /// Topmost inclusive ancestor
    pub fn root_of(&self, node: NodeId) -> NodeId {
        self.ancestors(node).last().unwrap_or(node)
    }

    pub fn owner_document(&self, node: NodeId) -> NodeId {
        self.node(node).owner_document
    }

    /// Whether the node's root is a document
    pub fn is_in_document(&self, node: NodeId) -> bool {
        self.node(self.root_of(node)).is_document()
    }

    /// DOM length of a node
    pub fn length(&self, node: NodeId) -> u32 {
        self.node(node).length()
    }

    /// Next node in pre-order, confined to the subtree rooted at `within`
    pub fn next_node(&self, node: NodeId, within: NodeId) -> Option<NodeId> {
        if let Some(first) = self.first_child(node) {
            return Some(first);
        }
        self.next_non_child_node(node, within)
    }

    /// Next node in pre-order that is not a descendant of `node`
    pub fn next_non_child_node(&self, node: NodeId, within: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            if current == within {
                return None;
            }
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.parent(current)?;
        }
    }

    // --- Anonymous content ---

    pub fn binding_parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).binding_parent
    }

    pub fn set_binding_parent(&mut self, node: NodeId, binding_parent: Option<NodeId>) {
        self.node_mut(node).binding_parent = binding_parent;
    }

    pub fn mark_anonymous_root(&mut self, node: NodeId) {
        self.node_mut(node).flags.insert(NodeFlags::ANONYMOUS_ROOT);
    }

    pub fn is_root_of_anonymous_subtree(&self, node: NodeId) -> bool {
        self.node(node).flags.contains(NodeFlags::ANONYMOUS_ROOT)
    }

    /// Hang an anonymous subtree off `host`. The root gets `host` as its
    /// parent without taking a slot in the child list.
    pub fn attach_anonymous_content(&mut self, host: NodeId, root: NodeId) -> DomResult<()> {
        let root_node = self.node(root);
        if !self.node(host).is_element() || !root_node.is_content() || root_node.is_fragment() {
            return Err(DomError::HierarchyRequest);
        }
        if self.parent(root).is_some() || self.is_inclusive_descendant_of(host, root) {
            return Err(DomError::HierarchyRequest);
        }
        let doc = self.owner_document(host);
        if self.owner_document(root) != doc {
            self.adopt_subtree(root, doc);
        }
        self.mark_anonymous_root(root);
        self.node_mut(root).parent = Some(host);
        self.set_subtree_binding_parent(root, Some(host));
        self.root_gained_parent(root);
        tracing::debug!(?host, ?root, "anonymous content attached");
        Ok(())
    }

    /// Ranges rooted at `node` now belong to a bigger tree
    pub(crate) fn root_gained_parent(&mut self, node: NodeId) {
        if let Some(ranges) = self.subscriptions.get(&node).cloned() {
            for range in ranges {
                self.range_parent_chain_changed(range);
            }
        }
    }

    pub(crate) fn set_subtree_binding_parent(
        &mut self,
        root: NodeId,
        binding_parent: Option<NodeId>,
    ) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            self.node_mut(node).binding_parent = binding_parent;
            stack.extend_from_slice(&self.node(node).children);
        }
    }

    // --- Invariants ---

    /// Verify the structural invariants of every node
    ///
    /// Each listed child points back at its parent and appears in exactly
    /// one child list. The first-child cache and the sibling links agree
    /// with the list. A node whose parent does not list it is an anonymous
    /// root or an attribute, and has no siblings.
    pub fn check_tree_invariants(&self) -> bool {
        let mut listed = vec![0u32; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            if node.first_child != node.children.first().copied() {
                tracing::warn!(?id, "first child cache out of date");
                return false;
            }
            let mut prev = None;
            for (pos, &child) in node.children.iter().enumerate() {
                listed[child.index()] += 1;
                let entry = self.node(child);
                if entry.prev_sibling != prev
                    || entry.next_sibling != node.children.get(pos + 1).copied()
                {
                    tracing::warn!(?id, ?child, "sibling links out of date");
                    return false;
                }
                prev = Some(child);
                if self.node(child).parent != Some(id) {
                    tracing::warn!(?id, ?child, "child does not point back at parent");
                    return false;
                }
                if !self.node(child).is_content() {
                    tracing::warn!(?id, ?child, "non-content node in child list");
                    return false;
                }
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i as u32);
            match (node.parent, listed[i]) {
                (_, n) if n > 1 => {
                    tracing::warn!(?id, count = n, "node listed more than once");
                    return false;
                }
                (Some(_), 0) if !node.flags.contains(NodeFlags::ANONYMOUS_ROOT) => {
                    tracing::warn!(?id, "parent link without child slot");
                    return false;
                }
                (None, 1) => {
                    tracing::warn!(?id, "listed child without parent link");
                    return false;
                }
                (_, 0) if node.prev_sibling.is_some() || node.next_sibling.is_some() => {
                    tracing::warn!(?id, "unlisted node keeps sibling links");
                    return false;
                }
                _ => {}
            }
        }
        true
    }
}

impl fmt::Debug for DomTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomTree")
            .field("nodes", &self.nodes.len())
            .field("ranges", &self.ranges.len())
            .field("listeners", &self.listeners.len())
            .field("generation", &self.generation)
            .field("config", &self.config)
            .finish()
    }
}

/// Iterator over a node and its ancestors
pub struct Ancestors<'a> {
    tree: &'a DomTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

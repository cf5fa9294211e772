//! DOM Node
//!
//! Arena slot layout for a single node:
//! - Parent and sibling links for O(1) navigation, plus the ordered
//!   child vector that answers index and offset queries
//! - Owner document and anonymous-content binding parent
//! - Flag bits used by the selection ancestor index
//! - Kind-specific payload in [`NodeData`]

use bitflags::bitflags;

use crate::NodeId;
use crate::range::RangeId;

bitflags! {
    /// Per-node flag bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        /// Root of an anonymous subtree; never a legal insertion candidate
        const ANONYMOUS_ROOT = 1 << 0;
        /// Closest common ancestor of at least one in-selection range
        const COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION = 1 << 1;
        /// Strict descendant of a registered common ancestor
        const DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION = 1 << 2;
    }
}

/// Ranges registered on a common-ancestor node
pub type RangeSet = Vec<RangeId>;

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    /// Previous sibling
    pub(crate) prev_sibling: Option<NodeId>,
    /// Next sibling
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) owner_document: NodeId,
    pub(crate) binding_parent: Option<NodeId>,
    pub(crate) flags: NodeFlags,
    /// Side table, present only while the node is a registered common ancestor
    pub(crate) ranges: Option<Box<RangeSet>>,
    /// Node-specific data
    pub data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData, owner_document: NodeId) -> Self {
        Self {
            parent: None,
            first_child: None,
            prev_sibling: None,
            next_sibling: None,
            children: Vec::new(),
            owner_document,
            binding_parent: None,
            flags: NodeFlags::empty(),
            ranges: None,
            data,
        }
    }

    /// DOM node type
    #[inline]
    pub fn node_type(&self) -> NodeType {
        match &self.data {
            NodeData::Document => NodeType::Document,
            NodeData::DocumentFragment => NodeType::DocumentFragment,
            NodeData::Doctype { .. } => NodeType::DocumentType,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::ProcessingInstruction { .. } => NodeType::ProcessingInstruction,
            NodeData::Attribute(_) => NodeType::Attribute,
        }
    }

    // --- Getters ---

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.prev_sibling
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn owner_document(&self) -> NodeId {
        self.owner_document
    }

    pub fn binding_parent(&self) -> Option<NodeId> {
        self.binding_parent
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    // --- Kind checks ---

    #[inline]
    pub fn is_document(&self) -> bool {
        matches!(self.data, NodeData::Document)
    }

    #[inline]
    pub fn is_fragment(&self) -> bool {
        matches!(self.data, NodeData::DocumentFragment)
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    #[inline]
    pub fn is_doctype(&self) -> bool {
        matches!(self.data, NodeData::Doctype { .. })
    }

    #[inline]
    pub fn is_attribute(&self) -> bool {
        matches!(self.data, NodeData::Attribute(_))
    }

    /// Text, comment or processing instruction
    #[inline]
    pub fn is_character_data(&self) -> bool {
        self.character_data().is_some()
    }

    /// Document, fragment or element: the only kinds that accept children
    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(
            self.data,
            NodeData::Document | NodeData::DocumentFragment | NodeData::Element(_)
        )
    }

    /// Anything that may sit inside a child list (documents and attributes may not)
    #[inline]
    pub fn is_content(&self) -> bool {
        !matches!(self.data, NodeData::Document | NodeData::Attribute(_))
    }

    // --- Selection flags ---

    pub fn is_common_ancestor_for_range_in_selection(&self) -> bool {
        self.flags.contains(NodeFlags::COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION)
    }

    pub fn is_descendant_of_common_ancestor_for_range_in_selection(&self) -> bool {
        self.flags.contains(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION)
    }

    /// Either selection flag is set
    pub fn is_selection_descendant(&self) -> bool {
        self.flags.intersects(
            NodeFlags::COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION
                | NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION,
        )
    }

    // --- Payload accessors ---

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_attribute(&self) -> Option<&AttrData> {
        match &self.data {
            NodeData::Attribute(a) => Some(a),
            _ => None,
        }
    }

    /// Character payload of text, comment and processing-instruction nodes
    #[inline]
    pub fn character_data(&self) -> Option<&TextData> {
        match &self.data {
            NodeData::Text(t) | NodeData::Comment(t) => Some(t),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn character_data_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.data {
            NodeData::Text(t) | NodeData::Comment(t) => Some(t),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    /// DOM length: code units for character data, 0 for doctypes and
    /// attributes, child count otherwise
    pub fn length(&self) -> u32 {
        match &self.data {
            NodeData::Doctype { .. } | NodeData::Attribute(_) => 0,
            _ => match self.character_data() {
                Some(text) => text.len(),
                None => self.children.len() as u32,
            },
        }
    }
}

/// DOM node types, numbered as in the DOM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Attribute = 2,
    Text = 3,
    ProcessingInstruction = 7,
    Comment = 8,
    Document = 9,
    DocumentType = 10,
    DocumentFragment = 11,
}

impl NodeType {
    #[inline]
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    /// Document root
    Document,
    /// Parentless container whose children move on insertion
    DocumentFragment,
    /// DOCTYPE
    Doctype {
        name: String,
        public_id: String,
        system_id: String,
    },
    /// Element
    Element(ElementData),
    /// Text content
    Text(TextData),
    /// Comment
    Comment(TextData),
    /// Processing instruction
    ProcessingInstruction {
        target: String,
        data: TextData,
    },
    /// Attribute node, never part of a child list
    Attribute(AttrData),
}

/// Element-specific data
#[derive(Debug)]
pub struct ElementData {
    /// Tag name
    pub name: String,
    /// Attribute nodes in insertion order
    pub(crate) attributes: Vec<NodeId>,
}

impl ElementData {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), attributes: Vec::new() }
    }

    pub fn attributes(&self) -> &[NodeId] {
        &self.attributes
    }
}

/// Character data stored as UTF-16 code units
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextData {
    pub(crate) units: Vec<u16>,
}

impl TextData {
    pub fn new(content: &str) -> Self {
        Self { units: content.encode_utf16().collect() }
    }

    /// Length in code units
    #[inline]
    pub fn len(&self) -> u32 {
        self.units.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    /// Decode the code units; unpaired surrogates become U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }

    /// Decode a code-unit window, clamped to the data
    pub fn substring(&self, start: u32, end: u32) -> String {
        let end = (end as usize).min(self.units.len());
        let start = (start as usize).min(end);
        String::from_utf16_lossy(&self.units[start..end])
    }
}

/// Attribute node data
#[derive(Debug)]
pub struct AttrData {
    pub name: String,
    pub value: String,
    /// Owning element, if the attribute is set on one
    pub(crate) owner: Option<NodeId>,
}

impl AttrData {
    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_data_units() {
        let text = TextData::new("a\u{1F600}b");
        // astral character takes two code units
        assert_eq!(text.len(), 4);
        assert_eq!(text.substring(0, 1), "a");
        assert_eq!(text.substring(3, 10), "b");
    }

    #[test]
    fn test_length_by_kind() {
        let owner = NodeId(0);
        let text = Node::new(NodeData::Text(TextData::new("hello")), owner);
        assert_eq!(text.length(), 5);

        let doctype = Node::new(
            NodeData::Doctype {
                name: "html".into(),
                public_id: String::new(),
                system_id: String::new(),
            },
            owner,
        );
        assert_eq!(doctype.length(), 0);

        let mut element = Node::new(NodeData::Element(ElementData::new("div")), owner);
        element.children.push(NodeId(7));
        assert_eq!(element.length(), 1);
    }

    #[test]
    fn test_kind_predicates() {
        let owner = NodeId(0);
        let comment = Node::new(NodeData::Comment(TextData::new("c")), owner);
        assert!(comment.is_character_data());
        assert!(!comment.is_container());
        assert!(comment.is_content());
        assert_eq!(comment.node_type(), NodeType::Comment);
        assert_eq!(comment.node_type().to_u16(), 8);

        let doc = Node::new(NodeData::Document, owner);
        assert!(doc.is_container());
        assert!(!doc.is_content());
    }

    #[test]
    fn test_selection_flags() {
        let mut node = Node::new(NodeData::DocumentFragment, NodeId(0));
        assert!(!node.is_selection_descendant());
        node.flags.insert(NodeFlags::DESCENDANT_OF_COMMON_ANCESTOR_FOR_RANGE_IN_SELECTION);
        assert!(node.is_selection_descendant());
        assert!(!node.is_common_ancestor_for_range_in_selection());
    }
}

//! Character Data
//!
//! Editing of text, comment and processing-instruction payloads. Offsets
//! and counts are in UTF-16 code units.

use crate::error::{DomError, DomResult};
use crate::observer::{CharacterDataChange, ChangeDetails};
use crate::{DomTree, NodeId};

impl DomTree {
    /// Current data of a character-data node
    pub fn character_data(&self, node: NodeId) -> Option<String> {
        self.node(node).character_data().map(|t| t.to_string_lossy())
    }

    /// Substring by code-unit offset and count
    pub fn substring_data(&self, node: NodeId, offset: u32, count: u32) -> DomResult<String> {
        let data = self.node(node).character_data().ok_or(DomError::InvalidNodeType)?;
        if offset > data.len() {
            return Err(DomError::IndexSize);
        }
        Ok(data.substring(offset, offset.saturating_add(count)))
    }

    pub fn set_data(&mut self, node: NodeId, value: &str) -> DomResult<()> {
        let len = self.length(node);
        self.replace_data(node, 0, len, value)
    }

    pub fn append_data(&mut self, node: NodeId, value: &str) -> DomResult<()> {
        let len = self.length(node);
        self.replace_data(node, len, 0, value)
    }

    pub fn insert_data(&mut self, node: NodeId, offset: u32, value: &str) -> DomResult<()> {
        self.replace_data(node, offset, 0, value)
    }

    pub fn delete_data(&mut self, node: NodeId, offset: u32, count: u32) -> DomResult<()> {
        self.replace_data(node, offset, count, "")
    }

    /// Replace `count` code units at `offset`; the count is clamped to the data
    pub fn replace_data(
        &mut self,
        node: NodeId,
        offset: u32,
        count: u32,
        value: &str,
    ) -> DomResult<()> {
        let units: Vec<u16> = value.encode_utf16().collect();
        let data = self.node_mut(node).character_data_mut().ok_or(DomError::InvalidNodeType)?;
        let len = data.len();
        if offset > len {
            return Err(DomError::IndexSize);
        }
        let end = offset + count.min(len - offset);
        data.units.try_reserve(units.len())?;
        let replace_length = units.len() as u32;
        data.units.splice(offset as usize..end as usize, units);

        let change = CharacterDataChange {
            change_start: offset,
            change_end: end,
            replace_length,
            details: None,
        };
        self.notify_character_data_changed(node, &change);
        Ok(())
    }

    /// Split a text node at `offset`, returning the new following sibling
    /// that holds the tail
    pub fn split_text(&mut self, node: NodeId, offset: u32) -> DomResult<NodeId> {
        if !self.node(node).is_text() {
            return Err(DomError::InvalidNodeType);
        }
        let len = self.length(node);
        if offset > len {
            return Err(DomError::IndexSize);
        }

        let tail = self
            .node(node)
            .character_data()
            .map(|t| t.substring(offset, len))
            .unwrap_or_default();
        let new_node = self.create_text(node, &tail);

        if let Some(parent) = self.parent(node) {
            let index = self.index_of(parent, node).ok_or(DomError::NotFound)?;
            self.insert_child_at(parent, new_node, index + 1, true)?;
        }

        if let Some(data) = self.node_mut(node).character_data_mut() {
            data.units.truncate(offset as usize);
        }
        let change = CharacterDataChange {
            change_start: offset,
            change_end: len,
            replace_length: 0,
            details: Some(ChangeDetails::Split { new_sibling: new_node }),
        };
        self.notify_character_data_changed(node, &change);
        tracing::debug!(?node, ?new_node, offset, "text split");
        Ok(new_node)
    }
}

//! Generational Arena
//!
//! Slot map backing the live range table. A freed slot bumps its
//! generation, so a handle kept after destruction never aliases the
//! range that later reuses the slot.

/// Generational index for safe references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenIndex {
    pub index: u32,
    pub generation: u32,
}

/// Generational arena (slot map)
#[derive(Debug)]
pub struct GenArena<T> {
    items: Vec<Option<T>>,
    free_list: Vec<u32>,
    generations: Vec<u32>,
    live: usize,
}

impl<T> GenArena<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            free_list: Vec::new(),
            generations: Vec::new(),
            live: 0,
        }
    }

    /// Insert item
    pub fn insert(&mut self, value: T) -> GenIndex {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            self.items[index as usize] = Some(value);
            GenIndex { index, generation: self.generations[index as usize] }
        } else {
            let index = self.items.len() as u32;
            self.items.push(Some(value));
            self.generations.push(0);
            GenIndex { index, generation: 0 }
        }
    }

    /// Get item
    pub fn get(&self, idx: GenIndex) -> Option<&T> {
        if !self.is_current(idx) {
            return None;
        }
        self.items.get(idx.index as usize)?.as_ref()
    }

    /// Get item mutably
    pub fn get_mut(&mut self, idx: GenIndex) -> Option<&mut T> {
        if !self.is_current(idx) {
            return None;
        }
        self.items.get_mut(idx.index as usize)?.as_mut()
    }

    /// Whether `idx` still names a live item
    pub fn contains(&self, idx: GenIndex) -> bool {
        self.get(idx).is_some()
    }

    /// Remove item
    pub fn remove(&mut self, idx: GenIndex) -> Option<T> {
        if !self.is_current(idx) {
            return None;
        }
        let value = self.items.get_mut(idx.index as usize)?.take()?;
        self.generations[idx.index as usize] = self.generations[idx.index as usize].wrapping_add(1);
        self.free_list.push(idx.index);
        self.live -= 1;
        Some(value)
    }

    /// Iterate live items with their handles
    pub fn iter(&self) -> impl Iterator<Item = (GenIndex, &T)> {
        self.items.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|value| {
                (GenIndex { index: i as u32, generation: self.generations[i] }, value)
            })
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn is_current(&self, idx: GenIndex) -> bool {
        self.generations.get(idx.index as usize) == Some(&idx.generation)
    }
}

impl<T> Default for GenArena<T> {
    fn default() -> Self { Self::new() }
}

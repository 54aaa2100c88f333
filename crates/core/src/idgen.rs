//! First-fit ID allocation over a fixed range

use std::collections::BTreeSet;
use std::ops::Range;

/// Hands out the lowest free id in its range.
///
/// Not synchronized: the owner (the hub) is the only caller.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    range: Range<u32>,
    used: BTreeSet<u32>,
}

impl IdAllocator {
    pub fn new(range: Range<u32>) -> Self {
        Self {
            range,
            used: BTreeSet::new(),
        }
    }

    /// Allocate the lowest free id, or `None` when the range is exhausted
    pub fn allocate(&mut self) -> Option<u32> {
        let mut candidate = self.range.start;
        for &id in self.used.range(self.range.clone()) {
            if id != candidate {
                break;
            }
            candidate += 1;
        }

        if candidate >= self.range.end {
            return None;
        }
        self.used.insert(candidate);
        Some(candidate)
    }

    /// Mark an externally chosen id as taken. Returns false if it already was.
    pub fn claim(&mut self, id: u32) -> bool {
        self.range.contains(&id) && self.used.insert(id)
    }

    pub fn release(&mut self, id: u32) {
        self.used.remove(&id);
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        self.used.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

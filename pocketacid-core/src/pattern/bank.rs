//! `Bank<T>` (spec §3): 8 patterns of one type.

use serde::{Deserialize, Serialize};

pub const PATTERNS_PER_BANK: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank<T> {
    pub patterns: [T; PATTERNS_PER_BANK],
}

impl<T: Default + Clone> Default for Bank<T> {
    fn default() -> Self {
        Self {
            patterns: std::array::from_fn(|_| T::default()),
        }
    }
}

impl<T> Bank<T> {
    pub fn get(&self, index: usize) -> Option<&T> {
        self.patterns.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.patterns.get_mut(index)
    }
}

//! A single automation node: an (x, y) pair, x the step position in
//! `[0, 15]`, y the 8-bit value in `[0, 255]`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationNode {
    pub x: u8,
    pub y: u8,
}

impl AutomationNode {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

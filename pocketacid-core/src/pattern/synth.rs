//! SynthStep / SynthPattern (spec §3).

use serde::{Deserialize, Serialize};

use crate::automation::{AutomationLane, AutomationNodePool};

pub const STEPS_PER_PATTERN: usize = 16;

/// Automatable synth parameters; indexes `SynthPattern::automation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthParamId {
    Cutoff = 0,
    Resonance = 1,
    EnvAmount = 2,
    EnvDecay = 3,
    OscType = 4,
}

pub const SYNTH_PARAM_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SynthStep {
    /// -1 denotes a rest; otherwise in [24, 71].
    pub note: i8,
    pub accent: bool,
    pub slide: bool,
    pub velocity: u8,
    pub timing: i8,
    pub ghost: bool,
    pub fx: u8,
    pub fx_param: u8,
    pub probability: u8,
}

impl Default for SynthStep {
    fn default() -> Self {
        Self {
            note: -1,
            accent: false,
            slide: false,
            velocity: 100,
            timing: 0,
            ghost: false,
            fx: 0,
            fx_param: 0,
            probability: 100,
        }
    }
}

impl SynthStep {
    pub fn is_rest(&self) -> bool {
        self.note < 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthPattern {
    pub steps: [SynthStep; STEPS_PER_PATTERN],
    pub automation: [AutomationLane; SYNTH_PARAM_COUNT],
}

impl Default for SynthPattern {
    fn default() -> Self {
        Self {
            steps: [SynthStep::default(); STEPS_PER_PATTERN],
            automation: std::array::from_fn(|_| AutomationLane::new()),
        }
    }
}

impl SynthPattern {
    pub fn lane(&self, id: SynthParamId) -> &AutomationLane {
        &self.automation[id as usize]
    }

    pub fn lane_mut(&mut self, id: SynthParamId) -> &mut AutomationLane {
        &mut self.automation[id as usize]
    }

    pub fn clear_lane(&mut self, pool: &mut AutomationNodePool, id: SynthParamId) {
        self.automation[id as usize].clear(pool);
    }
}

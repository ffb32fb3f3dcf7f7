//! DrumStep / DrumPattern / DrumPatternSet (spec §3).

use serde::{Deserialize, Serialize};

use crate::automation::{AutomationLane, AutomationNodePool};

pub const STEPS_PER_PATTERN: usize = 16;
pub const DRUM_VOICE_COUNT: usize = 9;

/// Mirrors `mini_drumvoices.h`'s `DrumVoiceType` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumVoice {
    Kick = 0,
    Snare = 1,
    ClosedHat = 2,
    OpenHat = 3,
    MidTom = 4,
    HighTom = 5,
    Rim = 6,
    Clap = 7,
    Cymbal = 8,
}

impl DrumVoice {
    pub const ALL: [DrumVoice; DRUM_VOICE_COUNT] = [
        DrumVoice::Kick,
        DrumVoice::Snare,
        DrumVoice::ClosedHat,
        DrumVoice::OpenHat,
        DrumVoice::MidTom,
        DrumVoice::HighTom,
        DrumVoice::Rim,
        DrumVoice::Clap,
        DrumVoice::Cymbal,
    ];
}

/// Mirrors `mini_drumvoices.h`'s `DrumParamId` (only `MainVolume` in the
/// original — the reference exposes per-voice tone params but only the
/// overall level is lane-automatable at the pattern-set level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumParamId {
    MainVolume = 0,
}

pub const DRUM_PARAM_COUNT: usize = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DrumStep {
    pub hit: bool,
    /// Stored for round-trip fidelity; per spec the engine never reads this
    /// during triggering (it reads the pattern-set's `accents[step]`).
    pub accent: bool,
    pub velocity: u8,
    pub timing: i8,
    pub fx: u8,
    pub fx_param: u8,
    pub probability: u8,
}

impl Default for DrumStep {
    fn default() -> Self {
        Self {
            hit: false,
            accent: false,
            velocity: 100,
            timing: 0,
            fx: 0,
            fx_param: 0,
            probability: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrumPattern {
    pub steps: [DrumStep; STEPS_PER_PATTERN],
}

impl Default for DrumPattern {
    fn default() -> Self {
        Self {
            steps: [DrumStep::default(); STEPS_PER_PATTERN],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrumPatternSet {
    pub voices: [DrumPattern; DRUM_VOICE_COUNT],
    pub accents: [bool; STEPS_PER_PATTERN],
    pub automation: [AutomationLane; DRUM_PARAM_COUNT],
}

impl Default for DrumPatternSet {
    fn default() -> Self {
        Self {
            voices: std::array::from_fn(|_| DrumPattern::default()),
            accents: [false; STEPS_PER_PATTERN],
            automation: std::array::from_fn(|_| AutomationLane::new()),
        }
    }
}

impl DrumPatternSet {
    pub fn voice(&self, v: DrumVoice) -> &DrumPattern {
        &self.voices[v as usize]
    }

    pub fn voice_mut(&mut self, v: DrumVoice) -> &mut DrumPattern {
        &mut self.voices[v as usize]
    }

    pub fn lane(&self, id: DrumParamId) -> &AutomationLane {
        &self.automation[id as usize]
    }

    pub fn lane_mut(&mut self, id: DrumParamId) -> &mut AutomationLane {
        &mut self.automation[id as usize]
    }

    pub fn clear_lane(&mut self, pool: &mut AutomationNodePool, id: DrumParamId) {
        self.automation[id as usize].clear(pool);
    }
}

//! Scene aggregate (spec §3): the full persistent state of the groovebox.
//!
//! Ephemeral per-callback state (sample counters, live DSP objects, the
//! waveform buffer, perf counters) lives in `Engine`/`sequencer`, not here;
//! `Scene` only carries what a JSON save restores at the next boot.

pub mod dump;
pub mod json_parser;
pub mod observer;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::automation::AutomationNodePool;
use crate::pattern::{Bank, DrumPatternSet, Song, SynthPattern};
use crate::voice::GrooveboxMode;

pub const DRUM_BANK_COUNT: usize = 2;
pub const SYNTH_BANK_COUNT: usize = 2;
pub const DRUM_VOICE_MUTE_COUNT: usize = 8;
pub const SONG_COUNT: usize = 2;
pub const CUSTOM_PHRASE_COUNT: usize = 16;
pub const TRACK_VOLUME_COUNT: usize = 10;
pub const SAMPLER_PAD_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthParamSnapshot {
    pub cutoff: f32,
    pub resonance: f32,
    pub env_amount: f32,
    pub env_decay: f32,
    pub osc_type: usize,
}

impl Default for SynthParamSnapshot {
    fn default() -> Self {
        Self {
            cutoff: 800.0,
            resonance: 0.0,
            env_amount: 400.0,
            env_decay: 420.0,
            osc_type: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuteState {
    pub drums: [bool; DRUM_VOICE_MUTE_COUNT],
    pub synth: [bool; 2],
}

impl Default for MuteState {
    fn default() -> Self {
        Self {
            drums: [false; DRUM_VOICE_MUTE_COUNT],
            synth: [false; 2],
        }
    }
}

/// `tape` domain object (spec §6): mode/preset name plus the macro knobs
/// `dsp::tape_fx` and `dsp::looper` read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TapeState {
    pub mode: String,
    pub preset: String,
    pub speed: u8,
    pub fx_enabled: bool,
    pub wow: u8,
    pub age: u8,
    pub sat: u8,
    pub tone: u8,
    pub crush: u8,
    pub vol: u8,
    pub space: u8,
    pub movement: u8,
    pub groove: u8,
}

impl Default for TapeState {
    fn default() -> Self {
        Self {
            mode: "stop".to_string(),
            preset: "clean".to_string(),
            speed: 1,
            fx_enabled: false,
            wow: 0,
            age: 0,
            sat: 0,
            tone: 128,
            crush: 0,
            vol: 200,
            space: 0,
            movement: 0,
            groove: 0,
        }
    }
}

/// `vocal` domain object: the formant voice's speaking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocalState {
    pub speed: f32,
    pub robotness: f32,
    pub pitch_hz: f32,
    pub volume: f32,
    pub ducking_enabled: bool,
}

impl Default for VocalState {
    fn default() -> Self {
        Self {
            speed: 1.0,
            robotness: 0.3,
            pitch_hz: 120.0,
            volume: 0.7,
            ducking_enabled: true,
        }
    }
}

/// Scene-wide generator/genre seed parameters. The generator/genre/feel
/// systems themselves are out of this core's scope (spec §1); these are
/// opaque round-trip payloads, not interpreted by the audio path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorParams {
    pub seed: u64,
    pub density: u8,
    pub swing: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub drum_banks: [Bank<DrumPatternSet>; DRUM_BANK_COUNT],
    pub synth_a_banks: [Bank<SynthPattern>; SYNTH_BANK_COUNT],
    pub synth_b_banks: [Bank<SynthPattern>; SYNTH_BANK_COUNT],

    pub songs: [Song; SONG_COUNT],
    pub active_song_slot: usize,

    pub drum_pattern_index: usize,
    pub drum_bank_index: usize,
    pub drum_engine: String,
    pub synth_pattern_index: [usize; 2],
    pub synth_bank_index: [usize; 2],
    pub mute: MuteState,
    pub synth_distortion: [bool; 2],
    pub synth_delay: [bool; 2],
    pub synth_params: [SynthParamSnapshot; 2],

    pub bpm: f32,
    pub song_mode: bool,
    pub song_position: usize,
    pub loop_mode: bool,
    pub loop_start: usize,
    pub loop_end: usize,

    pub groovebox_mode: GrooveboxMode,
    pub master_volume: f32,
    pub track_volumes: [f32; TRACK_VOLUME_COUNT],

    pub generator: GeneratorParams,
    pub vocal: VocalState,
    pub tape: TapeState,

    pub custom_phrases: [String; CUSTOM_PHRASE_COUNT],

    /// Domain objects this core doesn't interpret but must round-trip.
    pub feel: Value,
    pub genre: Value,
    pub led: Value,
    pub drum_fx: Value,
    pub sampler_pads: Value,

    /// The shared node arena backing every automation lane above. Not part
    /// of the original `scenes.h` struct layout (there the pool is a
    /// process-wide singleton, spec §9) but logically scene-owned here.
    #[serde(skip, default = "default_automation_pool")]
    pub automation_pool: AutomationNodePool,
}

fn default_automation_pool() -> AutomationNodePool {
    AutomationNodePool::new(crate::automation::DEFAULT_POOL_CAPACITY)
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            drum_banks: std::array::from_fn(|_| Bank::default()),
            synth_a_banks: std::array::from_fn(|_| Bank::default()),
            synth_b_banks: std::array::from_fn(|_| Bank::default()),
            songs: std::array::from_fn(|_| Song::default()),
            active_song_slot: 0,
            drum_pattern_index: 0,
            drum_bank_index: 0,
            drum_engine: "808".to_string(),
            synth_pattern_index: [0, 0],
            synth_bank_index: [0, 0],
            mute: MuteState::default(),
            synth_distortion: [false, false],
            synth_delay: [false, false],
            synth_params: [SynthParamSnapshot::default(), SynthParamSnapshot::default()],
            bpm: 120.0,
            song_mode: false,
            song_position: 0,
            loop_mode: false,
            loop_start: 0,
            loop_end: 0,
            groovebox_mode: GrooveboxMode::default(),
            master_volume: 0.8,
            track_volumes: [1.0; TRACK_VOLUME_COUNT],
            generator: GeneratorParams::default(),
            vocal: VocalState::default(),
            tape: TapeState::default(),
            custom_phrases: std::array::from_fn(|_| String::new()),
            feel: Value::Null,
            genre: Value::Null,
            led: Value::Null,
            drum_fx: Value::Null,
            sampler_pads: Value::Null,
            automation_pool: AutomationNodePool::new(crate::automation::DEFAULT_POOL_CAPACITY),
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clamp_bpm(bpm: f32) -> f32 {
        bpm.clamp(40.0, 200.0)
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = Self::clamp_bpm(bpm);
    }

    /// Setting loop range clamps to `[0, length-1]` and swaps start/end when
    /// reversed (spec §4.8).
    pub fn set_loop_range(&mut self, start: usize, end: usize) {
        let song_len = self.songs[self.active_song_slot].length;
        let max_index = song_len.saturating_sub(1);
        let mut a = start.min(max_index);
        let mut b = end.min(max_index);
        if a > b {
            std::mem::swap(&mut a, &mut b);
        }
        self.loop_start = a;
        self.loop_end = b;
    }

    pub fn active_song(&self) -> &Song {
        &self.songs[self.active_song_slot]
    }

    pub fn active_song_mut(&mut self) -> &mut Song {
        &mut self.songs[self.active_song_slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scene_has_sane_transport() {
        let scene = Scene::new();
        assert_eq!(scene.bpm, 120.0);
        assert!(!scene.song_mode);
    }

    #[test]
    fn bpm_clamps_to_spec_range() {
        let mut scene = Scene::new();
        scene.set_bpm(1000.0);
        assert_eq!(scene.bpm, 200.0);
        scene.set_bpm(-5.0);
        assert_eq!(scene.bpm, 40.0);
    }

    #[test]
    fn loop_range_swaps_when_reversed() {
        let mut scene = Scene::new();
        scene.songs[0].length = 8;
        scene.set_loop_range(5, 2);
        assert_eq!((scene.loop_start, scene.loop_end), (2, 5));
    }
}

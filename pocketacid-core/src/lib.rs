//! `pocketacid-core`: the realtime audio engine of a portable groovebox
//! (spec.md §2-§9) — a 16-step multi-voice sequencer driving two acid-bass
//! synth voices, a 3-engine drum machine, a tape/looper bus, and a formant
//! speech synth. This crate owns everything the audio callback touches;
//! display, input, and storage are out-of-scope collaborators that only
//! ever reach in through [`Engine`].

pub mod automation;
pub mod config;
pub mod counters;
pub mod dsp;
pub mod error;
pub mod guard;
pub mod mixer;
pub mod param;
pub mod pattern;
pub mod scene;
pub mod sequencer;
pub mod snapshot;
pub mod voice;

mod engine;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};

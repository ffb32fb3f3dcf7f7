pub mod drum;
pub mod synth_voice;

pub use drum::{DrumEngineKind, DrumEngineSlot, DrumMachine};
pub use synth_voice::{GrooveboxMode, SynthVoice};

pub mod bank;
pub mod drum;
pub mod song;
pub mod synth;

pub use bank::Bank;
pub use drum::{DrumParamId, DrumPattern, DrumPatternSet, DrumStep, DrumVoice, DRUM_VOICE_COUNT};
pub use song::{Song, SongPosition, SongTrack};
pub use synth::{SynthParamId, SynthPattern, SynthStep};

pub mod delay;
pub mod distortion;
pub mod filter;
pub mod formant;
pub mod looper;
pub mod tape_fx;
pub mod vocal;
pub mod wavetable;

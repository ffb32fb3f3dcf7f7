//! Final mix stage (spec §4.9), ported from `generateAudioBuffer`'s
//! per-sample tail in `miniacid_engine.cpp`: synth A/B through their own
//! distortion and tempo delay, the 8 sequenced drum voices summed, the
//! formant voice ducked and compressed onto the bus, the tape bus added
//! in, then master gain, a soft limiter, a bass shelf, and int16 dither.

use crate::dsp::delay::TempoDelay;
use crate::dsp::distortion::{tube_saturate, Lcg};
use crate::dsp::formant::FormantVoice;
use crate::dsp::looper::TapeLooper;
use crate::dsp::tape_fx::TapeFx;
use crate::dsp::vocal::{VocalMixer, VoiceCompressor};
use crate::pattern::drum::DrumVoice;
use crate::scene::Scene;
use crate::sequencer::SEQUENCED_DRUM_VOICES;
use crate::voice::{DrumMachine, SynthVoice};

/// Drive-only tube saturation, gated per track by `Scene::synth_distortion`
/// rather than per-accent like the drum engines' `AccentDistortion` (the
/// synth distortion toggle in `scenes.h` is a track-wide on/off, not a
/// per-step accent effect). Same primitive, different gate.
#[derive(Debug, Clone, Copy)]
pub struct SynthDistortion {
    drive: f32,
}

impl SynthDistortion {
    pub fn new(drive: f32) -> Self {
        Self { drive }
    }

    pub fn process(&self, input: f32, enabled: bool) -> f32 {
        if !enabled {
            return input;
        }
        tube_saturate(input, self.drive)
    }
}

const MASTER_BASS_CUTOFF: f32 = 0.02;
const MASTER_BASS_BOOST: f32 = 1.15;
const LIMITER_KNEE: f32 = 0.95;

/// Soft limiter: linear up to `LIMITER_KNEE`, tanh-shaped above it (spec
/// §4.9 step 7), rather than the literal hard `[-1, 1]` clamp the captured
/// C++ snippet uses — the spec's prose is the binding requirement here.
fn soft_limit(x: f32) -> f32 {
    let sign = x.signum();
    let a = x.abs();
    if a <= LIMITER_KNEE {
        return x;
    }
    let over = (a - LIMITER_KNEE) / (1.0 - LIMITER_KNEE);
    sign * (LIMITER_KNEE + (1.0 - LIMITER_KNEE) * over.tanh())
}

/// Owns the DSP objects downstream of the two synth voices and the drum
/// machine: per-track distortion/delay, the tape bus, the formant voice,
/// and the master bus (bass shelf, limiter, dither).
pub struct Mixer {
    synth_distortion: [SynthDistortion; 2],
    synth_delay: [TempoDelay; 2],
    pub tape_looper: TapeLooper,
    pub tape_fx: TapeFx,
    pub formant: FormantVoice,
    vocal_mixer: VocalMixer,
    voice_compressor: VoiceCompressor,
    bass_z1: f32,
    dither_lcg: Lcg,
}

impl Mixer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            synth_distortion: [SynthDistortion::new(6.0), SynthDistortion::new(6.0)],
            synth_delay: [TempoDelay::new(sample_rate), TempoDelay::new(sample_rate)],
            tape_looper: TapeLooper::new(sample_rate),
            tape_fx: TapeFx::new(sample_rate),
            formant: FormantVoice::new(sample_rate),
            vocal_mixer: VocalMixer::new(),
            voice_compressor: VoiceCompressor::new(),
            bass_z1: 0.0,
            dither_lcg: Lcg::new(0xC0FF_EE01),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        *self = Self::new(sample_rate);
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        for d in self.synth_delay.iter_mut() {
            d.set_bpm(bpm);
        }
    }

    /// One sample of the full mix, given the two synth voices (already
    /// `process()`-ed by the caller this sample) and the drum machine.
    /// `scene` supplies the per-track toggles and master/track volumes.
    #[allow(clippy::too_many_arguments)]
    pub fn process_sample(
        &mut self,
        scene: &Scene,
        synths: &mut [SynthVoice; 2],
        drum: &mut DrumMachine,
    ) -> f32 {
        // 1-2: voice A/B, each through its own distortion/delay.
        let mut music_bus = 0.0;
        for i in 0..2 {
            let gated = synths[i].is_gated();
            let raw = if gated { synths[i].process() * 0.5 } else { 0.0 };
            let distorted = self.synth_distortion[i].process(raw, scene.synth_distortion[i]);
            self.synth_delay[i].enabled = scene.synth_delay[i];
            let delayed = self.synth_delay[i].process(distorted);
            music_bus += if scene.mute.synth[i] { 0.0 } else { delayed };
        }

        // 3: drum voices, summed over the 8 sequenced voices only. `Cymbal`
        // can still be manually triggered through the engine façade but,
        // matching the reference mix loop, never contributes to the bus on
        // its own via pattern playback (see sequencer module docs and
        // DESIGN.md).
        for &voice in SEQUENCED_DRUM_VOICES.iter() {
            let out = drum.slot.process(voice);
            if !scene.mute.drums[voice as usize] {
                music_bus += out;
            }
        }
        let _ = DrumVoice::Cymbal;

        // 4: mix in the formant voice after ducking/compression.
        self.vocal_mixer.update(self.formant.is_speaking());
        if scene.vocal.ducking_enabled {
            music_bus *= self.vocal_mixer.music_gain();
        }
        let voice_raw = self.formant.process();
        let voice_out = self.voice_compressor.process(voice_raw) * scene.vocal.volume;
        let mut sample = music_bus + voice_out;

        // 5: tape bus. The looper mixes in parallel; the combined signal
        // then passes through TapeFX.
        let looper_out = self.tape_looper.process(sample);
        sample += looper_out;
        if self.tape_fx.enabled {
            sample = self.tape_fx.process(sample);
        }

        // 6: master gain. No separate `MainVolume` fader exists in this
        // core's scene model (see DESIGN.md); `scene.master_volume` plays
        // that role alongside the reference's fixed 0.65 headroom factor.
        sample *= 0.65 * scene.master_volume;

        // 7: soft limit.
        sample = soft_limit(sample);

        // 8: master bass boost.
        self.bass_z1 += MASTER_BASS_CUTOFF * (sample - self.bass_z1);
        sample += self.bass_z1 * (MASTER_BASS_BOOST - 1.0);

        sample
    }

    /// Quantizes a mixed `f32` sample (nominally in `[-1, 1]`) to `i16`
    /// with triangular dither, matching `buffer[i] = sample * 32767.0f *
    /// currentVolume` in the reference plus the dither the spec adds.
    pub fn quantize(&mut self, sample: f32) -> i16 {
        let dither = (self.dither_lcg.next_noise() + self.dither_lcg.next_noise()) * (1.0 / 32768.0);
        let scaled = (sample + dither) * 32767.0;
        scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::DrumMachine;

    #[test]
    fn silent_scene_mixes_to_near_zero() {
        let scene = Scene::new();
        let mut mixer = Mixer::new(22_050.0);
        let mut synths = [SynthVoice::new(22_050.0), SynthVoice::new(22_050.0)];
        let mut drum = DrumMachine::new(22_050.0);
        for _ in 0..100 {
            let s = mixer.process_sample(&scene, &mut synths, &mut drum);
            assert!(s.is_finite());
            assert!(s.abs() < 0.05);
        }
    }

    #[test]
    fn loud_input_stays_within_unit_range_after_limiting() {
        let mut scene = Scene::new();
        scene.master_volume = 1.0;
        let mut mixer = Mixer::new(22_050.0);
        let mut synths = [SynthVoice::new(22_050.0), SynthVoice::new(22_050.0)];
        synths[0].start_note(220.0, true, false, 127);
        synths[1].start_note(440.0, true, false, 127);
        let mut drum = DrumMachine::new(22_050.0);
        for voice in DrumVoice::ALL {
            drum.slot.trigger(voice, true, 127);
        }
        let mut max_abs = 0.0_f32;
        for _ in 0..2000 {
            let s = mixer.process_sample(&scene, &mut synths, &mut drum);
            max_abs = max_abs.max(s.abs());
        }
        assert!(max_abs.is_finite());
        assert!(max_abs < 1.5);
    }

    #[test]
    fn quantize_stays_in_i16_range() {
        let mut mixer = Mixer::new(22_050.0);
        for i in 0..100 {
            let x = if i % 2 == 0 { 1.2 } else { -1.2 };
            let q = mixer.quantize(x);
            assert!(q == i16::MAX || q == i16::MIN || q.abs() > 30000);
        }
    }
}

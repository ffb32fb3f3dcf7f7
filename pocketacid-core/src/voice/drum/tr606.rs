//! TR-606-style 9-voice drum engine, ported from `TR606DrumSynthVoice` in
//! `mini_drumvoices.cpp`.
//!
//! Distinct from the other two engines: no accent-distortion stage, no
//! lo-fi post-processing (the original declares the fields but never
//! invokes them), a continuously running six-partial "metal bank" feeding
//! both hats and the cymbal, rim aliased straight to cymbal, and no clap
//! voice at all (the original's `processClap` always returns silence).

use std::f32::consts::PI;

use super::frand as shared_frand;
use crate::dsp::distortion::Lcg;
use crate::param::Parameter;
use crate::pattern::drum::DrumVoice;

const METAL_FREQS: [f32; 6] = [330.0, 558.0, 880.0, 1320.0, 1760.0, 2640.0];

fn decay_coeff(time_seconds: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_seconds.max(1e-4) * sample_rate)).exp()
}

fn one_pole_coeff(cutoff_hz: f32, inv_sample_rate: f32) -> f32 {
    1.0 - (-2.0 * PI * cutoff_hz * inv_sample_rate).exp()
}

pub struct Tr606Voice {
    noise: Lcg,

    sample_rate: f32,
    inv_sample_rate: f32,

    pub main_volume: Parameter,

    accent_env: f32,
    accent_decay: f32,

    metal_phases: [f32; 6],
    metal_signal: f32,

    kick_phase: f32,
    kick_freq: f32,
    kick_env: f32,
    kick_active: bool,
    kick_decay_coeff: f32,

    snare_env: f32,
    snare_tone_phase: f32,
    snare_active: bool,
    snare_decay_coeff: f32,
    snare_hp_z: f32,
    snare_hp_coeff: f32,

    hat_env: f32,
    hat_active: bool,
    hat_hp_z: f32,
    hat_prev: f32,
    hat_hp_coeff: f32,

    open_hat_env: f32,
    open_hat_active: bool,
    open_hat_hp_z: f32,
    open_hat_prev: f32,
    open_hat_hp_coeff: f32,

    mid_tom_phase: f32,
    mid_tom_env: f32,
    mid_tom_active: bool,
    mid_tom_decay_coeff: f32,

    high_tom_phase: f32,
    high_tom_env: f32,
    high_tom_active: bool,
    high_tom_decay_coeff: f32,

    cymbal_env: f32,
    cymbal_active: bool,
    cymbal_hp_z: f32,
    cymbal_prev: f32,
    cymbal_hp_coeff: f32,
}

impl Tr606Voice {
    pub fn new(sample_rate: f32) -> Self {
        let sr = if sample_rate > 0.0 { sample_rate } else { 44_100.0 };
        let inv_sr = 1.0 / sr;
        Self {
            noise: Lcg::new(6060606),
            sample_rate: sr,
            inv_sample_rate: inv_sr,
            main_volume: Parameter::new(0.0, 1.0, 1.0 / 128.0, 0.8),
            accent_env: 0.35,
            accent_decay: 0.9995,
            metal_phases: [0.0; 6],
            metal_signal: 0.0,
            kick_phase: 0.0,
            kick_freq: 55.0,
            kick_env: 0.0,
            kick_active: false,
            kick_decay_coeff: decay_coeff(0.25, sr),
            snare_env: 0.0,
            snare_tone_phase: 0.0,
            snare_active: false,
            snare_decay_coeff: decay_coeff(0.12, sr),
            snare_hp_z: 0.0,
            snare_hp_coeff: one_pole_coeff(800.0, inv_sr),
            hat_env: 0.0,
            hat_active: false,
            hat_hp_z: 0.0,
            hat_prev: 0.0,
            hat_hp_coeff: one_pole_coeff(6000.0, inv_sr),
            open_hat_env: 0.0,
            open_hat_active: false,
            open_hat_hp_z: 0.0,
            open_hat_prev: 0.0,
            open_hat_hp_coeff: one_pole_coeff(5500.0, inv_sr),
            mid_tom_phase: 0.0,
            mid_tom_env: 0.0,
            mid_tom_active: false,
            mid_tom_decay_coeff: decay_coeff(0.2, sr),
            high_tom_phase: 0.0,
            high_tom_env: 0.0,
            high_tom_active: false,
            high_tom_decay_coeff: decay_coeff(0.16, sr),
            cymbal_env: 0.0,
            cymbal_active: false,
            cymbal_hp_z: 0.0,
            cymbal_prev: 0.0,
            cymbal_hp_coeff: one_pole_coeff(6500.0, inv_sr),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.sample_rate);
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        let sr = if sr > 0.0 { sr } else { 44_100.0 };
        self.sample_rate = sr;
        self.inv_sample_rate = 1.0 / sr;
        self.kick_decay_coeff = decay_coeff(0.25, sr);
        self.snare_decay_coeff = decay_coeff(0.12, sr);
        self.snare_hp_coeff = one_pole_coeff(800.0, self.inv_sample_rate);
        self.hat_hp_coeff = one_pole_coeff(6000.0, self.inv_sample_rate);
        self.open_hat_hp_coeff = one_pole_coeff(5500.0, self.inv_sample_rate);
        self.mid_tom_decay_coeff = decay_coeff(0.2, sr);
        self.high_tom_decay_coeff = decay_coeff(0.16, sr);
        self.cymbal_hp_coeff = one_pole_coeff(6500.0, self.inv_sample_rate);
    }

    /// The original declares `lofiEnabled`/`lofi` fields on this voice but
    /// no `process*` method ever calls them. Kept as a no-op to preserve
    /// that behavior faithfully rather than inventing a stage the source
    /// never exercises.
    pub fn set_lofi_mode(&mut self, _enabled: bool) {}

    pub fn set_lofi_amount(&mut self, _amount: f32) {}

    fn frand(&mut self) -> f32 {
        shared_frand(&mut self.noise)
    }

    fn set_accent(&mut self, accent: bool) {
        self.accent_env = if accent { 1.0 } else { 0.35 };
    }

    fn update_hat_filters(&mut self, accent: f32) {
        self.hat_hp_coeff = one_pole_coeff(6000.0 + 1500.0 * accent, self.inv_sample_rate);
        self.open_hat_hp_coeff = one_pole_coeff(5500.0 + 1200.0 * accent, self.inv_sample_rate);
    }

    fn update_cymbal_filter(&mut self, accent: f32) {
        self.cymbal_hp_coeff = one_pole_coeff(6500.0 + 1600.0 * accent, self.inv_sample_rate);
    }

    fn update_metal_bank(&mut self) {
        let mut sum = 0.0;
        for (phase, freq) in self.metal_phases.iter_mut().zip(METAL_FREQS.iter()) {
            *phase += freq * self.inv_sample_rate;
            if *phase >= 1.0 {
                *phase -= 1.0;
            }
            sum += if *phase < 0.5 { 1.0 } else { -1.0 };
        }
        self.metal_signal = sum / 6.0;
        self.accent_env *= self.accent_decay;
    }

    pub fn trigger(&mut self, voice: DrumVoice, accent: bool, _velocity: u8) {
        self.set_accent(accent);
        match voice {
            DrumVoice::Kick => {
                self.kick_active = true;
                self.kick_phase = 0.0;
                self.kick_env = 1.0;
                self.kick_freq = 55.0;
            }
            DrumVoice::Snare => {
                self.snare_active = true;
                self.snare_env = 1.0;
                self.snare_tone_phase = 0.0;
            }
            DrumVoice::ClosedHat => {
                self.hat_active = true;
                self.hat_env = 1.0;
                self.update_hat_filters(self.accent_env);
                self.open_hat_env *= 0.2;
            }
            DrumVoice::OpenHat => {
                self.open_hat_active = true;
                self.open_hat_env = 1.0;
                self.update_hat_filters(self.accent_env);
            }
            DrumVoice::MidTom => {
                self.mid_tom_active = true;
                self.mid_tom_env = 1.0;
                self.mid_tom_phase = 0.0;
            }
            DrumVoice::HighTom => {
                self.high_tom_active = true;
                self.high_tom_env = 1.0;
                self.high_tom_phase = 0.0;
            }
            DrumVoice::Rim | DrumVoice::Cymbal => {
                self.cymbal_active = true;
                self.cymbal_env = 1.0;
                self.update_cymbal_filter(self.accent_env);
            }
            DrumVoice::Clap => {}
        }
    }

    fn process_kick(&mut self) -> f32 {
        self.update_metal_bank();
        if !self.kick_active {
            return 0.0;
        }
        self.kick_env *= self.kick_decay_coeff;
        if self.kick_env < 0.001 {
            self.kick_active = false;
            return 0.0;
        }
        self.kick_freq = 38.0 + 60.0 * self.kick_env;
        self.kick_phase += self.kick_freq * self.inv_sample_rate;
        if self.kick_phase >= 1.0 {
            self.kick_phase -= 1.0;
        }
        let tone = (2.0 * PI * self.kick_phase).sin();
        tone * self.kick_env * (0.8 + 0.4 * self.accent_env)
    }

    fn process_snare(&mut self) -> f32 {
        if !self.snare_active {
            return 0.0;
        }
        self.snare_env *= self.snare_decay_coeff;
        if self.snare_env < 0.001 {
            self.snare_active = false;
            return 0.0;
        }
        let n = self.frand();
        self.snare_hp_z += self.snare_hp_coeff * (n - self.snare_hp_z);
        let noise_hp = n - self.snare_hp_z;

        self.snare_tone_phase += 185.0 * self.inv_sample_rate;
        if self.snare_tone_phase >= 1.0 {
            self.snare_tone_phase -= 1.0;
        }
        let tone = (2.0 * PI * self.snare_tone_phase).sin();

        (noise_hp * 0.65 + tone * 0.45) * self.snare_env * (0.7 + 0.5 * self.accent_env)
    }

    fn process_hat(&mut self) -> f32 {
        if !self.hat_active {
            return 0.0;
        }
        self.hat_env *= 0.9993;
        if self.hat_env < 0.0004 {
            self.hat_active = false;
            return 0.0;
        }
        self.hat_hp_z += self.hat_hp_coeff * (self.metal_signal - self.hat_hp_z);
        let hp = self.metal_signal - self.hat_hp_z;
        self.hat_prev = hp;
        hp * self.hat_env * 0.6 * (0.75 + 0.4 * self.accent_env)
    }

    fn process_open_hat(&mut self) -> f32 {
        if !self.open_hat_active {
            return 0.0;
        }
        self.open_hat_env *= 0.99975;
        if self.open_hat_env < 0.00035 {
            self.open_hat_active = false;
            return 0.0;
        }
        self.open_hat_hp_z += self.open_hat_hp_coeff * (self.metal_signal - self.open_hat_hp_z);
        let hp = self.metal_signal - self.open_hat_hp_z;
        self.open_hat_prev = hp;
        hp * self.open_hat_env * 0.68 * (0.75 + 0.4 * self.accent_env)
    }

    fn process_mid_tom(&mut self) -> f32 {
        if !self.mid_tom_active {
            return 0.0;
        }
        self.mid_tom_env *= self.mid_tom_decay_coeff;
        if self.mid_tom_env < 0.001 {
            self.mid_tom_active = false;
            return 0.0;
        }
        self.mid_tom_phase += 180.0 * self.inv_sample_rate;
        if self.mid_tom_phase >= 1.0 {
            self.mid_tom_phase -= 1.0;
        }
        (2.0 * PI * self.mid_tom_phase).sin() * self.mid_tom_env * (0.75 + 0.35 * self.accent_env)
    }

    fn process_high_tom(&mut self) -> f32 {
        if !self.high_tom_active {
            return 0.0;
        }
        self.high_tom_env *= self.high_tom_decay_coeff;
        if self.high_tom_env < 0.001 {
            self.high_tom_active = false;
            return 0.0;
        }
        self.high_tom_phase += 260.0 * self.inv_sample_rate;
        if self.high_tom_phase >= 1.0 {
            self.high_tom_phase -= 1.0;
        }
        (2.0 * PI * self.high_tom_phase).sin() * self.high_tom_env * (0.73 + 0.35 * self.accent_env)
    }

    /// Always silent; the original TR-606 has no clap voice.
    fn process_clap(&mut self) -> f32 {
        0.0
    }

    fn process_cymbal(&mut self) -> f32 {
        if !self.cymbal_active {
            return 0.0;
        }
        self.cymbal_env *= 0.9996;
        if self.cymbal_env < 0.00025 {
            self.cymbal_active = false;
            return 0.0;
        }
        self.cymbal_hp_z += self.cymbal_hp_coeff * (self.metal_signal - self.cymbal_hp_z);
        let hp = self.metal_signal - self.cymbal_hp_z;
        self.cymbal_prev = hp;
        hp * self.cymbal_env * 0.8 * (0.75 + 0.4 * self.accent_env)
    }

    /// Aliased straight to the cymbal voice, as in the original
    /// (`triggerRim` calls `triggerCymbal`, `processRim` calls
    /// `processCymbal`).
    fn process_rim(&mut self) -> f32 {
        self.process_cymbal()
    }

    pub fn process(&mut self, voice: DrumVoice) -> f32 {
        match voice {
            DrumVoice::Kick => self.process_kick(),
            DrumVoice::Snare => self.process_snare(),
            DrumVoice::ClosedHat => self.process_hat(),
            DrumVoice::OpenHat => self.process_open_hat(),
            DrumVoice::MidTom => self.process_mid_tom(),
            DrumVoice::HighTom => self.process_high_tom(),
            DrumVoice::Rim => self.process_rim(),
            DrumVoice::Clap => self.process_clap(),
            DrumVoice::Cymbal => self.process_cymbal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_is_always_silent() {
        let mut v = Tr606Voice::new(44_100.0);
        v.trigger(DrumVoice::Clap, true, 120);
        for _ in 0..100 {
            assert_eq!(v.process(DrumVoice::Clap), 0.0);
        }
    }

    #[test]
    fn rim_and_cymbal_share_output() {
        let mut a = Tr606Voice::new(44_100.0);
        let mut b = Tr606Voice::new(44_100.0);
        a.trigger(DrumVoice::Rim, true, 100);
        b.trigger(DrumVoice::Cymbal, true, 100);
        for _ in 0..20 {
            assert_eq!(a.process(DrumVoice::Rim), b.process(DrumVoice::Cymbal));
        }
    }

    #[test]
    fn kick_decays_to_silence() {
        let mut v = Tr606Voice::new(44_100.0);
        v.trigger(DrumVoice::Kick, false, 100);
        for _ in 0..44_100 {
            v.process(DrumVoice::Kick);
        }
        assert!(v.process(DrumVoice::Kick).abs() < 1e-6);
    }
}

//! TR-909-style 9-voice drum engine, ported from `TR909DrumSynthVoice` in
//! `mini_drumvoices.cpp`: punchier click-driven kick, fizzier snare, and a
//! six-burst analog clap.

use std::f32::consts::PI;

use super::{frand as shared_frand, AccentDistortion, Biquad, LoFiDrumFx};
use crate::dsp::distortion::Lcg;
use crate::param::Parameter;
use crate::pattern::drum::DrumVoice;

pub struct Tr909Voice {
    lofi_enabled: bool,
    lofi: LoFiDrumFx,
    noise: Lcg,
    accent_distortion: AccentDistortion,

    sample_rate: f32,
    inv_sample_rate: f32,

    pub main_volume: Parameter,

    kick_phase: f32,
    kick_freq: f32,
    kick_env_amp: f32,
    kick_env_pitch: f32,
    kick_active: bool,
    kick_accent_gain: f32,
    kick_accent_distortion: bool,
    kick_amp_decay: f32,
    kick_base_freq: f32,
    kick_click_env: f32,

    snare_env_amp: f32,
    snare_tone_env: f32,
    snare_active: bool,
    snare_bp: f32,
    snare_lp: f32,
    snare_tone_phase: f32,
    snare_tone_phase2: f32,
    snare_accent_gain: f32,
    snare_tone_gain: f32,
    snare_accent_distortion: bool,
    snare_noise_color: f32,

    hat_env_amp: f32,
    hat_tone_env: f32,
    hat_active: bool,
    hat_hp: f32,
    hat_prev: f32,
    hat_phase_a: f32,
    hat_phase_b: f32,
    hat_accent_gain: f32,
    hat_brightness: f32,
    hat_accent_distortion: bool,

    open_hat_env_amp: f32,
    open_hat_tone_env: f32,
    open_hat_active: bool,
    open_hat_hp: f32,
    open_hat_prev: f32,
    open_hat_phase_a: f32,
    open_hat_phase_b: f32,
    open_hat_accent_gain: f32,
    open_hat_brightness: f32,
    open_hat_accent_distortion: bool,

    mid_tom_phase: f32,
    mid_tom_env: f32,
    mid_tom_active: bool,
    mid_tom_accent_gain: f32,
    mid_tom_accent_distortion: bool,

    high_tom_phase: f32,
    high_tom_env: f32,
    high_tom_active: bool,
    high_tom_accent_gain: f32,
    high_tom_accent_distortion: bool,

    rim_phase: f32,
    rim_env: f32,
    rim_active: bool,
    rim_accent_gain: f32,
    rim_accent_distortion: bool,

    clap_env: f32,
    clap_time: f32,
    clap_active: bool,
    clap_accent_gain: f32,
    clap_accent_distortion: bool,
    clap_bandpass: Biquad,

    cymbal_env: f32,
    cymbal_tone_env: f32,
    cymbal_active: bool,
    cymbal_hp: f32,
    cymbal_prev: f32,
    cymbal_phase_a: f32,
    cymbal_phase_b: f32,
    cymbal_accent_gain: f32,
    cymbal_brightness: f32,
    cymbal_accent_distortion: bool,
}

impl Tr909Voice {
    pub fn new(sample_rate: f32) -> Self {
        let sr = if sample_rate > 0.0 { sample_rate } else { 44_100.0 };
        let mut v = Self {
            lofi_enabled: false,
            lofi: LoFiDrumFx::default(),
            noise: Lcg::new(54321),
            accent_distortion: AccentDistortion::new(2.2),
            sample_rate: sr,
            inv_sample_rate: 1.0 / sr,
            main_volume: Parameter::new(0.0, 1.0, 1.0 / 128.0, 0.8),
            kick_phase: 0.0,
            kick_freq: 60.0,
            kick_env_amp: 0.0,
            kick_env_pitch: 0.0,
            kick_active: false,
            kick_accent_gain: 1.0,
            kick_accent_distortion: false,
            kick_amp_decay: 0.99925,
            kick_base_freq: 48.0,
            kick_click_env: 0.0,
            snare_env_amp: 0.0,
            snare_tone_env: 0.0,
            snare_active: false,
            snare_bp: 0.0,
            snare_lp: 0.0,
            snare_tone_phase: 0.0,
            snare_tone_phase2: 0.0,
            snare_accent_gain: 1.0,
            snare_tone_gain: 1.0,
            snare_accent_distortion: false,
            snare_noise_color: 0.0,
            hat_env_amp: 0.0,
            hat_tone_env: 0.0,
            hat_active: false,
            hat_hp: 0.0,
            hat_prev: 0.0,
            hat_phase_a: 0.0,
            hat_phase_b: 0.0,
            hat_accent_gain: 1.0,
            hat_brightness: 1.0,
            hat_accent_distortion: false,
            open_hat_env_amp: 0.0,
            open_hat_tone_env: 0.0,
            open_hat_active: false,
            open_hat_hp: 0.0,
            open_hat_prev: 0.0,
            open_hat_phase_a: 0.0,
            open_hat_phase_b: 0.0,
            open_hat_accent_gain: 1.0,
            open_hat_brightness: 1.0,
            open_hat_accent_distortion: false,
            mid_tom_phase: 0.0,
            mid_tom_env: 0.0,
            mid_tom_active: false,
            mid_tom_accent_gain: 1.0,
            mid_tom_accent_distortion: false,
            high_tom_phase: 0.0,
            high_tom_env: 0.0,
            high_tom_active: false,
            high_tom_accent_gain: 1.0,
            high_tom_accent_distortion: false,
            rim_phase: 0.0,
            rim_env: 0.0,
            rim_active: false,
            rim_accent_gain: 1.0,
            rim_accent_distortion: false,
            clap_env: 0.0,
            clap_time: 0.0,
            clap_active: false,
            clap_accent_gain: 1.0,
            clap_accent_distortion: false,
            clap_bandpass: Biquad::default(),
            cymbal_env: 0.0,
            cymbal_tone_env: 0.0,
            cymbal_active: false,
            cymbal_hp: 0.0,
            cymbal_prev: 0.0,
            cymbal_phase_a: 0.0,
            cymbal_phase_b: 0.0,
            cymbal_accent_gain: 1.0,
            cymbal_brightness: 1.0,
            cymbal_accent_distortion: false,
        };
        v.update_clap_filter();
        v
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.sample_rate);
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sample_rate = if sr > 0.0 { sr } else { 44_100.0 };
        self.inv_sample_rate = 1.0 / self.sample_rate;
        self.update_clap_filter();
    }

    pub fn set_lofi_mode(&mut self, enabled: bool) {
        self.lofi_enabled = enabled;
        self.lofi.set_enabled(enabled);
    }

    pub fn set_lofi_amount(&mut self, amount: f32) {
        self.lofi.set_amount(amount);
    }

    fn frand(&mut self) -> f32 {
        shared_frand(&mut self.noise)
    }

    fn update_clap_filter(&mut self) {
        self.clap_bandpass.set_bandpass(1800.0, 1.0, self.inv_sample_rate);
    }

    pub fn trigger(&mut self, voice: DrumVoice, accent: bool, _velocity: u8) {
        match voice {
            DrumVoice::Kick => {
                self.kick_active = true;
                self.kick_phase = 0.0;
                self.kick_env_amp = if accent { 1.35 } else { 1.15 };
                self.kick_env_pitch = 0.85;
                self.kick_freq = 58.0;
                self.kick_accent_gain = if accent { 1.2 } else { 1.0 };
                self.kick_accent_distortion = accent;
                self.kick_amp_decay = if accent { 0.99935 } else { 0.99925 };
                self.kick_base_freq = if accent { 46.0 } else { 48.0 };
                self.kick_click_env = if accent { 1.0 } else { 0.85 };
            }
            DrumVoice::Snare => {
                self.snare_active = true;
                self.snare_env_amp = if accent { 1.25 } else { 1.0 };
                self.snare_tone_env = if accent { 1.25 } else { 1.0 };
                self.snare_tone_phase = 0.0;
                self.snare_tone_phase2 = 0.0;
                self.snare_accent_gain = if accent { 1.15 } else { 1.0 };
                self.snare_tone_gain = if accent { 1.35 } else { 1.0 };
                self.snare_accent_distortion = accent;
                self.snare_noise_color = 0.0;
            }
            DrumVoice::ClosedHat => {
                self.hat_active = true;
                self.hat_env_amp = if accent { 0.6 } else { 0.42 };
                self.hat_tone_env = 1.0;
                self.hat_phase_a = 0.0;
                self.hat_phase_b = 0.33;
                self.hat_accent_gain = if accent { 1.35 } else { 1.0 };
                self.hat_brightness = if accent { 1.6 } else { 1.25 };
                self.hat_accent_distortion = accent;
                self.open_hat_env_amp *= 0.25;
            }
            DrumVoice::OpenHat => {
                self.open_hat_active = true;
                self.open_hat_env_amp = if accent { 0.9995 } else { 0.95 };
                self.open_hat_tone_env = 1.0;
                self.open_hat_phase_a = 0.0;
                self.open_hat_phase_b = 0.29;
                self.open_hat_accent_gain = if accent { 1.25 } else { 1.0 };
                self.open_hat_brightness = if accent { 1.35 } else { 1.1 };
                self.open_hat_accent_distortion = accent;
            }
            DrumVoice::MidTom => {
                self.mid_tom_active = true;
                self.mid_tom_env = 1.0;
                self.mid_tom_phase = 0.0;
                self.mid_tom_accent_gain = if accent { 1.3 } else { 1.0 };
                self.mid_tom_accent_distortion = accent;
            }
            DrumVoice::HighTom => {
                self.high_tom_active = true;
                self.high_tom_env = 1.0;
                self.high_tom_phase = 0.0;
                self.high_tom_accent_gain = if accent { 1.3 } else { 1.0 };
                self.high_tom_accent_distortion = accent;
            }
            DrumVoice::Rim => {
                self.rim_active = true;
                self.rim_env = 1.0;
                self.rim_phase = 0.0;
                self.rim_accent_gain = if accent { 1.35 } else { 1.0 };
                self.rim_accent_distortion = accent;
            }
            DrumVoice::Clap => {
                self.clap_active = true;
                self.clap_env = 1.0;
                self.clap_time = 0.0;
                self.clap_accent_gain = if accent { 1.35 } else { 1.0 };
                self.clap_accent_distortion = accent;
                self.clap_bandpass.reset();
            }
            DrumVoice::Cymbal => {
                self.cymbal_active = true;
                self.cymbal_env = if accent { 0.95 } else { 0.75 };
                self.cymbal_tone_env = 1.0;
                self.cymbal_phase_a = 0.0;
                self.cymbal_phase_b = 0.27;
                self.cymbal_accent_gain = if accent { 1.3 } else { 1.0 };
                self.cymbal_brightness = if accent { 1.55 } else { 1.25 };
                self.cymbal_accent_distortion = accent;
            }
        }
    }

    fn apply_accent_distortion(&self, input: f32, accent: bool) -> f32 {
        self.accent_distortion.process(input, accent)
    }

    fn process_kick(&mut self) -> f32 {
        if !self.kick_active {
            return 0.0;
        }
        self.kick_env_amp *= self.kick_amp_decay;
        self.kick_env_pitch *= 0.996;
        self.kick_click_env *= 0.94;
        if self.kick_env_amp < 0.0008 {
            self.kick_active = false;
            return 0.0;
        }
        let pitch_factor = self.kick_env_pitch * self.kick_env_pitch;
        self.kick_freq = self.kick_base_freq + 140.0 * pitch_factor;
        self.kick_phase += self.kick_freq * self.inv_sample_rate;
        if self.kick_phase >= 1.0 {
            self.kick_phase -= 1.0;
        }
        let body = (2.0 * PI * self.kick_phase).sin();
        let transient = (2.0 * PI * self.kick_phase * 4.0).sin() * pitch_factor * 0.2;
        let click = (self.frand() * 0.4 + 0.6) * self.kick_click_env * 0.2;
        let driven = (body * (2.4 + 0.7 * self.kick_env_amp)).tanh();
        let out = (driven * 0.9 + transient + click) * self.kick_env_amp * self.kick_accent_gain;
        let res = self.apply_accent_distortion(out, self.kick_accent_distortion);
        if self.lofi_enabled {
            self.lofi.process(res, DrumVoice::Kick)
        } else {
            res
        }
    }

    fn process_snare(&mut self) -> f32 {
        if !self.snare_active {
            return 0.0;
        }
        self.snare_env_amp *= 0.9976;
        self.snare_tone_env *= 0.99965;
        if self.snare_env_amp < 0.00025 {
            self.snare_active = false;
            return 0.0;
        }
        let n = self.frand();
        let f = 0.32;
        self.snare_bp += f * (n - self.snare_lp - 0.18 * self.snare_bp);
        self.snare_lp += f * self.snare_bp;
        let noise_hp = n - self.snare_lp;
        self.snare_noise_color = 0.92 * self.snare_noise_color + 0.08 * noise_hp;
        let noise_out = self.snare_bp * 0.25 + self.snare_noise_color * 0.75;

        self.snare_tone_phase += 330.0 * self.inv_sample_rate;
        if self.snare_tone_phase >= 1.0 {
            self.snare_tone_phase -= 1.0;
        }
        self.snare_tone_phase2 += 200.0 * self.inv_sample_rate;
        if self.snare_tone_phase2 >= 1.0 {
            self.snare_tone_phase2 -= 1.0;
        }
        let tone_a = (2.0 * PI * self.snare_tone_phase).sin();
        let tone_b = (2.0 * PI * self.snare_tone_phase2).sin();
        let tone = (tone_a * 0.6 + tone_b * 0.4) * self.snare_tone_env * self.snare_tone_gain;

        let mut out = (noise_out * 0.6 + tone * 0.85) * 1.25;
        out *= self.snare_env_amp * self.snare_accent_gain;
        self.apply_accent_distortion(out, self.snare_accent_distortion)
    }

    fn process_hat(&mut self) -> f32 {
        if !self.hat_active {
            return 0.0;
        }
        self.hat_env_amp *= 0.996;
        self.hat_tone_env *= 0.9;
        if self.hat_env_amp < 0.00045 {
            self.hat_active = false;
            return 0.0;
        }
        let n = self.frand();
        let alpha = 0.95;
        self.hat_hp = alpha * (self.hat_hp + n - self.hat_prev);
        self.hat_prev = n;

        self.hat_phase_a += 8000.0 * self.inv_sample_rate;
        if self.hat_phase_a >= 1.0 {
            self.hat_phase_a -= 1.0;
        }
        self.hat_phase_b += 10400.0 * self.inv_sample_rate;
        if self.hat_phase_b >= 1.0 {
            self.hat_phase_b -= 1.0;
        }
        let tone = ((2.0 * PI * self.hat_phase_a).sin() + (2.0 * PI * self.hat_phase_b).sin())
            * 0.5
            * self.hat_tone_env
            * self.hat_brightness;

        let mut out = self.hat_hp * 0.6 + tone * 0.85;
        out *= self.hat_env_amp * 0.55 * self.hat_accent_gain;
        self.apply_accent_distortion(out, self.hat_accent_distortion)
    }

    fn process_open_hat(&mut self) -> f32 {
        if !self.open_hat_active {
            return 0.0;
        }
        self.open_hat_env_amp *= 0.99955;
        self.open_hat_tone_env *= 0.93;
        if self.open_hat_env_amp < 0.00035 {
            self.open_hat_active = false;
            return 0.0;
        }
        let n = self.frand();
        let alpha = 0.955;
        self.open_hat_hp = alpha * (self.open_hat_hp + n - self.open_hat_prev);
        self.open_hat_prev = n;

        self.open_hat_phase_a += 6200.0 * self.inv_sample_rate;
        if self.open_hat_phase_a >= 1.0 {
            self.open_hat_phase_a -= 1.0;
        }
        self.open_hat_phase_b += 8200.0 * self.inv_sample_rate;
        if self.open_hat_phase_b >= 1.0 {
            self.open_hat_phase_b -= 1.0;
        }
        let tone = ((2.0 * PI * self.open_hat_phase_a).sin() + (2.0 * PI * self.open_hat_phase_b).sin())
            * 0.5
            * self.open_hat_tone_env
            * self.open_hat_brightness;

        let mut out = self.open_hat_hp * 0.5 + tone * 1.05;
        out *= self.open_hat_env_amp * 0.65 * self.open_hat_accent_gain;
        self.apply_accent_distortion(out, self.open_hat_accent_distortion)
    }

    fn process_mid_tom(&mut self) -> f32 {
        if !self.mid_tom_active {
            return 0.0;
        }
        self.mid_tom_env *= 0.9989;
        if self.mid_tom_env < 0.0003 {
            self.mid_tom_active = false;
            return 0.0;
        }
        self.mid_tom_phase += 200.0 * self.inv_sample_rate;
        if self.mid_tom_phase >= 1.0 {
            self.mid_tom_phase -= 1.0;
        }
        let tone = (2.0 * PI * self.mid_tom_phase).sin();
        let slight_noise = self.frand() * 0.03;
        let out = (tone * 0.92 + slight_noise) * self.mid_tom_env * 0.8 * self.mid_tom_accent_gain;
        self.apply_accent_distortion(out, self.mid_tom_accent_distortion)
    }

    fn process_high_tom(&mut self) -> f32 {
        if !self.high_tom_active {
            return 0.0;
        }
        self.high_tom_env *= 0.9988;
        if self.high_tom_env < 0.0003 {
            self.high_tom_active = false;
            return 0.0;
        }
        self.high_tom_phase += 280.0 * self.inv_sample_rate;
        if self.high_tom_phase >= 1.0 {
            self.high_tom_phase -= 1.0;
        }
        let tone = (2.0 * PI * self.high_tom_phase).sin();
        let slight_noise = self.frand() * 0.025;
        let out = (tone * 0.9 + slight_noise) * self.high_tom_env * 0.78 * self.high_tom_accent_gain;
        self.apply_accent_distortion(out, self.high_tom_accent_distortion)
    }

    fn process_rim(&mut self) -> f32 {
        if !self.rim_active {
            return 0.0;
        }
        self.rim_env *= 0.9975;
        if self.rim_env < 0.00035 {
            self.rim_active = false;
            return 0.0;
        }
        self.rim_phase += 1200.0 * self.inv_sample_rate;
        if self.rim_phase >= 1.0 {
            self.rim_phase -= 1.0;
        }
        let tone = (2.0 * PI * self.rim_phase).sin();
        let click = (self.frand() * 0.5 + 0.5) * self.rim_env;
        let out = (tone * 0.6 + click) * self.rim_env * 0.85 * self.rim_accent_gain;
        self.apply_accent_distortion(out, self.rim_accent_distortion)
    }

    fn process_clap(&mut self) -> f32 {
        if !self.clap_active {
            return 0.0;
        }
        self.clap_env *= 0.9988;
        self.clap_time += self.inv_sample_rate;
        if self.clap_env < 0.0002 {
            self.clap_active = false;
            return 0.0;
        }
        let mut bursts = 0.0;
        const BURST_SPACING: f32 = 0.006;
        const BURST_LENGTH: f32 = 0.0008;
        for i in 0..6 {
            let start = i as f32 * BURST_SPACING;
            if self.clap_time >= start && self.clap_time < start + BURST_LENGTH {
                let local_t = (self.clap_time - start) / BURST_LENGTH;
                bursts += self.frand() * (1.0 - local_t);
            }
        }
        let tail = if self.clap_time >= 0.02 {
            let t = self.clap_time - 0.02;
            self.frand() * (-t * 18.0).exp()
        } else {
            0.0
        };
        let mut out = self.clap_bandpass.process(bursts + tail);
        out *= self.clap_env * self.clap_accent_gain;
        self.apply_accent_distortion(out, self.clap_accent_distortion)
    }

    fn process_cymbal(&mut self) -> f32 {
        if !self.cymbal_active {
            return 0.0;
        }
        self.cymbal_env *= 0.99935;
        self.cymbal_tone_env *= 0.97;
        if self.cymbal_env < 0.00025 {
            self.cymbal_active = false;
            return 0.0;
        }
        let n = self.frand();
        let alpha = 0.955;
        self.cymbal_hp = alpha * (self.cymbal_hp + n - self.cymbal_prev);
        self.cymbal_prev = n;

        self.cymbal_phase_a += 6400.0 * self.inv_sample_rate;
        if self.cymbal_phase_a >= 1.0 {
            self.cymbal_phase_a -= 1.0;
        }
        self.cymbal_phase_b += 9800.0 * self.inv_sample_rate;
        if self.cymbal_phase_b >= 1.0 {
            self.cymbal_phase_b -= 1.0;
        }
        let tone = ((2.0 * PI * self.cymbal_phase_a).sin() + (2.0 * PI * self.cymbal_phase_b).sin())
            * 0.5
            * self.cymbal_tone_env
            * self.cymbal_brightness;

        let mut out = self.cymbal_hp * 0.55 + tone * 1.05;
        out *= self.cymbal_env * self.cymbal_accent_gain;
        self.apply_accent_distortion(out, self.cymbal_accent_distortion)
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
    fn snare_produces_sound_and_settles() {
        let mut v = Tr909Voice::new(22_050.0);
        v.trigger(DrumVoice::Snare, false, 100);
        let mut heard = false;
        for _ in 0..50_000 {
            if v.process(DrumVoice::Snare).abs() > 0.0001 {
                heard = true;
            }
        }
        assert!(heard);
    }
}

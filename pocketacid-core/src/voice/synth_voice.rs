//! Acid bassline synth voice (spec §4.3), ported from `mini_tb303.cpp`.

use serde::{Deserialize, Serialize};

use crate::dsp::distortion::Lcg;
use crate::dsp::filter::{DiodeFilter, LadderFilter, StateVariableFilter};
use crate::dsp::wavetable::{lookup_saw, lookup_square, phase_increment};
use crate::param::Parameter;

/// The groovebox-wide sound character, set on `Scene` and mirrored onto each
/// voice; gates the LoFi degradation stage ported from `mini_tb303.cpp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GrooveboxMode {
    #[default]
    Acid,
    Minimal,
}

const SUPER_SAW_OSC_COUNT: usize = 6;
const SUPER_SAW_DETUNE: [f32; SUPER_SAW_OSC_COUNT] = [-0.019, 0.019, -0.012, 0.012, -0.0065, 0.0065];
/// `ln(0.01)`, the envelope's practical "off" target.
const DECAY_TARGET_LOG: f32 = -4.605_170_19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oscillator {
    Saw = 0,
    Square = 1,
    SuperSaw = 2,
    Pulse = 3,
    Sub = 4,
}

impl Oscillator {
    fn from_index(i: usize) -> Self {
        match i {
            1 => Oscillator::Square,
            2 => Oscillator::SuperSaw,
            3 => Oscillator::Pulse,
            4 => Oscillator::Sub,
            _ => Oscillator::Saw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Svf = 0,
    Diode = 1,
    Ladder = 2,
}

/// The filter slot: a static tagged variant, per spec §9 design notes, to
/// avoid virtual dispatch in the hot loop.
#[derive(Debug, Clone, Copy)]
enum FilterSlot {
    Svf(StateVariableFilter),
    Diode(DiodeFilter),
    Ladder(LadderFilter),
}

impl FilterSlot {
    fn new(kind: FilterType, sample_rate: f32) -> Self {
        match kind {
            FilterType::Svf => FilterSlot::Svf(StateVariableFilter::new(sample_rate)),
            FilterType::Diode => FilterSlot::Diode(DiodeFilter::new(sample_rate)),
            FilterType::Ladder => FilterSlot::Ladder(LadderFilter::new(sample_rate)),
        }
    }

    fn reset(&mut self) {
        match self {
            FilterSlot::Svf(f) => f.reset(),
            FilterSlot::Diode(f) => f.reset(),
            FilterSlot::Ladder(f) => f.reset(),
        }
    }

    fn set_sample_rate(&mut self, sr: f32) {
        match self {
            FilterSlot::Svf(f) => f.set_sample_rate(sr),
            FilterSlot::Diode(f) => f.set_sample_rate(sr),
            FilterSlot::Ladder(f) => f.set_sample_rate(sr),
        }
    }

    fn process(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        match self {
            FilterSlot::Svf(f) => f.process_lp(input, cutoff_hz, resonance),
            FilterSlot::Diode(f) => f.process(input, cutoff_hz, resonance),
            FilterSlot::Ladder(f) => f.process(input, cutoff_hz, resonance),
        }
    }
}

pub struct SynthVoice {
    sample_rate: f32,
    inv_sample_rate: f32,
    nyquist: f32,

    pub cutoff: Parameter,
    pub resonance: Parameter,
    pub env_amount: Parameter,
    pub env_decay: Parameter,
    pub oscillator: Parameter,
    pub filter_type: Parameter,
    pub main_volume: Parameter,

    phase_acc: u32,
    super_phases_acc: [u32; SUPER_SAW_OSC_COUNT],

    freq: f32,
    target_freq: f32,
    slide_speed: f32,
    env: f32,
    gate: bool,
    slide: bool,
    amp: f32,

    sub_enabled: bool,
    sub_phase: f32,
    sub_mix: f32,
    sub_lpf_prev: f32,

    filter: FilterSlot,
    last_filter_type: usize,

    mode: GrooveboxMode,
    lofi_amount: f32,
    noise_amount: f32,
    noise: Lcg,

    bass_boost_z1: f32,
}

impl SynthVoice {
    pub fn new(sample_rate: f32) -> Self {
        let mut v = Self {
            sample_rate,
            inv_sample_rate: 1.0 / sample_rate,
            nyquist: sample_rate * 0.5,
            cutoff: Parameter::new(60.0, 2500.0, (2500.0 - 60.0) / 128.0, 800.0),
            resonance: Parameter::new(0.05, 0.85, (0.85 - 0.05) / 128.0, 0.0),
            env_amount: Parameter::new(0.0, 2000.0, 2000.0 / 128.0, 400.0),
            env_decay: Parameter::new(20.0, 2200.0, (2200.0 - 20.0) / 128.0, 420.0),
            oscillator: Parameter::new_options(&["saw", "sqr", "super", "pulse", "sub"], 0),
            filter_type: Parameter::new_options(&["lp1", "acid", "moog"], 0),
            main_volume: Parameter::new(0.0, 1.0, 1.0 / 128.0, 0.8),
            phase_acc: 0,
            super_phases_acc: [0; SUPER_SAW_OSC_COUNT],
            freq: 110.0,
            target_freq: 110.0,
            slide_speed: 0.001,
            env: 0.0,
            gate: false,
            slide: false,
            amp: 0.3,
            sub_enabled: false,
            sub_phase: 0.0,
            sub_mix: 0.3,
            sub_lpf_prev: 0.0,
            filter: FilterSlot::new(FilterType::Svf, sample_rate),
            last_filter_type: 0,
            mode: GrooveboxMode::Acid,
            lofi_amount: 0.0,
            noise_amount: 0.0,
            noise: Lcg::new(0xACE1),
            bass_boost_z1: 0.0,
        };
        for (i, p) in v.super_phases_acc.iter_mut().enumerate() {
            let seed = (i as f32 + 1.0) * 0.137;
            *p = (seed.fract() * 4_294_967_296.0) as u32;
        }
        v
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sample_rate = if sr > 0.0 { sr } else { 44_100.0 };
        self.inv_sample_rate = 1.0 / self.sample_rate;
        self.nyquist = self.sample_rate * 0.5;
        self.filter.set_sample_rate(self.sample_rate);
    }

    pub fn reset(&mut self) {
        self.phase_acc = 0;
        self.freq = 110.0;
        self.target_freq = 110.0;
        self.env = 0.0;
        self.gate = false;
        self.slide = false;
        self.amp = 0.3;
        self.filter.reset();
    }

    pub fn set_mode(&mut self, mode: GrooveboxMode) {
        self.mode = mode;
    }

    pub fn set_lofi_amount(&mut self, amount: f32) {
        self.lofi_amount = amount;
    }

    pub fn set_sub_oscillator(&mut self, enabled: bool) {
        self.sub_enabled = enabled;
        if !enabled {
            self.sub_phase = 0.0;
        }
    }

    pub fn freq(&self) -> f32 {
        self.freq
    }

    pub fn is_gated(&self) -> bool {
        self.gate
    }

    /// `startNote(freq, accent, slide, velocity)` (spec §4.3).
    pub fn start_note(&mut self, freq_hz: f32, accent: bool, slide: bool, velocity: u8) {
        self.slide = slide;
        if !slide {
            self.freq = freq_hz;
        }
        self.target_freq = freq_hz;
        self.gate = true;
        self.env = if accent { 2.0 } else { 1.0 };
        self.amp = 0.3 * (velocity as f32 / 100.0);
    }

    pub fn release(&mut self) {
        self.gate = false;
    }

    fn osc_saw(&mut self) -> f32 {
        let out = lookup_saw(self.phase_acc);
        self.phase_acc = self.phase_acc.wrapping_add(phase_increment(self.freq));
        out
    }

    fn osc_square(&mut self) -> f32 {
        let saw = self.osc_saw();
        if saw >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    fn osc_pulse(&mut self) -> f32 {
        let out = lookup_square(self.phase_acc);
        self.phase_acc = self.phase_acc.wrapping_add(phase_increment(self.freq));
        out
    }

    fn osc_sub(&mut self) -> f32 {
        let saw = lookup_saw(self.phase_acc);
        self.phase_acc = self.phase_acc.wrapping_add(phase_increment(self.freq));
        self.sub_phase += (self.freq * 0.5) * self.inv_sample_rate;
        if self.sub_phase >= 1.0 {
            self.sub_phase -= 1.0;
        }
        let sub = if self.sub_phase < 0.5 { 1.0 } else { -1.0 };
        saw * 0.7 + sub * 0.3
    }

    fn osc_super_saw(&mut self) -> f32 {
        let mut sum = lookup_saw(self.phase_acc);
        self.phase_acc = self.phase_acc.wrapping_add(phase_increment(self.freq));
        for i in 0..SUPER_SAW_OSC_COUNT {
            let detuned_freq = self.freq * (1.0 + SUPER_SAW_DETUNE[i]);
            let inc = phase_increment(detuned_freq);
            self.super_phases_acc[i] = self.super_phases_acc[i].wrapping_add(inc);
            sum += lookup_saw(self.super_phases_acc[i]);
        }
        let gain = 1.0 / (SUPER_SAW_OSC_COUNT as f32 - 5.0);
        sum * gain
    }

    fn oscillator_index(&self) -> usize {
        self.oscillator.option_index()
    }

    fn oscillator_sample(&mut self) -> f32 {
        let osc = Oscillator::from_index(self.oscillator_index());
        let out = match osc {
            Oscillator::Square => self.osc_square(),
            Oscillator::SuperSaw => self.osc_super_saw(),
            Oscillator::Pulse => self.osc_pulse(),
            Oscillator::Sub => self.osc_sub(),
            Oscillator::Saw => {
                let mut o = self.osc_saw();
                if matches!(self.mode, GrooveboxMode::Minimal) {
                    if o > 0.5 {
                        o = 0.5 + (o - 0.5) * 0.2;
                    } else if o < -0.5 {
                        o = -0.5 + (o + 0.5) * 0.2;
                    }
                }
                o
            }
        };

        out
    }

    fn update_filter_model(&mut self) {
        let current = self.filter_type.option_index();
        if current == self.last_filter_type {
            return;
        }
        let kind = match current {
            1 => FilterType::Diode,
            2 => FilterType::Ladder,
            _ => FilterType::Svf,
        };
        self.filter = FilterSlot::new(kind, self.sample_rate);
        self.last_filter_type = current;
    }

    fn svf_process(&mut self, input: f32) -> f32 {
        self.update_filter_model();

        self.freq += (self.target_freq - self.freq) * self.slide_speed;
        if !self.freq.is_finite() {
            self.freq = self.target_freq;
        }

        if self.gate || self.env > 0.0001 {
            let decay_ms = self.env_decay.value();
            let decay_samples = (decay_ms * self.sample_rate * 0.001).max(1.0);
            let decay_coeff = (DECAY_TARGET_LOG / decay_samples).exp();
            self.env *= decay_coeff;
        }

        let mut cutoff_hz = self.cutoff.value() + self.env_amount.value() * self.env;
        cutoff_hz = cutoff_hz.max(50.0);
        let max_cutoff = self.nyquist * 0.9;
        cutoff_hz = cutoff_hz.min(max_cutoff);

        self.filter.process(input, cutoff_hz, self.resonance.value())
    }

    fn apply_lofi_degradation(&mut self, input: f32) -> f32 {
        if matches!(self.mode, GrooveboxMode::Acid) || self.lofi_amount <= 0.001 {
            return input;
        }
        let mut out = input;
        let bits = 12.0 - self.lofi_amount * 6.0;
        let levels = 2f32.powf(bits);
        out = (out * levels + 0.5).floor() / levels;

        let noise = self.noise.next_noise();
        out += noise * 0.01 * self.lofi_amount;
        out += 0.005 * self.lofi_amount;

        if out > 0.4 {
            out = 0.4 + (out - 0.4) * 0.3;
        } else if out < -0.4 {
            out = -0.4 + (out + 0.4) * 0.3;
        }
        out
    }

    /// `process() -> float` (spec §4.3).
    pub fn process(&mut self) -> f32 {
        if !self.gate && self.env < 0.0001 {
            return 0.0;
        }

        let is_sub_osc = self.oscillator_index() == Oscillator::Sub as usize;
        let main_osc = self.oscillator_sample();

        let mut final_osc = main_osc;
        if self.sub_enabled && !is_sub_osc {
            self.sub_phase += (self.freq * 0.5) * self.inv_sample_rate;
            if self.sub_phase >= 1.0 {
                self.sub_phase -= 1.0;
            }
            let mut sub = if self.sub_phase < 0.5 { 1.0 } else { -1.0 };
            self.sub_lpf_prev += 0.2 * (sub - self.sub_lpf_prev);
            sub = self.sub_lpf_prev;
            final_osc = main_osc * (1.0 - self.sub_mix) + sub * self.sub_mix;
        }

        let mut out = self.svf_process(final_osc);

        if matches!(self.mode, GrooveboxMode::Minimal) {
            out = self.apply_lofi_degradation(out);
        }

        if self.noise_amount > 0.001 {
            let noise = self.noise.next_noise() * 2.0;
            out += noise * self.noise_amount;
            out += 0.01 * self.noise_amount;
        }

        out = self.bass_boost(out);

        out * self.amp
    }

    /// Low-shelf bass boost, matching `mini_tb303.cpp`'s `bassBoost_`
    /// (cutoff 0.01 normalized, boost 1.25x).
    fn bass_boost(&mut self, input: f32) -> f32 {
        const CUTOFF: f32 = 0.01;
        const BOOST: f32 = 1.25;
        self.bass_boost_z1 += CUTOFF * (input - self.bass_boost_z1);
        input + self.bass_boost_z1 * (BOOST - 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_until_note_started() {
        let mut v = SynthVoice::new(22_050.0);
        assert_eq!(v.process(), 0.0);
    }

    #[test]
    fn start_note_produces_sound_then_decays_to_silence() {
        let mut v = SynthVoice::new(22_050.0);
        v.start_note(110.0, false, false, 100);
        let mut saw_nonzero = false;
        for _ in 0..200 {
            if v.process() != 0.0 {
                saw_nonzero = true;
            }
        }
        assert!(saw_nonzero);
        v.release();
        for _ in 0..200_000 {
            v.process();
        }
        assert!(!v.is_gated());
    }

    #[test]
    fn slide_retains_previous_frequency_until_it_glides() {
        let mut v = SynthVoice::new(22_050.0);
        v.start_note(110.0, false, false, 100);
        assert!((v.freq() - 110.0).abs() < 0.01);
        v.start_note(220.0, false, true, 100);
        assert!((v.freq() - 110.0).abs() < 0.01);
        for _ in 0..10_000 {
            v.process();
        }
        assert!((v.freq() - 220.0).abs() < 1.0);
    }

    #[test]
    fn filter_hot_swap_does_not_panic() {
        let mut v = SynthVoice::new(22_050.0);
        v.start_note(110.0, true, false, 100);
        for i in 0..3 {
            v.filter_type.set_value(i as f32);
            for _ in 0..100 {
                let out = v.process();
                assert!(out.is_finite());
            }
        }
    }
}

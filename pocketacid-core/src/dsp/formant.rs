//! Formant voice (spec §4.7), ported from `formant_synth.cpp`: three
//! parallel biquad bandpass formants excited by a pulse train (voiced) or
//! noise (unvoiced), morphed between phoneme targets.

const MAX_CUSTOM_PHRASES: usize = 16;
const MAX_PHRASE_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct Formant {
    pub freq: [f32; 3],
    pub amp: [f32; 3],
    pub bw: [f32; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct Phoneme {
    pub symbol: char,
    pub formant: Formant,
    pub duration_ms: f32,
    pub voiced: bool,
}

macro_rules! phoneme {
    ($sym:expr, $f1:expr, $f2:expr, $f3:expr, $a1:expr, $a2:expr, $a3:expr, $b1:expr, $b2:expr, $b3:expr, $dur:expr, $voiced:expr) => {
        Phoneme {
            symbol: $sym,
            formant: Formant {
                freq: [$f1 as f32, $f2 as f32, $f3 as f32],
                amp: [$a1, $a2, $a3],
                bw: [$b1 as f32, $b2 as f32, $b3 as f32],
            },
            duration_ms: $dur as f32,
            voiced: $voiced,
        }
    };
}

pub const VOWEL_PHONEMES: [Phoneme; 8] = [
    phoneme!('a', 730, 1090, 2440, 1.0, 0.5, 0.2, 80, 90, 120, 120, true),
    phoneme!('e', 530, 1840, 2480, 1.0, 0.6, 0.3, 60, 90, 120, 100, true),
    phoneme!('i', 350, 2300, 3010, 1.0, 0.5, 0.3, 60, 90, 100, 90, true),
    phoneme!('o', 570, 840, 2410, 1.0, 0.7, 0.3, 70, 80, 100, 120, true),
    phoneme!('u', 440, 1020, 2240, 1.0, 0.5, 0.3, 70, 80, 100, 100, true),
    phoneme!('@', 520, 1550, 2550, 1.0, 0.5, 0.3, 60, 90, 120, 60, true),
    phoneme!('A', 660, 1720, 2410, 1.0, 0.6, 0.2, 80, 90, 120, 100, true),
    phoneme!('O', 610, 920, 2580, 1.0, 0.5, 0.3, 70, 80, 100, 110, true),
];

pub const CONSONANT_PHONEMES: [Phoneme; 18] = [
    phoneme!('s', 4000, 6000, 8000, 0.3, 0.4, 0.5, 200, 300, 400, 120, false),
    phoneme!('z', 3500, 5500, 7500, 0.3, 0.4, 0.5, 200, 300, 400, 100, true),
    phoneme!('f', 1200, 4000, 6000, 0.2, 0.3, 0.2, 300, 400, 500, 100, false),
    phoneme!('v', 1100, 3800, 5800, 0.2, 0.3, 0.2, 300, 400, 500, 90, true),
    phoneme!('t', 3000, 5000, 7000, 0.5, 0.3, 0.2, 150, 200, 300, 40, false),
    phoneme!('d', 2000, 3500, 5000, 0.6, 0.4, 0.2, 150, 200, 300, 50, true),
    phoneme!('k', 2500, 4000, 6000, 0.4, 0.3, 0.2, 200, 250, 350, 50, false),
    phoneme!('g', 2400, 3800, 5800, 0.4, 0.3, 0.2, 200, 250, 350, 60, true),
    phoneme!('n', 250, 1700, 2600, 0.7, 0.5, 0.3, 100, 120, 150, 80, true),
    phoneme!('m', 250, 900, 2200, 0.8, 0.4, 0.2, 100, 100, 150, 80, true),
    phoneme!('l', 400, 1200, 2800, 0.6, 0.5, 0.3, 80, 100, 120, 70, true),
    phoneme!('r', 400, 1200, 1800, 0.6, 0.5, 0.3, 80, 100, 120, 70, true),
    phoneme!('p', 2000, 4500, 7000, 0.5, 0.3, 0.2, 150, 200, 300, 30, false),
    phoneme!('b', 1800, 4200, 6800, 0.5, 0.3, 0.2, 150, 200, 300, 40, true),
    phoneme!('w', 380, 840, 2200, 0.6, 0.4, 0.3, 70, 80, 100, 60, true),
    phoneme!('y', 350, 2300, 3010, 0.6, 0.5, 0.4, 60, 90, 100, 50, true),
    phoneme!('h', 500, 1500, 2500, 0.1, 0.1, 0.1, 200, 300, 400, 60, false),
    phoneme!(' ', 500, 1500, 2500, 0.0, 0.0, 0.0, 100, 100, 100, 80, false),
];

fn lookup_phoneme(symbol: char) -> Phoneme {
    for p in VOWEL_PHONEMES.iter() {
        if p.symbol == symbol {
            return *p;
        }
    }
    for p in CONSONANT_PHONEMES.iter() {
        if p.symbol == symbol {
            return *p;
        }
    }
    let lower = symbol.to_ascii_lowercase();
    for p in VOWEL_PHONEMES.iter() {
        if p.symbol == lower {
            return *p;
        }
    }
    CONSONANT_PHONEMES[17]
}

#[derive(Debug, Clone, Copy, Default)]
struct BandpassFilter {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
    a0: f32,
    a2: f32,
    b1: f32,
    b2: f32,
}

impl BandpassFilter {
    fn set_params(&mut self, freq: f32, bandwidth: f32, gain: f32, sample_rate: f32) {
        let freq = freq.clamp(20.0, sample_rate * 0.45);
        let bandwidth = bandwidth.max(10.0);
        let omega = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let q = freq / bandwidth;
        let alpha = sin_omega / (2.0 * q);
        let norm = 1.0 / (1.0 + alpha);
        self.a0 = alpha * gain * norm;
        self.a2 = -alpha * gain * norm;
        self.b1 = -2.0 * cos_omega * norm;
        self.b2 = (1.0 - alpha) * norm;
    }

    fn process(&mut self, input: f32) -> f32 {
        let output = self.a0 * input + self.a2 * self.x2 - self.b1 * self.y1 - self.b2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        if self.y1.abs() < 1e-15 {
            self.y1 = 0.0;
        }
        if self.y2.abs() < 1e-15 {
            self.y2 = 0.0;
        }
        output
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct FormantVoice {
    sample_rate: f32,
    pitch: f32,
    phase: f32,
    pub speed: f32,
    pub robotness: f32,
    pub volume: f32,
    current: Phoneme,
    target: Phoneme,
    morph_progress: f32,
    morph_samples: f32,
    formants: [BandpassFilter; 3],
    active: bool,
    speaking: bool,
    text: Vec<char>,
    text_pos: usize,
    phoneme_samples_remaining: f32,
    vibrato_phase: f32,
    custom_phrases: Vec<String>,
    noise_state: u32,
    current_level: f32,
}

impl FormantVoice {
    pub fn new(sample_rate: f32) -> Self {
        let silence = lookup_phoneme(' ');
        let mut v = Self {
            sample_rate,
            pitch: 120.0,
            phase: 0.0,
            speed: 1.0,
            robotness: 0.85,
            volume: 0.7,
            current: silence,
            target: silence,
            morph_progress: 1.0,
            morph_samples: 0.0,
            formants: [BandpassFilter::default(); 3],
            active: false,
            speaking: false,
            text: Vec::new(),
            text_pos: 0,
            phoneme_samples_remaining: 0.0,
            vibrato_phase: 0.0,
            custom_phrases: vec![String::new(); MAX_CUSTOM_PHRASES],
            noise_state: 12345,
            current_level: 0.0,
        };
        v.update_formants();
        v
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.vibrato_phase = 0.0;
        self.morph_progress = 1.0;
        self.active = false;
        self.speaking = false;
        self.text.clear();
        self.text_pos = 0;
        self.phoneme_samples_remaining = 0.0;
        for f in self.formants.iter_mut() {
            f.reset();
        }
        let silence = lookup_phoneme(' ');
        self.current = silence;
        self.target = silence;
    }

    fn fast_rand(&mut self) -> f32 {
        self.noise_state = self.noise_state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.noise_state & 0x7FFF_FFFF) as f32 / 0x7FFF_FFFF as f32 * 2.0 - 1.0
    }

    fn update_formants(&mut self) {
        let t = self.morph_progress;
        for i in 0..3 {
            let freq = self.current.formant.freq[i] + (self.target.formant.freq[i] - self.current.formant.freq[i]) * t;
            let amp = self.current.formant.amp[i] + (self.target.formant.amp[i] - self.current.formant.amp[i]) * t;
            let bw = self.current.formant.bw[i] + (self.target.formant.bw[i] - self.current.formant.bw[i]) * t;
            self.formants[i].set_params(freq, bw, amp, self.sample_rate);
        }
    }

    pub fn set_pitch(&mut self, hz: f32) {
        self.pitch = hz.clamp(60.0, 400.0);
    }

    pub fn set_phoneme(&mut self, symbol: char, morph_time_ms: f32) {
        self.target = lookup_phoneme(symbol);
        self.morph_progress = 0.0;
        self.morph_samples = (morph_time_ms / 1000.0) * self.sample_rate;
        self.active = true;
    }

    pub fn speak(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.text_pos = 0;
        self.speaking = true;
        self.active = true;
        self.phoneme_samples_remaining = 0.0;
    }

    pub fn stop(&mut self) {
        self.speaking = false;
        self.set_phoneme(' ', 50.0);
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_level(&self) -> f32 {
        self.current_level
    }

    pub fn set_custom_phrase(&mut self, index: usize, phrase: &str) {
        if let Some(slot) = self.custom_phrases.get_mut(index) {
            let mut p = phrase.to_string();
            p.truncate(MAX_PHRASE_LENGTH - 1);
            *slot = p;
        }
    }

    pub fn custom_phrase(&self, index: usize) -> Option<&str> {
        self.custom_phrases.get(index).map(|s| s.as_str())
    }

    pub fn speak_custom_phrase(&mut self, index: usize) {
        if let Some(phrase) = self.custom_phrases.get(index).cloned() {
            self.speak(&phrase);
        }
    }

    fn advance_text(&mut self) {
        if self.text_pos >= self.text.len() {
            self.speaking = false;
            self.active = false;
            return;
        }
        self.phoneme_samples_remaining -= 1.0;
        if self.phoneme_samples_remaining <= 0.0 {
            self.text_pos += 1;
            if self.text_pos >= self.text.len() {
                self.speaking = false;
                self.set_phoneme(' ', 50.0);
                return;
            }
            let symbol = self.text[self.text_pos];
            let p = lookup_phoneme(symbol);
            self.phoneme_samples_remaining =
                (p.duration_ms / self.speed.max(0.01)) * 0.001 * self.sample_rate;
            self.set_phoneme(symbol, 40.0);
        }
    }

    fn generate_excitation(&mut self, voiced: bool) -> f32 {
        if voiced {
            self.vibrato_phase += 5.5 / self.sample_rate;
            if self.vibrato_phase >= 1.0 {
                self.vibrato_phase -= 1.0;
            }
            let vibrato = (self.vibrato_phase * 2.0 * std::f32::consts::PI).sin();
            let vibrato_amount = (1.0 - self.robotness) * 0.02;
            let current_pitch = self.pitch * (1.0 + vibrato * vibrato_amount);
            self.phase += current_pitch / self.sample_rate;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
                let r = self.fast_rand();
                1.0 - (1.0 - self.robotness) * r * 0.1
            } else {
                let r = self.fast_rand();
                r * 0.02 * (1.0 - self.robotness)
            }
        } else {
            self.fast_rand() * 0.5
        }
    }

    pub fn process(&mut self) -> f32 {
        if !self.active {
            self.current_level = 0.0;
            return 0.0;
        }
        if self.speaking {
            self.advance_text();
        }
        if self.morph_progress < 1.0 && self.morph_samples > 0.0 {
            self.morph_progress += 1.0 / self.morph_samples;
            if self.morph_progress >= 1.0 {
                self.morph_progress = 1.0;
                self.current = self.target;
            }
            self.update_formants();
        }
        let voiced = self.current.voiced || (self.morph_progress < 1.0 && self.target.voiced);
        let excitation = self.generate_excitation(voiced);
        let mut output = 0.0;
        for f in self.formants.iter_mut() {
            output += f.process(excitation);
        }
        output = (output * 1.5).tanh();
        let out = output * self.volume;
        self.current_level = out.abs();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_by_default() {
        let mut v = FormantVoice::new(22_050.0);
        assert_eq!(v.process(), 0.0);
    }

    #[test]
    fn speaking_produces_nonzero_output_eventually() {
        let mut v = FormantVoice::new(22_050.0);
        v.speak("a");
        let mut max_abs = 0.0_f32;
        for _ in 0..2000 {
            max_abs = max_abs.max(v.process().abs());
        }
        assert!(max_abs > 0.0);
    }
}

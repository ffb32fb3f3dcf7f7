//! VocalMixer ducking and VoiceCompressor (spec §4.7), ported from
//! `voice_compressor.h`.

/// Automatic ducking of the music bus while the formant voice speaks.
#[derive(Debug, Clone, Copy)]
pub struct VocalMixer {
    duck_amount: f32,
    pub voice_gain: f32,
}

impl Default for VocalMixer {
    fn default() -> Self {
        Self {
            duck_amount: 0.0,
            voice_gain: 0.7,
        }
    }
}

impl VocalMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call once per block (or per sample; the rates are chosen to be
    /// stable either way at audio rate) with whether the voice is active.
    pub fn update(&mut self, speaking: bool) {
        if speaking {
            self.duck_amount = (self.duck_amount + 0.05).min(1.0);
        } else {
            self.duck_amount = (self.duck_amount - 0.02).max(0.0);
        }
    }

    pub fn music_gain(&self) -> f32 {
        1.0 - self.duck_amount * self.duck_amount
    }
}

/// Multi-stage voice compressor: HPF, fast-attack/slow-release compressor,
/// make-up gain, presence shelf, cubic soft clip, final LPF.
#[derive(Debug, Clone, Copy)]
pub struct VoiceCompressor {
    envelope: f32,
    threshold: f32,
    ratio: f32,
    makeup_gain: f32,
    hpf_x1: f32,
    hpf_y1: f32,
    lpf_y1: f32,
    shelf_y1: f32,
    presence_boost: f32,
}

impl Default for VoiceCompressor {
    fn default() -> Self {
        Self {
            envelope: 0.0,
            threshold: 0.3,
            ratio: 4.0,
            makeup_gain: 2.8,
            hpf_x1: 0.0,
            hpf_y1: 0.0,
            lpf_y1: 0.0,
            shelf_y1: 0.0,
            presence_boost: 0.5,
        }
    }
}

impl VoiceCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_threshold(&mut self, t: f32) {
        self.threshold = t;
    }

    pub fn set_ratio(&mut self, r: f32) {
        self.ratio = r;
    }

    pub fn set_makeup_gain(&mut self, g: f32) {
        self.makeup_gain = g;
    }

    pub fn set_presence_boost(&mut self, b: f32) {
        self.presence_boost = b;
    }

    pub fn reset(&mut self) {
        *self = Self {
            threshold: self.threshold,
            ratio: self.ratio,
            makeup_gain: self.makeup_gain,
            presence_boost: self.presence_boost,
            ..Self::default()
        };
    }

    pub fn process(&mut self, input: f32) -> f32 {
        const HPF_A: f32 = 0.9786;
        let hpf_out = HPF_A * (self.hpf_y1 + input - self.hpf_x1);
        self.hpf_x1 = input;
        self.hpf_y1 = hpf_out;

        let abs_input = hpf_out.abs();
        if abs_input > self.envelope {
            self.envelope += (abs_input - self.envelope) * 0.3;
        } else {
            self.envelope += (abs_input - self.envelope) * 0.05;
        }

        let mut gain = 1.0;
        if self.envelope > self.threshold {
            let excess = self.envelope - self.threshold;
            let reduction = excess * (1.0 - 1.0 / self.ratio);
            gain = self.threshold / (self.threshold + reduction);
        }

        let mut compressed = hpf_out * gain;
        compressed *= self.makeup_gain;

        if self.presence_boost > 0.001 {
            const SHELF_COEF: f32 = 0.72;
            let boosted = compressed + self.presence_boost * (compressed - self.shelf_y1);
            self.shelf_y1 = self.shelf_y1 * SHELF_COEF + compressed * (1.0 - SHELF_COEF);
            compressed = boosted;
        }

        let x = (compressed * 0.5).clamp(-1.0, 1.0);
        let x3 = x * x * x;
        compressed = (x - x3 * 0.333) * 2.0;

        const LPF_ALPHA: f32 = 0.6;
        let out = compressed * LPF_ALPHA + self.lpf_y1 * (1.0 - LPF_ALPHA);
        self.lpf_y1 = out;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ducking_rises_and_falls() {
        let mut m = VocalMixer::new();
        for _ in 0..10 {
            m.update(true);
        }
        let ducked = m.music_gain();
        assert!(ducked < 1.0);
        for _ in 0..60 {
            m.update(false);
        }
        assert!(m.music_gain() > ducked);
    }

    #[test]
    fn compressor_output_stays_finite() {
        let mut c = VoiceCompressor::new();
        let mut last = 0.0;
        for i in 0..1000 {
            let x = if i % 2 == 0 { 0.9 } else { -0.9 };
            last = c.process(x);
        }
        assert!(last.is_finite());
    }
}

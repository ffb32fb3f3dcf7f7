//! Swappable filter models for the synth voice (spec §4.3): a Chamberlin
//! state-variable filter (ported from `filter.cpp`), a diode-ladder-style
//! acid filter, and a Moog-style ladder filter.
//!
//! `DiodeFilter`/`LadderFilter` class bodies were referenced by
//! `mini_tb303.cpp` but absent from the filtered reference pack; these two
//! are original idiomatic implementations of the standard topologies, not
//! ports (see DESIGN.md).

const STATE_LIMIT: f32 = 50.0;

/// Chamberlin state-variable filter, lowpass output. Exact port of
/// `ChamberlinFilterLp::process`/`processInternal`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVariableFilter {
    lp: f32,
    bp: f32,
    hp: f32,
    sample_rate: f32,
}

impl StateVariableFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            lp: 0.0,
            bp: 0.0,
            hp: 0.0,
            sample_rate: if sample_rate > 0.0 { sample_rate } else { 44_100.0 },
        }
    }

    pub fn reset(&mut self) {
        self.lp = 0.0;
        self.bp = 0.0;
        self.hp = 0.0;
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sample_rate = if sr > 0.0 { sr } else { 44_100.0 };
    }

    fn process_internal(&mut self, input: f32, cutoff_hz: f32, resonance: f32) {
        let mut f = 2.0 * (std::f32::consts::PI * cutoff_hz / self.sample_rate).sin();
        if !f.is_finite() {
            f = 0.0;
        }
        let q = (1.0 / (1.0 + resonance * 4.0)).max(0.06);

        self.hp = input - self.lp - q * self.bp;
        self.bp += f * self.hp;
        self.lp += f * self.bp;
        self.bp = (self.bp * 1.3).tanh();

        self.lp = self.lp.clamp(-STATE_LIMIT, STATE_LIMIT);
        self.bp = self.bp.clamp(-STATE_LIMIT, STATE_LIMIT);
        self.hp = self.hp.clamp(-STATE_LIMIT, STATE_LIMIT);
    }

    pub fn process_lp(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        self.process_internal(input, cutoff_hz, resonance);
        self.lp
    }

    pub fn process_bp(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        self.process_internal(input, cutoff_hz, resonance);
        self.bp
    }

    pub fn process_hp(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        self.process_internal(input, cutoff_hz, resonance);
        self.hp
    }
}

/// Diode-ladder-style acid filter: an SVF core with an asymmetric tanh
/// clipper inserted in the feedback path, giving the characteristic diode
/// "bite" at high resonance.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiodeFilter {
    lp: f32,
    bp: f32,
    sample_rate: f32,
}

impl DiodeFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            lp: 0.0,
            bp: 0.0,
            sample_rate: if sample_rate > 0.0 { sample_rate } else { 44_100.0 },
        }
    }

    pub fn reset(&mut self) {
        self.lp = 0.0;
        self.bp = 0.0;
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sample_rate = if sr > 0.0 { sr } else { 44_100.0 };
    }

    pub fn process(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        let mut f = 2.0 * (std::f32::consts::PI * cutoff_hz / self.sample_rate).sin();
        if !f.is_finite() {
            f = 0.0;
        }
        let q = (1.0 / (1.0 + resonance * 4.0)).max(0.06);
        // Diode asymmetry: the feedback term is clipped asymmetrically
        // before being fed back, biasing the resonant peak's harmonics.
        let fb = (self.bp * q * 1.4).tanh() * 0.85 + (self.bp * q * 0.4).max(0.0) * 0.15;
        let hp = input - self.lp - fb;
        self.bp += f * hp;
        self.lp += f * self.bp;
        self.lp = self.lp.clamp(-STATE_LIMIT, STATE_LIMIT);
        self.bp = self.bp.clamp(-STATE_LIMIT, STATE_LIMIT);
        self.lp
    }
}

/// Moog-style 4-pole ladder: four cascaded one-pole lowpass stages with a
/// resonance feedback tap from the final stage back to the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct LadderFilter {
    stage: [f32; 4],
    sample_rate: f32,
}

impl LadderFilter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            stage: [0.0; 4],
            sample_rate: if sample_rate > 0.0 { sample_rate } else { 44_100.0 },
        }
    }

    pub fn reset(&mut self) {
        self.stage = [0.0; 4];
    }

    pub fn set_sample_rate(&mut self, sr: f32) {
        self.sample_rate = if sr > 0.0 { sr } else { 44_100.0 };
    }

    pub fn process(&mut self, input: f32, cutoff_hz: f32, resonance: f32) -> f32 {
        let mut g = 2.0 * (std::f32::consts::PI * cutoff_hz / self.sample_rate).sin();
        if !g.is_finite() {
            g = 0.0;
        }
        g = g.clamp(0.0, 1.0);
        let k = (resonance * 4.0).clamp(0.0, 4.0);
        let fb = self.stage[3] * k;
        let mut x = (input - fb).tanh();
        for s in self.stage.iter_mut() {
            x = *s + g * (x - *s);
            *s = x.clamp(-STATE_LIMIT, STATE_LIMIT);
        }
        self.stage[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svf_settles_for_dc_input() {
        let mut f = StateVariableFilter::new(22_050.0);
        let mut last = 0.0;
        for _ in 0..2000 {
            last = f.process_lp(1.0, 800.0, 0.2);
        }
        assert!(last.is_finite());
        assert!(last > 0.0);
    }

    #[test]
    fn ladder_attenuates_high_frequency_more_than_dc() {
        let mut f_dc = LadderFilter::new(22_050.0);
        let mut f_hi = LadderFilter::new(22_050.0);
        let mut dc_out = 0.0;
        let mut hi_out = 0.0;
        for i in 0..512 {
            dc_out = f_dc.process(1.0, 400.0, 0.1);
            let hf = if i % 2 == 0 { 1.0 } else { -1.0 };
            hi_out = f_hi.process(hf, 400.0, 0.1);
        }
        assert!(dc_out.abs() >= hi_out.abs());
    }
}

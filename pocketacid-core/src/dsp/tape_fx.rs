//! Tape color macro bus (spec §4.6), ported from `tape_fx.cpp`: wow/flutter,
//! age (pink noise + warmth LPF), saturation, tone, crush, plus the two
//! "minimal techno" extension macros (space, movement) the reference keeps
//! alongside the five tape macros.

const DELAY_SIZE: usize = 1024;
const DELAY_MASK: usize = DELAY_SIZE - 1;
const SPACE_DELAY_SIZE: usize = 4096;
const SPACE_DELAY_MASK: usize = SPACE_DELAY_SIZE - 1;
const LFO_UPDATE_RATE: u16 = 32;

/// Five tape-color macros plus the two minimal-techno extensions, all in
/// `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapeMacro {
    pub wow: u8,
    pub age: u8,
    pub sat: u8,
    pub tone: u8,
    pub crush: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct ResonantLpf {
    low: f32,
    band: f32,
}

impl ResonantLpf {
    fn process(&mut self, input: f32, cutoff: f32, resonance: f32) -> f32 {
        let f = cutoff * 1.16;
        let fb = resonance * (1.0 - 0.15 * f * f);
        self.low += f * self.band;
        let high = input - self.low - fb * self.band;
        self.band += f * high;
        self.low
    }

    fn reset(&mut self) {
        self.low = 0.0;
        self.band = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct TapeFx {
    sample_rate: f32,
    pub enabled: bool,

    buffer: [f32; DELAY_SIZE],
    write_pos: usize,

    current_macro: TapeMacro,
    params_dirty: bool,

    wow_sin: f32,
    wow_cos: f32,
    wow_step_sin: f32,
    wow_step_cos: f32,
    flutter_sin: f32,
    flutter_cos: f32,
    flutter_step_sin: f32,
    flutter_step_cos: f32,
    lfo_counter: u16,

    wow_depth: f32,
    flutter_ratio: f32,
    age_amount: f32,
    noise_amount: f32,
    drive: f32,
    sat_mix: f32,
    lpf_cutoff: f32,
    lpf_resonance: f32,
    crush_bits: i32,
    crush_downsample: u8,
    warmth_cutoff_norm: f32,

    warmth_lpf: ResonantLpf,
    tone_lpf: ResonantLpf,
    crush_lpf: ResonantLpf,
    crush_counter: u8,
    crush_hold: f32,

    noise_state: u32,
    pink: [f32; 7],

    space_amount: f32,
    movement_amount: f32,
    movement_phase: f32,
    movement_freq: f32,
    movement_z1: f32,
    space_buffer: Vec<f32>,
    space_write_pos: usize,
}

impl TapeFx {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            enabled: true,
            buffer: [0.0; DELAY_SIZE],
            write_pos: 0,
            current_macro: TapeMacro::default(),
            params_dirty: true,
            wow_sin: 0.0,
            wow_cos: 1.0,
            wow_step_sin: 0.0,
            wow_step_cos: 1.0,
            flutter_sin: 0.0,
            flutter_cos: 1.0,
            flutter_step_sin: 0.0,
            flutter_step_cos: 1.0,
            lfo_counter: 0,
            wow_depth: 0.0,
            flutter_ratio: 0.0,
            age_amount: 0.0,
            noise_amount: 0.0,
            drive: 1.0,
            sat_mix: 0.5,
            lpf_cutoff: 0.9,
            lpf_resonance: 0.1,
            crush_bits: 16,
            crush_downsample: 1,
            warmth_cutoff_norm: 0.5,
            warmth_lpf: ResonantLpf::default(),
            tone_lpf: ResonantLpf::default(),
            crush_lpf: ResonantLpf::default(),
            crush_counter: 0,
            crush_hold: 0.0,
            noise_state: 0x1234_5678,
            pink: [0.0; 7],
            space_amount: 0.0,
            movement_amount: 0.0,
            movement_phase: 0.0,
            movement_freq: 0.5,
            movement_z1: 0.0,
            space_buffer: vec![0.0; SPACE_DELAY_SIZE],
            space_write_pos: 0,
        }
    }

    pub fn apply_macro(&mut self, macro_: TapeMacro) {
        if macro_ != self.current_macro {
            self.current_macro = macro_;
            self.params_dirty = true;
        }
    }

    pub fn apply_minimal_params(&mut self, space: u8, movement: u8) {
        self.space_amount = (space as f32 * 0.1).min(0.8);
        self.movement_amount = (movement as f32 * 0.01).min(1.0);
        self.movement_freq = 0.5 + (movement % 50) as f32 * 0.1;
    }

    pub fn invalidate_params(&mut self) {
        self.params_dirty = true;
    }

    fn update_internal_params(&mut self) {
        let m = self.current_macro;
        const TWO_PI: f32 = 2.0 * std::f32::consts::PI;

        self.wow_depth = (m.wow as f32 / 100.0) * 0.006;
        let wow_hz = 0.3 + (m.wow as f32 / 100.0) * 1.2;
        let theta_wow = TWO_PI * wow_hz / self.sample_rate;
        self.wow_step_sin = theta_wow.sin();
        self.wow_step_cos = theta_wow.cos();

        if m.wow > 50 {
            self.flutter_ratio = ((m.wow - 50) as f32 / 50.0).min(0.3);
            let flutter_hz = 4.0 + ((m.wow - 50) as f32 / 50.0) * 4.0;
            let theta_flutter = TWO_PI * flutter_hz / self.sample_rate;
            self.flutter_step_sin = theta_flutter.sin();
            self.flutter_step_cos = theta_flutter.cos();
        } else {
            self.flutter_ratio = 0.0;
        }

        self.age_amount = m.age as f32 / 100.0;
        self.noise_amount = self.age_amount * 0.0002;
        let warmth_cutoff_hz = 8000.0 - self.age_amount * 6000.0;
        self.warmth_cutoff_norm = warmth_cutoff_hz / self.sample_rate;

        self.drive = 1.0 + (m.sat as f32 / 100.0) * 1.5;
        self.sat_mix = 0.3 + (m.sat as f32 / 100.0) * 0.4;

        self.lpf_cutoff = 0.3 + (m.tone as f32 / 100.0) * 0.65;
        self.lpf_resonance = 0.1 + (m.tone as f32 / 100.0) * 0.2;

        match m.crush {
            0 => {
                self.crush_bits = 16;
                self.crush_downsample = 1;
            }
            1 => {
                self.crush_bits = 12;
                self.crush_downsample = 1;
            }
            2 => {
                self.crush_bits = 10;
                self.crush_downsample = 2;
            }
            3 => {
                self.crush_bits = 8;
                self.crush_downsample = 3;
            }
            _ => {
                self.crush_bits = 16;
                self.crush_downsample = 1;
            }
        }

        self.params_dirty = false;
    }

    fn update_lfo(&mut self) {
        let w_s = self.wow_sin * self.wow_step_cos + self.wow_cos * self.wow_step_sin;
        let w_c = self.wow_cos * self.wow_step_cos - self.wow_sin * self.wow_step_sin;
        self.wow_sin = w_s;
        self.wow_cos = w_c;

        let f_s = self.flutter_sin * self.flutter_step_cos + self.flutter_cos * self.flutter_step_sin;
        let f_c = self.flutter_cos * self.flutter_step_cos - self.flutter_sin * self.flutter_step_sin;
        self.flutter_sin = f_s;
        self.flutter_cos = f_c;

        let wow_rescale = 1.0 / (self.wow_sin * self.wow_sin + self.wow_cos * self.wow_cos + 1e-10).sqrt();
        self.wow_sin *= wow_rescale;
        self.wow_cos *= wow_rescale;

        let flut_rescale =
            1.0 / (self.flutter_sin * self.flutter_sin + self.flutter_cos * self.flutter_cos + 1e-10).sqrt();
        self.flutter_sin *= flut_rescale;
        self.flutter_cos *= flut_rescale;
    }

    fn fast_noise(&mut self) -> f32 {
        self.noise_state ^= self.noise_state << 13;
        self.noise_state ^= self.noise_state >> 17;
        self.noise_state ^= self.noise_state << 5;
        (self.noise_state as i32) as f32 * (1.0 / 2_147_483_648.0)
    }

    fn generate_pink_noise(&mut self) -> f32 {
        let white = self.fast_noise();
        self.pink[0] = 0.998_86 * self.pink[0] + white * 0.055_517_9;
        self.pink[1] = 0.993_32 * self.pink[1] + white * 0.075_075_9;
        self.pink[2] = 0.969_00 * self.pink[2] + white * 0.153_852_0;
        self.pink[3] = 0.866_50 * self.pink[3] + white * 0.310_485_6;
        self.pink[4] = 0.550_00 * self.pink[4] + white * 0.532_952_2;
        self.pink[5] = -0.7616 * self.pink[5] - white * 0.016_898_0;
        let pink = self.pink[0]
            + self.pink[1]
            + self.pink[2]
            + self.pink[3]
            + self.pink[4]
            + self.pink[5]
            + self.pink[6]
            + white * 0.5362;
        self.pink[6] = white * 0.115_926;
        pink * 0.11
    }

    fn read_delay_interpolated(&self, delay_samples: f32) -> f32 {
        let mut read_pos = self.write_pos as f32 - delay_samples;
        while read_pos < 0.0 {
            read_pos += DELAY_SIZE as f32;
        }
        let i0 = (read_pos as usize) & DELAY_MASK;
        let i1 = (i0 + 1) & DELAY_MASK;
        let frac = read_pos - read_pos.floor();
        self.buffer[i0] + frac * (self.buffer[i1] - self.buffer[i0])
    }

    pub fn process(&mut self, input: f32) -> f32 {
        if !self.enabled {
            return input;
        }
        if self.params_dirty {
            self.update_internal_params();
        }
        self.lfo_counter += 1;
        if self.lfo_counter >= LFO_UPDATE_RATE {
            self.lfo_counter = 0;
            self.update_lfo();
        }

        let mut output = input;

        if self.wow_depth > 0.0 {
            let mut modu = self.wow_sin * self.wow_depth;
            if self.flutter_ratio > 0.0 {
                modu += self.flutter_sin * self.wow_depth * 0.3 * self.flutter_ratio;
            }
            let delay_smp = 100.0 + modu * self.sample_rate;
            output = self.read_delay_interpolated(delay_smp);
        }

        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) & DELAY_MASK;

        if self.age_amount > 0.0 {
            output += self.generate_pink_noise() * self.noise_amount;
            output = self.warmth_lpf.process(output, self.warmth_cutoff_norm, 0.1);
        }

        if self.drive > 1.0 {
            let driven = output * self.drive;
            let saturated = crate::dsp::distortion::fast_tanh(driven);
            output = output * (1.0 - self.sat_mix) + saturated * self.sat_mix;
        }

        output = self.tone_lpf.process(output, self.lpf_cutoff, self.lpf_resonance);

        if self.crush_bits < 16 {
            self.crush_counter += 1;
            if self.crush_counter >= self.crush_downsample {
                self.crush_counter = 0;
                let filtered = self.crush_lpf.process(output, 0.3, 0.1);
                let levels = (1i32 << (self.crush_bits - 1)) as f32;
                self.crush_hold = (filtered * levels + 0.5).floor() / levels;
            }
            output = self.crush_hold;
        }

        if self.space_amount > 0.05 {
            let d_time = 4000.0_f32;
            let mut s_read = self.space_write_pos as f32 - d_time;
            if s_read < 0.0 {
                s_read += SPACE_DELAY_SIZE as f32;
            }
            let space_delayed = self.space_buffer[(s_read as usize) & SPACE_DELAY_MASK];
            self.space_buffer[self.space_write_pos] = output + space_delayed * 0.7;
            self.space_write_pos = (self.space_write_pos + 1) & SPACE_DELAY_MASK;
            output = output * (1.0 - self.space_amount * 0.5) + space_delayed * self.space_amount;
        }

        if self.movement_amount > 0.01 {
            self.movement_phase += self.movement_freq / self.sample_rate;
            if self.movement_phase >= 1.0 {
                self.movement_phase -= 1.0;
            }
            let phase_u32 = (self.movement_phase * 4_294_967_296.0) as u32;
            let modu = crate::dsp::wavetable::lookup_sine(phase_u32) * 0.5 + 0.5;
            let fc = 0.1 + modu * self.movement_amount * 0.8;
            self.movement_z1 += fc * (output - self.movement_z1);
            output = self.movement_z1;
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypass_when_disabled() {
        let mut fx = TapeFx::new(22_050.0);
        fx.enabled = false;
        assert_eq!(fx.process(0.5), 0.5);
    }

    #[test]
    fn default_macro_passes_signal_roughly_through() {
        let mut fx = TapeFx::new(22_050.0);
        fx.apply_macro(TapeMacro::default());
        let mut last = 0.0;
        for _ in 0..100 {
            last = fx.process(1.0);
        }
        assert!(last.is_finite());
    }

    #[test]
    fn heavy_crush_quantizes_output() {
        let mut fx = TapeFx::new(22_050.0);
        fx.apply_macro(TapeMacro { wow: 0, age: 0, sat: 0, tone: 100, crush: 3 });
        for _ in 0..50 {
            fx.process(0.3333);
        }
        assert!(fx.crush_bits < 16);
    }
}

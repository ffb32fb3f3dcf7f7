//! Wavetable oscillator tables (spec §4.3), ported from
//! `audio_wavetables.cpp`: four 1024-sample tables addressed by the top 10
//! bits of a 32-bit phase accumulator.

use std::f32::consts::PI;
use std::sync::OnceLock;

pub const WAVETABLE_SIZE: usize = 1024;
pub const WAVETABLE_BITS: u32 = 10;
pub const WAVETABLE_MASK: u32 = 0x3FF;
const PHASE_SHIFT: u32 = 32 - WAVETABLE_BITS;
const DUTY_CYCLE: usize = (WAVETABLE_SIZE as f32 * 0.3) as usize;

struct Tables {
    sine: Vec<f32>,
    saw: Vec<f32>,
    triangle: Vec<f32>,
    square: Vec<f32>,
}

fn build_tables() -> Tables {
    let mut sine = vec![0.0; WAVETABLE_SIZE];
    let mut saw = vec![0.0; WAVETABLE_SIZE];
    let mut triangle = vec![0.0; WAVETABLE_SIZE];
    let mut square = vec![0.0; WAVETABLE_SIZE];
    for i in 0..WAVETABLE_SIZE {
        let phase = i as f32 / WAVETABLE_SIZE as f32;
        sine[i] = (2.0 * PI * phase).sin();
        saw[i] = 2.0 * phase - 1.0;
        triangle[i] = if phase < 0.5 {
            4.0 * phase - 1.0
        } else {
            3.0 - 4.0 * phase
        };
        square[i] = if i < DUTY_CYCLE { 1.0 } else { -1.0 };
    }
    Tables { sine, saw, triangle, square }
}

fn tables() -> &'static Tables {
    static TABLES: OnceLock<Tables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

fn index(phase: u32) -> usize {
    ((phase >> PHASE_SHIFT) & WAVETABLE_MASK) as usize
}

pub fn lookup_sine(phase: u32) -> f32 {
    tables().sine[index(phase)]
}

pub fn lookup_saw(phase: u32) -> f32 {
    tables().saw[index(phase)]
}

pub fn lookup_triangle(phase: u32) -> f32 {
    tables().triangle[index(phase)]
}

pub fn lookup_square(phase: u32) -> f32 {
    tables().square[index(phase)]
}

/// Converts a frequency in Hz to a 32-bit phase-accumulator increment,
/// matching `mini_tb303.cpp`'s `freq * 190359.1689f` constant (`2^32 /
/// sampleRate` at the engine's 22050 Hz).
pub fn phase_increment(freq: f32) -> u32 {
    (freq * 190_359.1689_f32).max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_zero_at_phase_zero() {
        assert!(lookup_sine(0).abs() < 0.01);
    }

    #[test]
    fn saw_ranges_from_minus_one_to_one() {
        let first = lookup_saw(0);
        let last = lookup_saw(u32::MAX);
        assert!((first - -1.0).abs() < 0.01);
        assert!(last > 0.9);
    }
}

//! L0 parameter primitive (spec §4.1): a named scalar with range + step, or
//! (when labels are present) an enumerated option index.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    min: f32,
    max: f32,
    step: f32,
    current: f32,
    labels: Vec<String>,
}

impl Parameter {
    pub fn new(min: f32, max: f32, step: f32, default: f32) -> Self {
        let mut p = Self {
            min,
            max,
            step,
            current: default,
            labels: Vec::new(),
        };
        p.current = p.clamp_step(default);
        p
    }

    pub fn new_options(labels: &[&str], default_index: usize) -> Self {
        let count = labels.len();
        let mut p = Self {
            min: 0.0,
            max: (count.max(1) - 1) as f32,
            step: 1.0,
            current: 0.0,
            labels: labels.iter().map(|s| s.to_string()).collect(),
        };
        p.current = p.clamp_step(default_index as f32);
        p
    }

    fn clamp_step(&self, v: f32) -> f32 {
        let clamped = v.clamp(self.min, self.max);
        if self.step > 0.0 {
            let steps = ((clamped - self.min) / self.step).round();
            (self.min + steps * self.step).clamp(self.min, self.max)
        } else {
            clamped
        }
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn set_value(&mut self, v: f32) {
        self.current = self.clamp_step(v);
    }

    pub fn add_steps(&mut self, n: i32) {
        let step = if self.step > 0.0 { self.step } else { 1.0 };
        self.set_value(self.current + step * n as f32);
    }

    pub fn set_normalized(&mut self, nrm: f32) {
        let nrm = nrm.clamp(0.0, 1.0);
        self.set_value(self.min + nrm * (self.max - self.min));
    }

    pub fn normalized(&self) -> f32 {
        if self.max > self.min {
            (self.current - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }

    pub fn is_option(&self) -> bool {
        !self.labels.is_empty()
    }

    pub fn option_count(&self) -> usize {
        self.labels.len()
    }

    pub fn option_index(&self) -> usize {
        self.current.round().clamp(0.0, (self.labels.len().max(1) - 1) as f32) as usize
    }

    pub fn option_label_at(&self, i: usize) -> Option<&str> {
        self.labels.get(i).map(|s| s.as_str())
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_bounds() {
        let mut p = Parameter::new(0.0, 10.0, 1.0, 5.0);
        p.set_value(100.0);
        assert_eq!(p.value(), 10.0);
        p.set_value(-100.0);
        assert_eq!(p.value(), 0.0);
    }

    #[test]
    fn rounds_to_step_grid() {
        let mut p = Parameter::new(0.0, 10.0, 2.0, 0.0);
        p.set_value(3.1);
        assert_eq!(p.value(), 4.0);
    }

    #[test]
    fn idempotent_at_bounds() {
        let mut p = Parameter::new(0.0, 1.0, 0.0, 1.0);
        p.add_steps(5);
        assert_eq!(p.value(), 1.0);
        p.add_steps(5);
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn option_index_clamped() {
        let p = Parameter::new_options(&["lp1", "acid", "moog"], 1);
        assert_eq!(p.option_index(), 1);
        assert_eq!(p.option_label_at(1), Some("acid"));
        assert_eq!(p.option_count(), 3);
    }

    #[test]
    fn normalized_roundtrip() {
        let mut p = Parameter::new(0.0, 200.0, 0.0, 0.0);
        p.set_normalized(0.5);
        assert_eq!(p.value(), 100.0);
    }
}

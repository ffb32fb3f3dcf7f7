//! Tape looper (spec §4.6), following the richer mode machine declared in
//! `tape_looper.h` (`Stop/Rec/Dub/Play`, speed, stutter, eject, crossfade)
//! rather than the simplified bool-flag state machine in its paired `.cpp`
//! (see DESIGN.md). Core read/write/soft-clip semantics are ported from
//! that `.cpp`; the buffer here is `f32` rather than `int16` since the
//! engine carries float audio internally until the final mixer quantize.

pub const MAX_SECONDS: u32 = 8;
pub const STUTTER_FRAMES: usize = 512;
pub const CROSSFADE_FRAMES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeMode {
    Stop,
    Rec,
    Dub,
    Play,
}

#[derive(Debug, Clone)]
pub struct TapeLooper {
    buffer: Vec<f32>,
    length: usize,
    playhead: f32,
    mode: TapeMode,
    speed: u8,
    speed_multiplier: f32,
    pub reverse: bool,
    stutter_active: bool,
    stutter_start: f32,
    pub volume: f32,
    first_record: bool,
    record_pos: usize,
    fade_counter: usize,
    fade_from: f32,
}

impl TapeLooper {
    pub fn new(sample_rate: f32) -> Self {
        let max_samples = (sample_rate * MAX_SECONDS as f32) as usize;
        Self {
            buffer: vec![0.0; max_samples.max(1)],
            length: 0,
            playhead: 0.0,
            mode: TapeMode::Stop,
            speed: 1,
            speed_multiplier: 1.0,
            reverse: false,
            stutter_active: false,
            stutter_start: 0.0,
            volume: 1.0,
            first_record: false,
            record_pos: 0,
            fade_counter: 0,
            fade_from: 0.0,
        }
    }

    pub fn mode(&self) -> TapeMode {
        self.mode
    }

    /// Mutation under `AudioGuard` from the UI thread, per spec §4.10.
    pub fn set_mode(&mut self, mode: TapeMode) {
        if mode == self.mode {
            return;
        }
        self.fade_counter = CROSSFADE_FRAMES;
        self.fade_from = 1.0;
        match (self.mode, mode) {
            (_, TapeMode::Rec) if self.length == 0 => {
                self.first_record = true;
                self.record_pos = 0;
            }
            _ => {}
        }
        if matches!(self.mode, TapeMode::Rec) && self.first_record {
            self.length = self.record_pos;
            self.playhead = 0.0;
            self.first_record = false;
        }
        self.mode = mode;
    }

    pub fn set_speed(&mut self, speed: u8) {
        self.speed = speed.min(2);
        self.speed_multiplier = match self.speed {
            0 => 0.5,
            2 => 2.0,
            _ => 1.0,
        };
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn set_stutter(&mut self, active: bool) {
        if active && !self.stutter_active {
            self.stutter_start = self.playhead;
        }
        self.stutter_active = active;
    }

    pub fn stutter_active(&self) -> bool {
        self.stutter_active
    }

    pub fn eject(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.length = 0;
        self.playhead = 0.0;
        self.mode = TapeMode::Stop;
        self.speed = 1;
        self.speed_multiplier = 1.0;
        self.stutter_active = false;
        self.first_record = false;
        self.record_pos = 0;
        self.fade_counter = 0;
    }

    pub fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.length = 0;
        self.playhead = 0.0;
        self.mode = TapeMode::Stop;
        self.first_record = false;
        self.record_pos = 0;
    }

    pub fn has_loop(&self) -> bool {
        self.length > 0
    }

    pub fn loop_length_samples(&self) -> usize {
        self.length
    }

    pub fn playhead_progress(&self) -> f32 {
        if self.length == 0 {
            0.0
        } else {
            self.playhead / self.length as f32
        }
    }

    fn read_interpolated(&self, pos: f32) -> f32 {
        if self.length == 0 {
            return 0.0;
        }
        let len = self.length as f32;
        let mut p = pos % len;
        if p < 0.0 {
            p += len;
        }
        let i0 = p as usize % self.length;
        let i1 = (i0 + 1) % self.length;
        let frac = p - p.floor();
        self.buffer[i0] + frac * (self.buffer[i1] - self.buffer[i0])
    }

    /// Process one sample; returns the looper's contribution to the mix.
    pub fn process(&mut self, input: f32) -> f32 {
        let mut out = 0.0;

        match self.mode {
            TapeMode::Stop => {}
            TapeMode::Rec => {
                if self.first_record {
                    if self.record_pos < self.buffer.len() {
                        self.buffer[self.record_pos] = input;
                        self.record_pos += 1;
                    } else {
                        self.length = self.buffer.len();
                        self.first_record = false;
                        self.playhead = 0.0;
                    }
                } else if self.length > 0 {
                    let idx = self.playhead as usize % self.length;
                    self.buffer[idx] = input;
                    self.advance_playhead();
                }
            }
            TapeMode::Dub => {
                if self.length > 0 {
                    let idx = self.playhead as usize % self.length;
                    out = self.buffer[idx];
                    let mixed = (out + input).clamp(-1.0, 1.0);
                    self.buffer[idx] = mixed;
                    self.advance_playhead();
                }
            }
            TapeMode::Play => {
                if self.length > 0 {
                    let read_pos = if self.stutter_active {
                        self.stutter_playhead()
                    } else {
                        self.playhead
                    };
                    out = self.read_interpolated(read_pos);
                    self.advance_playhead();
                }
            }
        }

        out *= self.volume;
        if self.fade_counter > 0 {
            let t = 1.0 - self.fade_counter as f32 / CROSSFADE_FRAMES as f32;
            out *= self.fade_from + (1.0 - self.fade_from) * t;
            self.fade_counter -= 1;
        }
        out
    }

    fn advance_playhead(&mut self) {
        if self.length == 0 {
            return;
        }
        let dir = if self.reverse { -1.0 } else { 1.0 };
        let len = self.length as f32;
        self.playhead += dir * self.speed_multiplier;
        while self.playhead < 0.0 {
            self.playhead += len;
        }
        while self.playhead >= len {
            self.playhead -= len;
        }
    }

    fn stutter_playhead(&self) -> f32 {
        let len = self.length.max(1) as f32;
        let window = STUTTER_FRAMES.min(self.length.max(1)) as f32;
        let offset = (self.playhead - self.stutter_start).rem_euclid(window);
        (self.stutter_start + offset).rem_euclid(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_then_plays_back() {
        let mut looper = TapeLooper::new(1000.0);
        looper.set_mode(TapeMode::Rec);
        for i in 0..100 {
            looper.process((i as f32) * 0.001);
        }
        looper.set_mode(TapeMode::Stop);
        assert!(looper.has_loop());
        assert_eq!(looper.loop_length_samples(), 100);

        looper.set_mode(TapeMode::Play);
        // Skip the crossfade-in window before asserting near-equality.
        for _ in 0..CROSSFADE_FRAMES {
            looper.process(0.0);
        }
        let first = looper.process(0.0);
        assert!(first.is_finite());
    }

    #[test]
    fn eject_clears_everything() {
        let mut looper = TapeLooper::new(1000.0);
        looper.set_mode(TapeMode::Rec);
        for _ in 0..10 {
            looper.process(0.5);
        }
        looper.set_mode(TapeMode::Stop);
        looper.eject();
        assert!(!looper.has_loop());
        assert_eq!(looper.mode(), TapeMode::Stop);
    }
}

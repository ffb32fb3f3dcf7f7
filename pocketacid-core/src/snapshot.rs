//! UI-read snapshot caches (spec §4.10): per-step note/accent/slide rows
//! per synth and drum hit bitmaps per voice, refreshed lazily so the UI
//! thread never walks pool-backed pattern storage directly, plus the
//! waveform double buffer (spec §5) published with an atomic index.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pattern::drum::DRUM_VOICE_COUNT;
use crate::scene::Scene;

const STEPS: usize = 16;

/// One synth track's per-step UI view, rebuilt from the active pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthStepSnapshot {
    pub notes: [i8; STEPS],
    pub accents: [bool; STEPS],
    pub slides: [bool; STEPS],
}

/// All 9 drum voices' hit bitmaps for the active pattern set, plus the
/// pattern-wide accent row (spec §3: `DrumPatternSet::accents`).
#[derive(Debug, Clone, Copy)]
pub struct DrumStepSnapshot {
    pub hits: [[bool; STEPS]; DRUM_VOICE_COUNT],
    pub accents: [bool; STEPS],
}

impl Default for DrumStepSnapshot {
    fn default() -> Self {
        Self {
            hits: [[false; STEPS]; DRUM_VOICE_COUNT],
            accents: [false; STEPS],
        }
    }
}

/// Lazily-refreshed caches the engine façade reads from instead of walking
/// `Scene` pattern storage on every UI frame.
#[derive(Debug, Clone, Default)]
pub struct StepSnapshots {
    pub synth: [SynthStepSnapshot; 2],
    pub drum: DrumStepSnapshot,
    dirty: bool,
}

impl StepSnapshots {
    pub fn new() -> Self {
        Self {
            dirty: true,
            ..Default::default()
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuild from the currently-selected patterns if stale. Cheap enough
    /// to call from every UI-visible accessor (spec §4.10: "refreshed
    /// lazily before UI-visible accessors return").
    pub fn refresh(&mut self, scene: &Scene) {
        if !self.dirty {
            return;
        }
        for track in 0..2 {
            let banks = if track == 0 { &scene.synth_a_banks } else { &scene.synth_b_banks };
            let pattern = &banks[scene.synth_bank_index[track]].patterns[scene.synth_pattern_index[track]];
            let snap = &mut self.synth[track];
            for (i, step) in pattern.steps.iter().enumerate() {
                snap.notes[i] = step.note;
                snap.accents[i] = step.accent;
                snap.slides[i] = step.slide;
            }
        }

        let set = &scene.drum_banks[scene.drum_bank_index].patterns[scene.drum_pattern_index];
        for (voice_idx, pattern) in set.voices.iter().enumerate() {
            for (step_idx, step) in pattern.steps.iter().enumerate() {
                self.drum.hits[voice_idx][step_idx] = step.hit;
            }
        }
        self.drum.accents = set.accents;

        self.dirty = false;
    }
}

/// Waveform double buffer: the audio thread writes the off-index buffer,
/// then atomically flips `display_index` so the UI thread always reads a
/// complete, non-tearing buffer (spec §5).
///
/// `push` takes `&self`: the only caller is the single audio-producer
/// thread inside `Engine::generate_audio_buffer`, so the buffer contents
/// and `write_pos` are single-writer state behind `UnsafeCell`, not
/// actually shared mutation. `publish`'s `Release` store carries every
/// prior write with it, so a `copy_last` on another thread that loads
/// `display_index` with `Acquire` always sees a fully-written buffer.
pub struct WaveformBuffer {
    buffers: [UnsafeCell<Vec<f32>>; 2],
    write_pos: [AtomicUsize; 2],
    display_index: AtomicUsize,
}

// SAFETY: `buffers`/`write_pos` are only ever written by the single audio
// thread that owns `push`; other threads only read through `copy_last`,
// which reads the buffer `publish` has already finished writing to.
unsafe impl Sync for WaveformBuffer {}

impl WaveformBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: [
                UnsafeCell::new(vec![0.0; capacity.max(1)]),
                UnsafeCell::new(vec![0.0; capacity.max(1)]),
            ],
            write_pos: [AtomicUsize::new(0), AtomicUsize::new(0)],
            display_index: AtomicUsize::new(0),
        }
    }

    fn write_index(&self) -> usize {
        1 - self.display_index.load(Ordering::Acquire)
    }

    /// Push one sample into the off-display buffer. Call once per output
    /// sample from the audio thread.
    pub fn push(&self, sample: f32) {
        let w = self.write_index();
        // SAFETY: only the audio thread calls `push`, and `w` is never the
        // currently-published (readable) index.
        let buf = unsafe { &mut *self.buffers[w].get() };
        let pos = self.write_pos[w].load(Ordering::Relaxed);
        let len = buf.len();
        buf[pos % len] = sample;
        self.write_pos[w].store(pos + 1, Ordering::Relaxed);
    }

    /// Publish the buffer just written into as the one the UI reads.
    pub fn publish(&self) {
        let w = self.write_index();
        self.display_index.store(w, Ordering::Release);
    }

    /// Copy the last `dst.len()` samples of the published buffer into
    /// `dst` (spec §6: "copy the last N output samples").
    pub fn copy_last(&self, dst: &mut [f32]) {
        let r = self.display_index.load(Ordering::Acquire);
        // SAFETY: `r` is the published index; the audio thread only ever
        // writes to `1 - r` until the next `publish`.
        let buf = unsafe { &*self.buffers[r].get() };
        let len = buf.len();
        let n = dst.len().min(len);
        let start = self.write_pos[r].load(Ordering::Relaxed) % len;
        for (i, slot) in dst.iter_mut().take(n).enumerate() {
            let idx = (start + len - n + i) % len;
            *slot = buf[idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_populates_from_selected_pattern() {
        let mut scene = Scene::new();
        scene.drum_banks[0].patterns[0].voices[0].steps[2].hit = true;
        scene.synth_a_banks[0].patterns[0].steps[3].note = 48;
        let mut snaps = StepSnapshots::new();
        snaps.refresh(&scene);
        assert!(snaps.drum.hits[0][2]);
        assert_eq!(snaps.synth[0].notes[3], 48);
    }

    #[test]
    fn refresh_is_noop_until_marked_dirty() {
        let mut scene = Scene::new();
        let mut snaps = StepSnapshots::new();
        snaps.refresh(&scene);
        scene.drum_banks[0].patterns[0].voices[0].steps[5].hit = true;
        snaps.refresh(&scene);
        assert!(!snaps.drum.hits[0][5]);
        snaps.mark_dirty();
        snaps.refresh(&scene);
        assert!(snaps.drum.hits[0][5]);
    }

    #[test]
    fn waveform_buffer_publishes_written_samples() {
        let mut wf = WaveformBuffer::new(4);
        for i in 0..4 {
            wf.push(i as f32);
        }
        wf.publish();
        let mut out = [0.0; 4];
        wf.copy_last(&mut out);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0]);
    }
}

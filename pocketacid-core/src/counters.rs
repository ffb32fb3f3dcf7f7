//! Performance counters (spec §5/§7): a seq-lock so the UI thread can read
//! a torn-free snapshot without the audio thread ever blocking on it.
//! Writer: `seq++` (odd), write fields, `seq++` (even). Readers retry on an
//! odd sequence or a mismatch across the read.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Diagnostics surfaced per spec §7: nothing crosses the audio boundary as
/// an error, it all lands here as a counter the UI can display.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfSnapshot {
    pub blocks_rendered: u64,
    pub callback_overruns: u32,
    pub scene_load_failures: u32,
    pub automation_pool_rejections: u32,
}

pub struct PerfCounters {
    seq: AtomicU32,
    blocks_rendered: AtomicU64,
    callback_overruns: AtomicU32,
    scene_load_failures: AtomicU32,
    automation_pool_rejections: AtomicU32,
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            blocks_rendered: AtomicU64::new(0),
            callback_overruns: AtomicU32::new(0),
            scene_load_failures: AtomicU32::new(0),
            automation_pool_rejections: AtomicU32::new(0),
        }
    }

    fn begin_write(&self) {
        self.seq.fetch_add(1, Ordering::AcqRel);
    }

    fn end_write(&self) {
        self.seq.fetch_add(1, Ordering::Release);
    }

    pub fn record_block_rendered(&self) {
        self.begin_write();
        self.blocks_rendered.fetch_add(1, Ordering::Relaxed);
        self.end_write();
    }

    pub fn record_callback_overrun(&self) {
        self.begin_write();
        self.callback_overruns.fetch_add(1, Ordering::Relaxed);
        self.end_write();
    }

    pub fn record_scene_load_failure(&self) {
        self.begin_write();
        self.scene_load_failures.fetch_add(1, Ordering::Relaxed);
        self.end_write();
    }

    pub fn record_automation_pool_rejection(&self) {
        self.begin_write();
        self.automation_pool_rejections.fetch_add(1, Ordering::Relaxed);
        self.end_write();
    }

    /// Retry-until-consistent read, per the seq-lock protocol.
    pub fn snapshot(&self) -> PerfSnapshot {
        loop {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 % 2 != 0 {
                std::hint::spin_loop();
                continue;
            }
            let snap = PerfSnapshot {
                blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
                callback_overruns: self.callback_overruns.load(Ordering::Relaxed),
                scene_load_failures: self.scene_load_failures.load(Ordering::Relaxed),
                automation_pool_rejections: self.automation_pool_rejections.load(Ordering::Relaxed),
            };
            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 {
                return snap;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let counters = PerfCounters::new();
        counters.record_block_rendered();
        counters.record_block_rendered();
        counters.record_callback_overrun();
        let snap = counters.snapshot();
        assert_eq!(snap.blocks_rendered, 2);
        assert_eq!(snap.callback_overruns, 1);
        assert_eq!(snap.scene_load_failures, 0);
    }
}

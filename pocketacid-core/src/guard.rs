//! UI↔audio safe-mutation protocol (spec §4.10/§5).
//!
//! The audio thread never yields inside the callback; it may only spin for
//! as long as a UI critical section takes, which must stay well under the
//! block deadline. Modeled here as a `parking_lot`-free `std::sync::Mutex`
//! guarding the whole engine state: the teacher's `AppState` access pattern
//! (a single lock taken for both reads and mutations) generalizes directly,
//! since this core has no separate read-mostly path worth splitting out.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Wraps a `T` (engine/scene state) behind the single lock both the audio
/// callback and UI-thread edits take. `lock()` is the "acquire the guard"
/// operation from spec §4.10/§5; the returned `AudioGuard` releases on drop.
pub struct AudioGuardedState<T> {
    inner: Mutex<T>,
}

impl<T> AudioGuardedState<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Acquire the critical section. A poisoned lock (a prior holder
    /// panicked mid-mutation) is recovered rather than propagated: audio
    /// must keep running, so we take the guard the panicking thread
    /// abandoned instead of tearing down the callback.
    pub fn lock(&self) -> AudioGuard<'_, T> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        AudioGuard { guard }
    }
}

/// An acquired critical section. Holding one across a blocking I/O call
/// violates the protocol in spec §5 ("UI code must not perform blocking
/// I/O under the guard") — nothing here enforces that statically, it's a
/// caller discipline, same as the teacher's state-mutex usage.
pub struct AudioGuard<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> std::ops::Deref for AudioGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> std::ops::DerefMut for AudioGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_under_guard_is_observed_after_release() {
        let state = AudioGuardedState::new(0_i32);
        {
            let mut g = state.lock();
            *g += 1;
        }
        assert_eq!(*state.lock(), 1);
    }

    #[test]
    fn poisoned_lock_is_recovered_not_propagated() {
        let state = AudioGuardedState::new(0_i32);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut g = state.lock();
            *g = 5;
            panic!("simulated UI-thread panic mid-mutation");
        }));
        assert!(result.is_err());
        // The audio thread must still be able to acquire the guard.
        assert_eq!(*state.lock(), 5);
    }
}

//! Single-flight interaction guard.
//!
//! Remote evaluations cannot be aborted once submitted; cancellation is
//! emulated by discarding late results. Every submission captures a token
//! from a monotonically increasing generation counter, and a completion is
//! applied to shared state only while its token is still the newest one.
//! Stale completions are dropped silently, never surfaced as errors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Token identifying one submitted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Monotonic request-generation counter
#[derive(Debug, Default)]
pub struct GenerationCounter {
    counter: AtomicU64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every earlier token
    pub fn begin(&self) -> RequestToken {
        RequestToken(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.counter.load(Ordering::SeqCst) == token.0
    }
}

/// Shared slot that only the latest-generation result may fill
#[derive(Debug)]
pub struct Latest<T> {
    generation: GenerationCounter,
    slot: Mutex<Option<T>>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Latest<T> {
    pub fn new() -> Self {
        Self {
            generation: GenerationCounter::new(),
            slot: Mutex::new(None),
        }
    }

    /// Register a new request; earlier in-flight requests become stale
    pub fn begin(&self) -> RequestToken {
        self.generation.begin()
    }

    /// Apply a completed result if its token is still current.
    /// Returns whether the value was stored.
    pub fn try_apply(&self, token: RequestToken, value: T) -> bool {
        if !self.generation.is_current(token) {
            log::debug!("discarding stale result for generation {:?}", token);
            return false;
        }
        *self.slot.lock().expect("latest slot poisoned") = Some(value);
        true
    }

    pub fn snapshot(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.lock().expect("latest slot poisoned").clone()
    }
}

//! Time sources for scheduling and capture.
//!
//! Everything time-based in the trainer reads one shared clock in seconds.
//! With an output stream running that clock is the tone bank's sample
//! counter; tests use [`ManualClock`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time on the audio clock, in seconds.
pub trait AudioClock {
    fn now(&self) -> f64;
}

impl<C: AudioClock + ?Sized> AudioClock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();
        assert_eq!(clock.now(), 0.0);
        other.advance(1.5);
        other.advance(0.5);
        assert_eq!(clock.now(), 2.0);
    }
}

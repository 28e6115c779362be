//! Audio clock shared between the render side and the control side
//!
//! The render graph is the only writer: it advances the frame counter after
//! every block it produces. Everything that schedules sound reads "now" from
//! here, so event times and rendering share one timeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic audio-clock time, counted in rendered frames
#[derive(Clone, Debug)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Current time in seconds
    pub fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Advance after rendering `frames` frames
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }

    /// Frame index at which a time in seconds falls
    pub fn seconds_to_frames(&self, seconds: f64) -> u64 {
        if seconds <= 0.0 {
            0
        } else {
            (seconds * self.sample_rate as f64).round() as u64
        }
    }

    pub fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        let clock = AudioClock::new(48_000);
        assert_eq!(clock.frames(), 0);
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_advance_is_shared_between_clones() {
        let clock = AudioClock::new(1000);
        let reader = clock.clone();
        clock.advance(250);
        clock.advance(250);
        assert_eq!(reader.frames(), 500);
        assert!((reader.now() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_conversions() {
        let clock = AudioClock::new(48_000);
        assert_eq!(clock.seconds_to_frames(0.5), 24_000);
        assert_eq!(clock.seconds_to_frames(-1.0), 0);
        assert!((clock.frames_to_seconds(12_000) - 0.25).abs() < 1e-12);
    }
}

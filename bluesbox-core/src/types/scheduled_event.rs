//! Scheduled event types for look-ahead playback
//!
//! The transport emits these for a future audio-clock time; the audio
//! side starts the matching sound exactly at that time.

use crate::types::DrumSound;

/// An event scheduled for a specific audio-clock time (in seconds)
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    /// When to sound
    pub time: f64,
    /// What to sound
    pub action: ScheduledAction,
}

impl ScheduledEvent {
    /// Create a new scheduled event
    pub fn new(time: f64, action: ScheduledAction) -> Self {
        Self { time, action }
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse order for min-heap behavior (earliest first)
        other
            .time
            .partial_cmp(&self.time)
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

impl Eq for ScheduledEvent {}

/// Backing-band sounds the transport can schedule
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledAction {
    /// One drum hit at a 0-1 velocity
    Drum { sound: DrumSound, velocity: f32 },
    /// One bass note (MIDI pitch) held for `duration` seconds
    Bass { pitch: i32, duration: f64 },
    /// A strummed chord, lowest string first (MIDI pitches)
    Guitar { pitches: Vec<i32> },
}

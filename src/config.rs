//! Session configuration for the engine
//!
//! Nothing here is persisted; every value lives for one session and is
//! clamped into range when set.

/// Hard ceiling for the polyphony cap
pub const MAX_VOICES_LIMIT: usize = 32;
/// Number of lead sample slots
pub const SAMPLE_SLOTS: usize = 8;
/// Number of loop slots
pub const LOOP_SLOTS: usize = 4;

/// Engine-wide timing and resource settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// At most this many lead voices may be held at once
    pub max_voices: usize,
    /// How far in the future the first step is placed on transport start (s)
    pub start_lookahead: f64,
    /// Minimum distance between "now" and a newly scheduled step (s)
    pub schedule_epsilon: f64,
    /// The control loop wakes this much before a step is due (s)
    pub reschedule_margin: f64,
    /// Gap between stopping and restarting a loop on resync (s)
    pub rearm_delay: f64,
    /// Extra time a released voice lives after its release tail (s)
    pub teardown_pad: f64,
    /// Length of the generated reverb impulse response (s)
    pub reverb_seconds: f64,
    /// Seed for the reverb impulse response; `None` draws from entropy
    pub reverb_seed: Option<u64>,
    /// Sample rate used when no device dictates one
    pub sample_rate: u32,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_voices(mut self, max_voices: usize) -> Self {
        self.max_voices = clamp_max_voices(max_voices);
        self
    }

    pub fn with_reverb_seconds(mut self, seconds: f64) -> Self {
        self.reverb_seconds = clamp_reverb_seconds(seconds);
        self
    }

    pub fn with_reverb_seed(mut self, seed: u64) -> Self {
        self.reverb_seed = Some(seed);
        self
    }

    pub fn with_start_lookahead(mut self, seconds: f64) -> Self {
        self.start_lookahead = seconds.clamp(0.0, 1.0);
        self
    }

    pub fn with_rearm_delay(mut self, seconds: f64) -> Self {
        self.rearm_delay = seconds.clamp(0.0, 1.0);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.clamp(8_000, 192_000);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_voices: 8,
            start_lookahead: 0.05,
            schedule_epsilon: 0.005,
            reschedule_margin: 0.01,
            rearm_delay: 0.02,
            teardown_pad: 0.05,
            reverb_seconds: 2.5,
            reverb_seed: None,
            sample_rate: 48_000,
        }
    }
}

pub fn clamp_max_voices(n: usize) -> usize {
    n.clamp(1, MAX_VOICES_LIMIT)
}

pub fn clamp_reverb_seconds(seconds: f64) -> f64 {
    seconds.clamp(0.1, 8.0)
}

/// Clamp a 0-1 volume, treating NaN as silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

//! Mixer: per-role buses, the master gain and the lead effect sends
//!
//! Gains and effect parameters live in atomics shared by the control side
//! (writer) and the render callback (reader), so a fader move never waits
//! on a lock.

use super::sample_buffer::StereoFrame;
use crate::config::clamp_volume;
use bluesbox_core::types::Role;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Longest supported delay time (s)
pub const MAX_DELAY_SECONDS: f32 = 2.0;
/// Shortest supported delay time (s)
pub const MIN_DELAY_SECONDS: f32 = 0.01;
/// Feedback ceiling; the loop gain stays below one
pub const MAX_FEEDBACK: f32 = 0.95;

/// f32 stored as bits in an AtomicU32
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug)]
pub struct BusControl {
    gain: AtomicF32,
    muted: AtomicBool,
}

impl BusControl {
    fn new(gain: f32) -> Self {
        Self {
            gain: AtomicF32::new(gain),
            muted: AtomicBool::new(false),
        }
    }

    pub fn gain(&self) -> f32 {
        self.gain.load()
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Gain actually applied, zero while muted
    pub fn effective_gain(&self) -> f32 {
        if self.is_muted() { 0.0 } else { self.gain() }
    }
}

/// Shared mixer parameters
#[derive(Debug)]
pub struct MixerControls {
    buses: [BusControl; 4],
    master: AtomicF32,
    delay_time: AtomicF32,
    delay_feedback: AtomicF32,
    delay_wet: AtomicF32,
    reverb_wet: AtomicF32,
}

impl MixerControls {
    pub fn new() -> Self {
        Self {
            buses: [
                BusControl::new(0.8),
                BusControl::new(0.8),
                BusControl::new(0.6),
                BusControl::new(0.8),
            ],
            master: AtomicF32::new(0.8),
            delay_time: AtomicF32::new(0.375),
            delay_feedback: AtomicF32::new(0.35),
            delay_wet: AtomicF32::new(0.25),
            reverb_wet: AtomicF32::new(0.2),
        }
    }

    pub fn bus(&self, role: Role) -> &BusControl {
        &self.buses[role.index()]
    }

    pub fn set_bus_gain(&self, role: Role, gain: f32) {
        self.bus(role).gain.store(clamp_volume(gain));
    }

    pub fn set_bus_muted(&self, role: Role, muted: bool) {
        self.bus(role).muted.store(muted, Ordering::Relaxed);
    }

    pub fn master(&self) -> f32 {
        self.master.load()
    }

    pub fn set_master(&self, gain: f32) {
        self.master.store(clamp_volume(gain));
    }

    pub fn delay_time(&self) -> f32 {
        self.delay_time.load()
    }

    pub fn set_delay_time(&self, seconds: f32) {
        let seconds = if seconds.is_nan() { MIN_DELAY_SECONDS } else { seconds };
        self.delay_time
            .store(seconds.clamp(MIN_DELAY_SECONDS, MAX_DELAY_SECONDS));
    }

    pub fn delay_feedback(&self) -> f32 {
        self.delay_feedback.load()
    }

    pub fn set_delay_feedback(&self, feedback: f32) {
        self.delay_feedback
            .store(clamp_volume(feedback).min(MAX_FEEDBACK));
    }

    pub fn delay_wet(&self) -> f32 {
        self.delay_wet.load()
    }

    pub fn set_delay_wet(&self, wet: f32) {
        self.delay_wet.store(clamp_volume(wet));
    }

    pub fn reverb_wet(&self) -> f32 {
        self.reverb_wet.load()
    }

    pub fn set_reverb_wet(&self, wet: f32) {
        self.reverb_wet.store(clamp_volume(wet));
    }
}

impl Default for MixerControls {
    fn default() -> Self {
        Self::new()
    }
}

/// Feedback delay line, one per channel
pub struct DelayLine {
    buffer: Vec<f32>,
    write: usize,
}

impl DelayLine {
    pub fn new(sample_rate: f32) -> Self {
        let len = (MAX_DELAY_SECONDS * sample_rate) as usize + 2;
        Self {
            buffer: vec![0.0; len],
            write: 0,
        }
    }

    /// Push one sample and return the delayed output. Feedback is clamped
    /// below one so the recirculating signal always dies away.
    pub fn process(&mut self, input: f32, delay_frames: usize, feedback: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_frames.clamp(1, len - 1);
        let read = (self.write + len - delay) % len;
        let out = self.buffer[read];
        self.buffer[self.write] = input + out * feedback.clamp(0.0, MAX_FEEDBACK);
        self.write = (self.write + 1) % len;
        out
    }
}

/// Stereo delay for the lead send
pub struct StereoDelay {
    left: DelayLine,
    right: DelayLine,
    sample_rate: f32,
}

impl StereoDelay {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            left: DelayLine::new(sample_rate),
            right: DelayLine::new(sample_rate),
            sample_rate,
        }
    }

    pub fn process(&mut self, input: StereoFrame, seconds: f32, feedback: f32) -> StereoFrame {
        let frames = (seconds * self.sample_rate).round() as usize;
        StereoFrame {
            left: self.left.process(input.left, frames, feedback),
            right: self.right.process(input.right, frames, feedback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let controls = MixerControls::new();
        controls.set_bus_gain(Role::Bass, 1.7);
        assert_eq!(controls.bus(Role::Bass).gain(), 1.0);
        controls.set_delay_feedback(3.0);
        assert_eq!(controls.delay_feedback(), MAX_FEEDBACK);
        controls.set_delay_time(0.0);
        assert_eq!(controls.delay_time(), MIN_DELAY_SECONDS);
        controls.set_delay_time(9.0);
        assert_eq!(controls.delay_time(), MAX_DELAY_SECONDS);
    }

    #[test]
    fn test_mute_zeroes_effective_gain() {
        let controls = MixerControls::new();
        controls.set_bus_gain(Role::Drums, 0.5);
        controls.set_bus_muted(Role::Drums, true);
        assert_eq!(controls.bus(Role::Drums).effective_gain(), 0.0);
        controls.set_bus_muted(Role::Drums, false);
        assert_eq!(controls.bus(Role::Drums).effective_gain(), 0.5);
    }

    #[test]
    fn test_delay_echoes_after_delay_time() {
        let mut line = DelayLine::new(100.0);
        let mut out = Vec::new();
        for i in 0..30 {
            out.push(line.process(if i == 0 { 1.0 } else { 0.0 }, 10, 0.5));
        }
        assert_eq!(out[10], 1.0);
        assert_eq!(out[20], 0.5);
        assert!(out[..10].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_delay_feedback_decays_even_when_overdriven() {
        let mut line = DelayLine::new(1000.0);
        let mut peak_late: f32 = 0.0;
        for i in 0..20_000 {
            let y = line.process(if i == 0 { 1.0 } else { 0.0 }, 5, 10.0);
            assert!(y.is_finite() && y.abs() <= 1.0);
            if i > 19_000 {
                peak_late = peak_late.max(y.abs());
            }
        }
        assert!(peak_late < 1e-3);
    }
}

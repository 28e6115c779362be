//! Drum synthesizer module
//!
//! Provides `DrumOscillator`, the synthesized fallback for the backing kit
//! when no sample is assigned: a swept-sine kick, a band-passed noise snare
//! and high-passed noise hats.

use super::filter;
use bluesbox_core::types::DrumSound;
use biquad::{Biquad, DirectForm2Transposed, Type};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// Kick sweep start frequency (Hz)
const KICK_START_HZ: f32 = 120.0;
/// Kick sweep end frequency (Hz)
const KICK_END_HZ: f32 = 45.0;
/// Kick sweep length (s)
const KICK_SWEEP: f32 = 0.12;

/// Length of each sound in seconds
pub fn drum_duration(sound: DrumSound) -> f32 {
    match sound {
        DrumSound::Kick => 0.5,
        DrumSound::Snare => 0.2,
        DrumSound::HiHat => 0.05,
        DrumSound::OpenHiHat => 0.3,
    }
}

/// A one-shot drum oscillator that synthesizes percussion sounds
pub struct DrumOscillator {
    sound: DrumSound,
    velocity: f32,
    sample_rate: f32,
    sample_count: usize,
    max_samples: usize,
    /// Kick sine phase (cycles)
    phase: f32,
    rng: StdRng,
    /// Band-pass for the snare, high-pass for hats
    filter: Option<DirectForm2Transposed<f32>>,
}

impl DrumOscillator {
    pub fn new(sound: DrumSound, velocity: f32, sample_rate: f32, seed: u64) -> Self {
        let max_samples = (drum_duration(sound) * sample_rate) as usize;
        let filter = match sound {
            DrumSound::Kick => None,
            DrumSound::Snare => Some(filter::design(Type::BandPass, sample_rate, 1800.0, 0.8)),
            DrumSound::HiHat | DrumSound::OpenHiHat => {
                Some(filter::design(Type::HighPass, sample_rate, 7000.0, 0.707))
            }
        };

        Self {
            sound,
            velocity: velocity.clamp(0.0, 1.0),
            sample_rate,
            sample_count: 0,
            max_samples,
            phase: 0.0,
            rng: StdRng::seed_from_u64(seed),
            filter,
        }
    }

    #[inline]
    fn time(&self) -> f32 {
        self.sample_count as f32 / self.sample_rate
    }

    pub fn is_finished(&self) -> bool {
        self.sample_count >= self.max_samples
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }

        let sample = match self.sound {
            DrumSound::Kick => self.kick(),
            DrumSound::Snare => self.noise_burst(0.2),
            DrumSound::HiHat => self.noise_burst(0.05),
            DrumSound::OpenHiHat => self.noise_burst(0.3),
        };

        self.sample_count += 1;
        sample * self.velocity
    }

    /// Kick drum: sine swept exponentially from 120 Hz to 45 Hz over the
    /// first 0.12 s under an exponential decay
    fn kick(&mut self) -> f32 {
        let t = self.time();

        let pitch = if t < KICK_SWEEP {
            KICK_START_HZ * (KICK_END_HZ / KICK_START_HZ).powf(t / KICK_SWEEP)
        } else {
            KICK_END_HZ
        };
        let value = (2.0 * PI * self.phase).sin();
        self.phase = (self.phase + pitch / self.sample_rate).fract();

        value * decay(t, drum_duration(DrumSound::Kick)) * 0.9
    }

    /// Filtered white noise decaying to -60 dB over `length` seconds
    fn noise_burst(&mut self, length: f32) -> f32 {
        let t = self.time();
        let noise: f32 = self.rng.gen_range(-1.0..1.0);
        let filtered = match self.filter.as_mut() {
            Some(f) => f.run(noise),
            None => noise,
        };
        filtered * decay(t, length) * 0.6
    }
}

/// Exponential envelope from 1 to 0.001 across `length` seconds
#[inline]
fn decay(t: f32, length: f32) -> f32 {
    0.001f32.powf(t / length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kick_synthesis() {
        let mut osc = DrumOscillator::new(DrumSound::Kick, 1.0, 44100.0, 1);

        let mut samples = Vec::new();
        for _ in 0..20_000 {
            samples.push(osc.next_sample());
        }

        // sin(0) = 0, so check a few samples in
        assert!(samples[10].abs() > 0.0, "sample[10] should be non-zero");

        let max_early: f32 = samples[0..2000].iter().map(|s| s.abs()).fold(0.0, f32::max);
        assert!(max_early > 0.1, "should have attack energy");

        let max_late: f32 = samples[18_000..20_000]
            .iter()
            .map(|s| s.abs())
            .fold(0.0, f32::max);
        assert!(max_late < max_early, "should decay over time");
    }

    #[test]
    fn test_drum_finishes() {
        let mut osc = DrumOscillator::new(DrumSound::HiHat, 1.0, 44100.0, 1);
        let mut count = 0;
        while !osc.is_finished() {
            osc.next_sample();
            count += 1;
        }
        assert_eq!(count, (0.05 * 44100.0) as usize);
        assert_eq!(osc.next_sample(), 0.0);
    }

    #[test]
    fn test_open_hat_outlasts_closed() {
        assert!(drum_duration(DrumSound::OpenHiHat) > drum_duration(DrumSound::HiHat));
    }

    #[test]
    fn test_velocity_scales_output() {
        let mut loud = DrumOscillator::new(DrumSound::Snare, 1.0, 44100.0, 7);
        let mut soft = DrumOscillator::new(DrumSound::Snare, 0.25, 44100.0, 7);
        for _ in 0..500 {
            let l = loud.next_sample();
            let s = soft.next_sample();
            assert!((l * 0.25 - s).abs() < 1e-5);
        }
    }

    #[test]
    fn test_all_drum_sounds_finite() {
        for drum in [
            DrumSound::Kick,
            DrumSound::Snare,
            DrumSound::HiHat,
            DrumSound::OpenHiHat,
        ] {
            let mut osc = DrumOscillator::new(drum, 0.8, 44100.0, 3);
            while !osc.is_finished() {
                assert!(osc.next_sample().is_finite());
            }
        }
    }
}

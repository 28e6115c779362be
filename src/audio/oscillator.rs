//! Oscillator module with multiple waveform support
//!
//! Provides a phase-accumulating `Oscillator` for sine, saw, square and
//! triangle waves, the exponential `Glide` used for pitch slews, and the
//! soft-clipping wave shaper.

use bluesbox_core::types::Waveform;
use std::f32::consts::PI;

/// Free-running oscillator; frequency is supplied per sample
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    sample_rate: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Generate the next sample at `frequency` Hz
    pub fn next_sample(&mut self, frequency: f32) -> f32 {
        let value = waveform_value(self.waveform, self.phase);

        self.phase += frequency / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        value
    }
}

/// Raw waveform value at `phase` (0.0 to 1.0)
#[inline]
pub fn waveform_value(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        // Smooth, pure tone
        Waveform::Sine => (2.0 * PI * phase).sin(),
        // Ramps from -1 to 1, then resets
        Waveform::Saw => 2.0 * phase - 1.0,
        Waveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Waveform::Triangle => {
            if phase < 0.5 {
                4.0 * phase - 1.0
            } else {
                3.0 - 4.0 * phase
            }
        }
    }
}

/// Exponential slew toward a target frequency
///
/// Each sample moves the current value `1 - exp(-1 / (tau * sr))` of the
/// remaining distance, so after `tau` seconds about 63% of a jump is covered.
#[derive(Debug, Clone)]
pub struct Glide {
    current: f32,
    target: f32,
    coeff: f32,
}

impl Glide {
    pub fn new(frequency: f32, time_constant: f32, sample_rate: f32) -> Self {
        let coeff = if time_constant > 0.0 {
            1.0 - (-1.0 / (time_constant * sample_rate)).exp()
        } else {
            1.0
        };
        Self {
            current: frequency,
            target: frequency,
            coeff,
        }
    }

    pub fn set_target(&mut self, frequency: f32) {
        self.target = frequency;
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn next_value(&mut self) -> f32 {
        self.current += (self.target - self.current) * self.coeff;
        self.current
    }
}

/// Soft clipper `(1 + k) * x / (1 + k * |x|)`; k = 0 is transparent
#[inline]
pub fn wave_shape(x: f32, drive: f32) -> f32 {
    (1.0 + drive) * x / (1.0 + drive * x.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveforms_stay_in_range() {
        for waveform in [
            Waveform::Sine,
            Waveform::Saw,
            Waveform::Square,
            Waveform::Triangle,
        ] {
            let mut osc = Oscillator::new(waveform, 44_100.0);
            for _ in 0..2000 {
                let v = osc.next_sample(440.0);
                assert!((-1.0..=1.0).contains(&v), "{:?} produced {}", waveform, v);
            }
        }
    }

    #[test]
    fn test_square_alternates() {
        assert_eq!(waveform_value(Waveform::Square, 0.25), 1.0);
        assert_eq!(waveform_value(Waveform::Square, 0.75), -1.0);
    }

    #[test]
    fn test_glide_converges() {
        let mut glide = Glide::new(220.0, 0.01, 1000.0);
        glide.set_target(440.0);

        let first = glide.next_value();
        assert!(first > 220.0 && first < 440.0);

        // After 10 samples (one time constant) roughly 63% of the way
        let mut value = first;
        for _ in 0..9 {
            value = glide.next_value();
        }
        let covered = (value - 220.0) / 220.0;
        assert!((covered - 0.632).abs() < 0.02, "covered {}", covered);

        for _ in 0..200 {
            value = glide.next_value();
        }
        assert!((value - 440.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_glide_is_instant() {
        let mut glide = Glide::new(100.0, 0.0, 48_000.0);
        glide.set_target(300.0);
        assert_eq!(glide.next_value(), 300.0);
    }

    #[test]
    fn test_wave_shape() {
        assert_eq!(wave_shape(0.3, 0.0), 0.3);
        assert!((wave_shape(1.0, 5.0) - 1.0).abs() < 1e-6);
        assert!((wave_shape(-1.0, 5.0) + 1.0).abs() < 1e-6);
        // Drive lifts quiet signals toward the rails
        assert!(wave_shape(0.2, 4.0) > 0.2);
    }
}

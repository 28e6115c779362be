//! ADSR (Attack, Decay, Sustain, Release) envelope generator
//!
//! Sample-accurate linear envelopes. Every segment is a straight ramp whose
//! length is given in seconds, so the envelope is sample-rate independent.
//!
//! # Example
//! ```ignore
//! let mut env = AdsrEnvelope::new(AdsrParams::default(), 48_000.0);
//! env.trigger(); // 0 -> 1 over attack, then down to sustain
//!
//! // In the render loop:
//! let amplitude = env.next_sample();
//!
//! // On note-off, ramps from wherever the level is now to 0:
//! env.release();
//! ```

use bluesbox_core::types::AdsrParams;

/// ADSR envelope stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    /// Not active, output is 0
    Idle,
    /// Rising from 0 to peak (1.0)
    Attack,
    /// Falling from peak to sustain level
    Decay,
    /// Holding at sustain level while note is held
    Sustain,
    /// Falling from the latched level to 0 after note-off
    Release,
}

/// Per-sample linear ADSR envelope
pub struct AdsrEnvelope {
    params: AdsrParams,
    stage: EnvelopeStage,
    level: f32,
    sample_rate: f32,
    /// Per-sample decrement for the current release ramp
    release_step: f32,
}

impl AdsrEnvelope {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        Self {
            params,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            sample_rate,
            release_step: 0.0,
        }
    }

    /// Start the envelope from zero
    pub fn trigger(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Attack;
    }

    /// Enter release from the current level, wherever the envelope is.
    ///
    /// Any remaining attack or decay ramp is abandoned; the level is latched
    /// and ramps linearly to 0 over the release time.
    pub fn release(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        let samples = (self.params.release * self.sample_rate).max(1.0);
        self.release_step = self.level / samples;
        self.stage = EnvelopeStage::Release;
        if self.level <= 0.0 {
            self.stage = EnvelopeStage::Idle;
        }
    }

    /// Generate the next envelope value
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                self.level += 1.0 / (self.params.attack * self.sample_rate).max(1.0);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let sustain = self.params.sustain;
                let samples = self.params.decay * self.sample_rate;
                if samples < 1.0 {
                    self.level = sustain;
                } else {
                    self.level -= (1.0 - sustain) / samples;
                }
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.level = self.params.sustain;
            }
            EnvelopeStage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Whether the envelope has completed (in Idle after release)
    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Whether the envelope is still sounding
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn params(&self) -> AdsrParams {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    #[test]
    fn test_envelope_starts_idle() {
        let env = AdsrEnvelope::new(AdsrParams::default(), SR);
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert!(env.is_finished());
    }

    #[test]
    fn test_attack_is_linear() {
        let params = AdsrParams::new(0.1, 0.1, 0.5, 0.1);
        let mut env = AdsrEnvelope::new(params, SR);
        env.trigger();

        // 100 samples of attack at 1 kHz: level climbs 0.01 per sample
        let first = env.next_sample();
        let second = env.next_sample();
        assert!((first - 0.01).abs() < 1e-5);
        assert!((second - 0.02).abs() < 1e-5);
    }

    #[test]
    fn test_reaches_sustain() {
        let params = AdsrParams::new(0.01, 0.02, 0.6, 0.1);
        let mut env = AdsrEnvelope::new(params, SR);
        env.trigger();
        for _ in 0..100 {
            env.next_sample();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_release_latches_current_level() {
        let params = AdsrParams::new(0.1, 0.1, 0.5, 0.05);
        let mut env = AdsrEnvelope::new(params, SR);
        env.trigger();

        // Release halfway through the attack
        for _ in 0..50 {
            env.next_sample();
        }
        let latched = env.level();
        assert!((latched - 0.5).abs() < 1e-3);

        env.release();
        assert_eq!(env.stage(), EnvelopeStage::Release);
        let next = env.next_sample();
        assert!(next < latched, "release must not jump back to the peak");

        // 50 samples of release gets us to silence
        for _ in 0..60 {
            env.next_sample();
        }
        assert!(env.is_finished());
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_release_from_idle_is_noop() {
        let mut env = AdsrEnvelope::new(AdsrParams::default(), SR);
        env.release();
        assert!(env.is_finished());
    }

    #[test]
    fn test_zero_sustain_pluck_settles_at_zero() {
        let mut env = AdsrEnvelope::new(AdsrParams::pluck(), SR);
        env.trigger();
        for _ in 0..1000 {
            env.next_sample();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert_eq!(env.level(), 0.0);
    }
}

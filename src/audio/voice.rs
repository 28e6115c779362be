//! Render-side voices
//!
//! A voice is one sounding note. Lead voices, the sequenced bass and every
//! string of a guitar strum are all `Voice`s; they differ only in patch and
//! in who decides when they are released.

use super::adsr::AdsrEnvelope;
use super::filter;
use super::oscillator::{Glide, Oscillator, wave_shape};
use super::sample_buffer::{PcmBuffer, StereoFrame};
use biquad::{Biquad, DirectForm2Transposed, Type};
use bluesbox_core::types::{AdsrParams, SynthVoiceConfig, Waveform, cents_to_ratio, midi_to_frequency};
use std::sync::Arc;

/// Identifier the control side assigns to each started voice
pub type VoiceId = u64;

/// Output gain of a single synth voice before the bus
const SYNTH_LEVEL: f32 = 0.3;

/// Envelope for sampled backing hits: full level, short declick release
pub fn one_shot_envelope() -> AdsrParams {
    AdsrParams::new(0.002, 0.0, 1.0, 0.12)
}

/// Patch for the sequenced synth bass
pub fn bass_patch() -> SynthVoiceConfig {
    SynthVoiceConfig {
        wave_a: Waveform::Saw,
        wave_b: Waveform::Sine,
        mix_a: 0.5,
        mix_b: 0.7,
        detune_cents: 0.0,
        cutoff_hz: 700.0,
        resonance_q: 0.9,
        drive: 1.0,
        glide_seconds: 0.0,
        envelope: AdsrParams::bass(),
    }
}

/// Patch for one string of the guitar strum
pub fn guitar_patch() -> SynthVoiceConfig {
    SynthVoiceConfig {
        wave_a: Waveform::Triangle,
        wave_b: Waveform::Saw,
        mix_a: 0.6,
        mix_b: 0.2,
        detune_cents: 3.0,
        cutoff_hz: 2800.0,
        resonance_q: 0.7,
        drive: 0.5,
        glide_seconds: 0.0,
        envelope: AdsrParams::pluck(),
    }
}

/// What the control side asks the render side to start
#[derive(Debug, Clone)]
pub enum VoiceSpec {
    Synth {
        pitch: i32,
        config: SynthVoiceConfig,
    },
    Sampler {
        buffer: Arc<PcmBuffer>,
        root_pitch: i32,
        pitch: i32,
        envelope: AdsrParams,
    },
}

impl VoiceSpec {
    pub fn build(self, sample_rate: f32) -> Voice {
        match self {
            VoiceSpec::Synth { pitch, config } => {
                Voice::Synth(SynthVoice::new(pitch, config, sample_rate))
            }
            VoiceSpec::Sampler {
                buffer,
                root_pitch,
                pitch,
                envelope,
            } => Voice::Sampler(SamplerVoice::new(
                buffer,
                root_pitch,
                pitch,
                envelope,
                sample_rate,
            )),
        }
    }
}

/// Two detuned oscillators into a resonant lowpass, a soft clipper and an
/// amplitude envelope
pub struct SynthVoice {
    config: SynthVoiceConfig,
    osc_a: Oscillator,
    osc_b: Oscillator,
    glide: Glide,
    detune_ratio: f32,
    filter: DirectForm2Transposed<f32>,
    envelope: AdsrEnvelope,
}

impl SynthVoice {
    pub fn new(pitch: i32, config: SynthVoiceConfig, sample_rate: f32) -> Self {
        let config = config.clamped();
        let mut envelope = AdsrEnvelope::new(config.envelope, sample_rate);
        envelope.trigger();

        Self {
            osc_a: Oscillator::new(config.wave_a, sample_rate),
            osc_b: Oscillator::new(config.wave_b, sample_rate),
            glide: Glide::new(
                midi_to_frequency(pitch as f32),
                config.glide_seconds,
                sample_rate,
            ),
            detune_ratio: cents_to_ratio(config.detune_cents),
            filter: filter::design(
                Type::LowPass,
                sample_rate,
                config.cutoff_hz,
                config.resonance_q,
            ),
            envelope,
            config,
        }
    }

    /// Slide both oscillators toward a new pitch without retriggering
    pub fn retarget(&mut self, pitch: i32) {
        self.glide.set_target(midi_to_frequency(pitch as f32));
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    pub fn target_frequency(&self) -> f32 {
        self.glide.target()
    }

    pub fn next_sample(&mut self) -> f32 {
        let freq = self.glide.next_value();
        let a = self.osc_a.next_sample(freq) * self.config.mix_a;
        let b = self.osc_b.next_sample(freq * self.detune_ratio) * self.config.mix_b;
        let filtered = self.filter.run(a + b);
        let shaped = wave_shape(filtered, self.config.drive);
        shaped * self.envelope.next_sample() * SYNTH_LEVEL
    }
}

/// Pitched playback of a sample buffer
pub struct SamplerVoice {
    buffer: Arc<PcmBuffer>,
    position: f64,
    rate: f64,
    envelope: AdsrEnvelope,
}

impl SamplerVoice {
    pub fn new(
        buffer: Arc<PcmBuffer>,
        root_pitch: i32,
        pitch: i32,
        envelope: AdsrParams,
        sample_rate: f32,
    ) -> Self {
        let mut envelope = AdsrEnvelope::new(envelope, sample_rate);
        envelope.trigger();
        let rate = sampler_rate(&buffer, root_pitch, pitch, sample_rate);
        Self {
            buffer,
            position: 0.0,
            rate,
            envelope,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished() || self.position >= self.buffer.len() as f64
    }

    pub fn next_frame(&mut self) -> StereoFrame {
        if self.is_finished() {
            return StereoFrame::default();
        }
        let frame = self.buffer.frame_at(self.position);
        self.position += self.rate;
        frame.scaled(self.envelope.next_sample())
    }
}

/// Playback rate for a sample recorded at `root_pitch` to sound at `pitch`,
/// corrected for the buffer's own sample rate
pub fn sampler_rate(buffer: &PcmBuffer, root_pitch: i32, pitch: i32, sample_rate: f32) -> f64 {
    let cents = (pitch - root_pitch) as f32 * 100.0;
    cents_to_ratio(cents) as f64 * buffer.sample_rate() as f64 / sample_rate as f64
}

/// A sounding voice of either kind
pub enum Voice {
    Synth(SynthVoice),
    Sampler(SamplerVoice),
}

impl Voice {
    /// Change pitch in place; returns false if this voice cannot
    pub fn retarget(&mut self, pitch: i32) -> bool {
        match self {
            Voice::Synth(v) => {
                v.retarget(pitch);
                true
            }
            Voice::Sampler(_) => false,
        }
    }

    pub fn release(&mut self) {
        match self {
            Voice::Synth(v) => v.release(),
            Voice::Sampler(v) => v.release(),
        }
    }

    pub fn is_finished(&self) -> bool {
        match self {
            Voice::Synth(v) => v.is_finished(),
            Voice::Sampler(v) => v.is_finished(),
        }
    }

    pub fn next_frame(&mut self) -> StereoFrame {
        match self {
            Voice::Synth(v) => StereoFrame::mono(v.next_sample()),
            Voice::Sampler(v) => v.next_frame(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48_000.0;

    #[test]
    fn test_synth_voice_sounds_and_releases() {
        let mut voice = SynthVoice::new(60, SynthVoiceConfig::default(), SR);
        let peak = (0..4800).map(|_| voice.next_sample().abs()).fold(0.0, f32::max);
        assert!(peak > 0.01);

        voice.release();
        // Default release is 0.3 s
        for _ in 0..(0.31 * SR) as usize {
            voice.next_sample();
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn test_synth_output_bounded() {
        let config = SynthVoiceConfig {
            drive: 50.0,
            resonance_q: 20.0,
            ..SynthVoiceConfig::default()
        };
        let mut voice = SynthVoice::new(48, config, SR);
        for _ in 0..48_000 {
            let s = voice.next_sample();
            assert!(s.is_finite() && s.abs() <= 1.0);
        }
    }

    #[test]
    fn test_retarget_moves_target_without_retrigger() {
        let mut voice = Voice::Synth(SynthVoice::new(60, SynthVoiceConfig::default(), SR));
        assert!(voice.retarget(72));
        if let Voice::Synth(v) = &voice {
            assert!((v.target_frequency() - midi_to_frequency(72.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_sampler_rate() {
        let buffer = PcmBuffer::from_mono(&[0.0; 16], 24_000);
        // One octave up from the root, buffer at half the engine rate
        let rate = sampler_rate(&buffer, 60, 72, 48_000.0);
        assert!((rate - 1.0).abs() < 1e-6);
        assert!((sampler_rate(&buffer, 60, 60, 24_000.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sampler_cannot_retarget_and_ends_with_buffer() {
        let buffer = Arc::new(PcmBuffer::from_mono(&[0.5; 100], 48_000));
        let mut voice = Voice::Sampler(SamplerVoice::new(buffer, 60, 60, one_shot_envelope(), SR));
        assert!(!voice.retarget(62));
        for _ in 0..100 {
            voice.next_frame();
        }
        assert!(voice.is_finished());
        assert_eq!(voice.next_frame(), StereoFrame::default());
    }
}

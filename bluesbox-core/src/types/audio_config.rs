//! Audio configuration types
//!
//! These pure data types carry no synthesis/playback logic. They define
//! waveforms, envelopes and the lead synth patch, and are snapshotted by
//! every voice at the moment it starts.

/// Available oscillator waveform types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Waveform {
    Sine,
    #[default]
    Saw,
    Square,
    Triangle,
}

impl Waveform {
    /// Parse waveform from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Waveform> {
        match s.to_lowercase().as_str() {
            "sine" | "sin" => Some(Waveform::Sine),
            "saw" | "sawtooth" => Some(Waveform::Saw),
            "square" | "sq" => Some(Waveform::Square),
            "triangle" | "tri" => Some(Waveform::Triangle),
            _ => None,
        }
    }

    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
        }
    }
}

/// ADSR envelope parameters
///
/// - `attack`: Time in seconds to rise from 0 to peak (1.0)
/// - `decay`: Time in seconds to fall from peak to sustain level
/// - `sustain`: Level to hold while note is held (0.0-1.0, NOT time!)
/// - `release`: Time in seconds to fall from the current level to 0 after note-off
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl AdsrParams {
    /// Create custom ADSR parameters
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.max(0.001), // Minimum 1ms to avoid clicks
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.001), // Minimum 1ms to avoid clicks
        }
    }

    /// Default lead envelope - quick attack, moderate sustain
    pub fn default_envelope() -> Self {
        Self::new(0.01, 0.15, 0.7, 0.3)
    }

    /// Pluck - fast attack, quick decay, no sustain
    /// Used for the strummed guitar tones
    pub fn pluck() -> Self {
        Self::new(0.004, 0.35, 0.0, 0.08)
    }

    /// Bass - firm attack, short decay into a held body
    pub fn bass() -> Self {
        Self::new(0.005, 0.12, 0.6, 0.06)
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self::default_envelope()
    }
}

/// Which kind of voice the lead keyboard spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LeadEngine {
    #[default]
    Synth,
    Sampler,
}

/// Patch for the two-oscillator lead synth
///
/// Voices copy the config when they start; editing it afterwards only
/// affects voices started later.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SynthVoiceConfig {
    pub wave_a: Waveform,
    pub wave_b: Waveform,
    /// Blend gain of oscillator A (0-1)
    pub mix_a: f32,
    /// Blend gain of oscillator B (0-1)
    pub mix_b: f32,
    /// Detune of oscillator B in cents
    pub detune_cents: f32,
    /// Lowpass cutoff in Hz
    pub cutoff_hz: f32,
    /// Lowpass resonance (Q)
    pub resonance_q: f32,
    /// Wave-shaper intensity; higher pushes toward hard clipping
    pub drive: f32,
    /// Pitch slew time constant in seconds
    pub glide_seconds: f32,
    pub envelope: AdsrParams,
}

impl SynthVoiceConfig {
    /// Return a copy with every field forced into its valid range
    pub fn clamped(self) -> Self {
        Self {
            mix_a: self.mix_a.clamp(0.0, 1.0),
            mix_b: self.mix_b.clamp(0.0, 1.0),
            detune_cents: self.detune_cents.clamp(-1200.0, 1200.0),
            cutoff_hz: self.cutoff_hz.clamp(40.0, 18_000.0),
            resonance_q: self.resonance_q.clamp(0.1, 30.0),
            drive: self.drive.clamp(0.0, 100.0),
            glide_seconds: self.glide_seconds.clamp(0.0, 2.0),
            envelope: AdsrParams::new(
                self.envelope.attack,
                self.envelope.decay,
                self.envelope.sustain,
                self.envelope.release,
            ),
            ..self
        }
    }
}

impl Default for SynthVoiceConfig {
    fn default() -> Self {
        Self {
            wave_a: Waveform::Saw,
            wave_b: Waveform::Square,
            mix_a: 0.6,
            mix_b: 0.4,
            detune_cents: 7.0,
            cutoff_hz: 2400.0,
            resonance_q: 1.2,
            drive: 2.0,
            glide_seconds: 0.04,
            envelope: AdsrParams::default(),
        }
    }
}

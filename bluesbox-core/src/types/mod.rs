// bluesbox-core/src/types/mod.rs

pub mod audio_config;
pub mod chord;
pub mod drum;
pub mod note;
pub mod progression;
pub mod scale;
pub mod scheduled_event;
pub mod sequence;
pub mod transport;

pub use audio_config::{AdsrParams, LeadEngine, SynthVoiceConfig, Waveform};
pub use chord::{Chord, ChordQuality};
pub use drum::{DrumSound, Role, SourceMode};
pub use note::{PitchClass, cents_to_ratio, midi_to_frequency};
pub use progression::{
    BARS_PER_CYCLE, Bar, BluesForm, Degree, Progression, Variation, build_progression,
    build_progression_with,
};
pub use scale::{PitchClassSet, quantize, scale_for};
pub use scheduled_event::{ScheduledAction, ScheduledEvent};
pub use sequence::{CATALOG, Groove, SequenceDescriptor, default_sequence, find_sequence};
pub use transport::TransportState;

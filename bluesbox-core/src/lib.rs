//! # Bluesbox Core
//!
//! Device-free core library for the Bluesbox accompaniment engine.
//! Provides the musical data model and the timing arithmetic without any
//! audio or threading dependencies.
//!
//! ## Features
//!
//! - **serde**: Enable serialization of the data types
//! - **colored**: Enable colored terminal output for chords and progressions
//!
//! ## Example
//!
//! ```ignore
//! use bluesbox_core::types::{build_progression, scale_for, PitchClass, Variation};
//!
//! let progression = build_progression(PitchClass::C, Variation::Basic);
//! let highlighted = scale_for(&progression[0].chord);
//! assert_eq!(highlighted.len(), 6);
//! ```

pub mod types;

// Re-export commonly used types
pub use types::{
    AdsrParams, Chord, PitchClass, Progression, SynthVoiceConfig, TransportState, Variation,
    Waveform,
};

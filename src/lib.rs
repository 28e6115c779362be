//! # Bluesbox
//!
//! Bluesbox is a 12-bar blues accompaniment engine. It plays a drum, bass
//! and rhythm-guitar backing band over a selectable blues progression and
//! lets a performer play a lead voice on top, snapped to the blues scale
//! of whichever chord is sounding.
//!
//! The musical data model lives in `bluesbox-core`; this crate adds the
//! sound and the timing.
//!
//! ## Modules
//!
//! - `audio`: Voices, the render graph with its delay and reverb sends,
//!   the look-ahead transport, the loop synchronizer, the engine facade and
//!   the control-loop thread that hosts it.
//! - `config`: Session settings with their clamping rules.
//! - `error`: The error taxonomy surfaced to UI code.
//!
//! ## Example
//!
//! ```ignore
//! use bluesbox::audio::{BluesBox, CpalBackend, InputId};
//! use bluesbox::config::EngineConfig;
//!
//! let bluesbox = BluesBox::spawn(EngineConfig::default(), Box::new(CpalBackend))?;
//! bluesbox.select_sequence("c-shuffle")?;
//! bluesbox.start_transport()?;
//! bluesbox.note_on(InputId::Key("a".into()), 60)?;
//! ```

pub mod audio;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use crate::audio::{BluesBox, Engine, EngineSnapshot, InputId, NoteOutcome};
pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, Result};
pub use bluesbox_core::types::{Role, SourceMode, TransportState};

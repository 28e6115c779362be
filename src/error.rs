//! Engine error taxonomy

use bluesbox_core::types::Role;

/// Errors surfaced to the UI layer.
///
/// A note played at the voice cap is not an error; it comes back as
/// `NoteOutcome::Dropped`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No audio device, or the platform refused to open a stream
    #[error("Audio environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// A loaded file could not be decoded; the slot stays empty
    #[error("Failed to decode audio for {slot}: {reason}")]
    Decode { slot: String, reason: String },

    #[error("Unknown sequence: {0}")]
    UnknownSequence(String),

    #[error("No such slot: {0}")]
    UnknownSlot(usize),

    /// The control thread has shut down
    #[error("Engine thread has stopped")]
    Disconnected,

    /// Loops only exist for the drum and bass roles
    #[error("Loops cannot be assigned to the {0} role")]
    LoopRole(Role),
}

pub type Result<T> = std::result::Result<T, EngineError>;

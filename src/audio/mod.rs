pub mod adsr;
pub mod audio;
pub mod clock;
pub mod drum_synth;
pub mod engine;
pub mod filter;
pub mod loop_sync;
pub mod mixer;
pub mod oscillator;
pub mod render;
pub mod reverb;
pub mod sample_bank;
pub mod sample_buffer;
pub mod scheduler;
pub mod transport;
pub mod voice;
pub mod voice_registry;

// Re-export the types most callers need
pub use audio::{AudioBackend, CpalBackend, OfflineBackend};
pub use engine::{Engine, EngineSnapshot};
pub use scheduler::BluesBox;
pub use voice_registry::{InputId, NoteOutcome};

//! Held-voice bookkeeping on the control side
//!
//! Maps each input (a keyboard key or a pointer) to the voice it started.
//! The polyphony cap is enforced here: a note-on past the cap is dropped,
//! and held voices are never stolen.

use super::voice::VoiceId;
use std::collections::HashMap;
use std::fmt;

/// Something that can hold a lead note down
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InputId {
    /// A computer-keyboard key, by its label
    Key(String),
    /// A pointer (mouse button or touch) by its identifier
    Pointer(u64),
}

impl fmt::Display for InputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputId::Key(label) => write!(f, "key:{}", label),
            InputId::Pointer(id) => write!(f, "pointer:{}", id),
        }
    }
}

/// Which engine produced a held voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceKind {
    Synth,
    Sampler { slot: usize },
}

/// One held lead voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldVoice {
    pub id: VoiceId,
    /// Pitch actually sounding, after quantization
    pub pitch: i32,
    pub kind: VoiceKind,
}

/// Result of a note-on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOutcome {
    Started { id: VoiceId, pitch: i32 },
    /// The input already holds a voice; nothing changed
    AlreadyHeld,
    /// The polyphony cap was reached; the note was ignored
    Dropped,
}

#[derive(Debug)]
pub struct VoiceRegistry {
    held: HashMap<InputId, HeldVoice>,
    max_voices: usize,
    next_id: VoiceId,
}

impl VoiceRegistry {
    pub fn new(max_voices: usize) -> Self {
        Self {
            held: HashMap::new(),
            max_voices: max_voices.max(1),
            next_id: 1,
        }
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Change the cap; voices already held past a lower cap keep sounding
    pub fn set_max_voices(&mut self, max_voices: usize) {
        self.max_voices = max_voices.max(1);
    }

    pub fn active_count(&self) -> usize {
        self.held.len()
    }

    pub fn get(&self, input: &InputId) -> Option<&HeldVoice> {
        self.held.get(input)
    }

    /// Fresh identifier for a voice about to start
    pub fn allocate_id(&mut self) -> VoiceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Check whether a new voice may start for `input`
    pub fn admit(&self, input: &InputId) -> Option<NoteOutcome> {
        if self.held.contains_key(input) {
            Some(NoteOutcome::AlreadyHeld)
        } else if self.held.len() >= self.max_voices {
            Some(NoteOutcome::Dropped)
        } else {
            None
        }
    }

    /// Record a started voice
    pub fn insert(&mut self, input: InputId, voice: HeldVoice) {
        self.held.insert(input, voice);
    }

    /// Remove and return the voice held by `input`
    pub fn release(&mut self, input: &InputId) -> Option<HeldVoice> {
        self.held.remove(input)
    }

    /// Replace the voice held by `input`, keeping the count unchanged
    pub fn replace(&mut self, input: &InputId, voice: HeldVoice) -> Option<HeldVoice> {
        let slot = self.held.get_mut(input)?;
        Some(std::mem::replace(slot, voice))
    }

    /// Update the sounding pitch of a retargeted voice
    pub fn set_pitch(&mut self, input: &InputId, pitch: i32) {
        if let Some(voice) = self.held.get_mut(input) {
            voice.pitch = pitch;
        }
    }

    /// Release every held voice
    pub fn drain(&mut self) -> Vec<HeldVoice> {
        self.held.drain().map(|(_, voice)| voice).collect()
    }

    /// Remove every voice started from a given sampler slot
    pub fn drain_slot(&mut self, slot: usize) -> Vec<HeldVoice> {
        let inputs: Vec<InputId> = self
            .held
            .iter()
            .filter(|(_, v)| v.kind == VoiceKind::Sampler { slot })
            .map(|(input, _)| input.clone())
            .collect();
        inputs
            .iter()
            .filter_map(|input| self.held.remove(input))
            .collect()
    }
}

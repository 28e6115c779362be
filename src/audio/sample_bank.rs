//! Lead sample bank
//!
//! Up to `SAMPLE_SLOTS` recorded notes, each tagged with the pitch it was
//! recorded at. The sampler voice plays whichever in-use slot has the root
//! closest to the requested pitch.

use super::sample_buffer::PcmBuffer;
use crate::config::SAMPLE_SLOTS;
use crate::error::{EngineError, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SampleSlot {
    pub buffer: Arc<PcmBuffer>,
    /// MIDI pitch the sample sounds at when played back unshifted
    pub root_pitch: i32,
    pub in_use: bool,
}

#[derive(Debug)]
pub struct SampleBank {
    slots: Vec<Option<SampleSlot>>,
}

impl SampleBank {
    pub fn new() -> Self {
        Self {
            slots: vec![None; SAMPLE_SLOTS],
        }
    }

    /// Fill a slot; newly loaded slots are in use
    pub fn load(&mut self, index: usize, buffer: Arc<PcmBuffer>, root_pitch: i32) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(EngineError::UnknownSlot(index))?;
        *slot = Some(SampleSlot {
            buffer,
            root_pitch: root_pitch.clamp(0, 127),
            in_use: true,
        });
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(EngineError::UnknownSlot(index))?;
        *slot = None;
        Ok(())
    }

    /// Toggle whether a loaded slot takes part in note selection
    pub fn set_in_use(&mut self, index: usize, in_use: bool) -> Result<()> {
        match self.slots.get_mut(index) {
            Some(Some(slot)) => {
                slot.in_use = in_use;
                Ok(())
            }
            Some(None) => Ok(()),
            None => Err(EngineError::UnknownSlot(index)),
        }
    }

    pub fn get(&self, index: usize) -> Option<&SampleSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of slots taking part in note selection
    pub fn active_len(&self) -> usize {
        self.active().count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_len() == 0
    }

    fn active(&self) -> impl Iterator<Item = (usize, &SampleSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, s)))
            .filter(|(_, slot)| slot.in_use)
    }

    /// In-use slot whose root is closest to `pitch`; the lowest slot wins ties
    pub fn closest(&self, pitch: i32) -> Option<(usize, &SampleSlot)> {
        let mut best: Option<(usize, &SampleSlot)> = None;
        for (index, slot) in self.active() {
            let distance = (slot.root_pitch - pitch).abs();
            match best {
                Some((_, current)) if (current.root_pitch - pitch).abs() <= distance => {}
                _ => best = Some((index, slot)),
            }
        }
        best
    }
}

impl Default for SampleBank {
    fn default() -> Self {
        Self::new()
    }
}

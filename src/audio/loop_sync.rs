//! Loop synchronizer
//!
//! Keeps loop slots stretched to a whole number of bars and phase-locked
//! to the transport. Any change that affects timing while the transport
//! runs stops the affected loops at once and restarts them after a short
//! re-arm delay, at an offset that lines the loop's bar boundary up with
//! the running bar.

use super::render::LoopStart;
use super::sample_buffer::PcmBuffer;
use crate::config::{LOOP_SLOTS, clamp_volume};
use crate::error::{EngineError, Result};
use bluesbox_core::types::transport::{clamp_bar_span, loop_playback_rate, loop_start_offset};
use bluesbox_core::types::{Role, SourceMode};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Transport facts a resync needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopContext {
    pub now: f64,
    pub playing: bool,
    pub tempo: u32,
    pub bar_index: usize,
}

/// What the render side must do
#[derive(Debug, Clone)]
pub enum LoopAction {
    Stop { slot: usize },
    Start { start: LoopStart, at: f64 },
    SetVolume { slot: usize, volume: f32 },
}

#[derive(Debug, Clone)]
pub struct LoopSlot {
    pub buffer: Option<Arc<PcmBuffer>>,
    pub role: Role,
    pub volume: f32,
    pub enabled: bool,
    pub bar_span: u32,
}

impl Default for LoopSlot {
    fn default() -> Self {
        Self {
            buffer: None,
            role: Role::Drums,
            volume: 0.8,
            enabled: false,
            bar_span: 4,
        }
    }
}

#[derive(Debug)]
pub struct LoopSynchronizer {
    slots: Vec<LoopSlot>,
    /// Source mode for the drum and bass roles
    modes: [SourceMode; 2],
    /// Slots waiting to restart, and when
    rearm: Option<(f64, BTreeSet<usize>)>,
    rearm_delay: f64,
}

impl LoopSynchronizer {
    pub fn new(rearm_delay: f64) -> Self {
        Self {
            slots: vec![LoopSlot::default(); LOOP_SLOTS],
            modes: [SourceMode::Sequence; 2],
            rearm: None,
            rearm_delay,
        }
    }

    pub fn slot(&self, index: usize) -> Result<&LoopSlot> {
        self.slots.get(index).ok_or(EngineError::UnknownSlot(index))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut LoopSlot> {
        self.slots
            .get_mut(index)
            .ok_or(EngineError::UnknownSlot(index))
    }

    pub fn source_mode(&self, role: Role) -> SourceMode {
        match role {
            Role::Drums => self.modes[0],
            Role::Bass => self.modes[1],
            Role::Guitar | Role::Lead => SourceMode::Sequence,
        }
    }

    /// Whether sequenced triggers for `role` are replaced by loops
    pub fn suppresses(&self, role: Role) -> bool {
        self.source_mode(role) == SourceMode::Loop
    }

    fn should_play(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(|slot| {
            slot.enabled
                && slot.buffer.is_some()
                && self.source_mode(slot.role) == SourceMode::Loop
        })
    }

    /// Next pending re-arm time
    pub fn next_wake(&self) -> Option<f64> {
        self.rearm.as_ref().map(|(due, _)| *due)
    }

    /// Put a decoded buffer into a slot
    pub fn load(
        &mut self,
        index: usize,
        buffer: Arc<PcmBuffer>,
        role: Role,
        ctx: LoopContext,
    ) -> Result<Vec<LoopAction>> {
        if !matches!(role, Role::Drums | Role::Bass) {
            return Err(EngineError::LoopRole(role));
        }
        let slot = self.slot_mut(index)?;
        slot.buffer = Some(buffer);
        slot.role = role;
        Ok(self.resync([index], ctx))
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool, ctx: LoopContext) -> Result<Vec<LoopAction>> {
        self.slot_mut(index)?.enabled = enabled;
        if enabled {
            Ok(self.resync([index], ctx))
        } else {
            self.cancel_rearm(index);
            Ok(vec![LoopAction::Stop { slot: index }])
        }
    }

    pub fn set_bar_span(&mut self, index: usize, bars: i64, ctx: LoopContext) -> Result<Vec<LoopAction>> {
        self.slot_mut(index)?.bar_span = clamp_bar_span(bars);
        Ok(self.resync([index], ctx))
    }

    /// Volume changes apply live, without a restart
    pub fn set_volume(&mut self, index: usize, volume: f32) -> Result<Vec<LoopAction>> {
        let volume = clamp_volume(volume);
        self.slot_mut(index)?.volume = volume;
        Ok(vec![LoopAction::SetVolume {
            slot: index,
            volume,
        }])
    }

    /// Switch a role between sequenced triggers and its loops; every
    /// enabled loop of that role is resynced
    pub fn set_source_mode(&mut self, role: Role, mode: SourceMode, ctx: LoopContext) -> Vec<LoopAction> {
        let idx = match role {
            Role::Drums => 0,
            Role::Bass => 1,
            Role::Guitar | Role::Lead => return Vec::new(),
        };
        self.modes[idx] = mode;
        let affected: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.role == role && slot.enabled)
            .map(|(i, _)| i)
            .collect();
        self.resync(affected, ctx)
    }

    /// Tempo changed: every enabled loop must be re-stretched
    pub fn on_tempo_change(&mut self, ctx: LoopContext) -> Vec<LoopAction> {
        let enabled: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.enabled)
            .map(|(i, _)| i)
            .collect();
        self.resync(enabled, ctx)
    }

    /// Transport started: loops begin with the first step, from bar 0
    pub fn on_transport_start(&mut self, first_step: f64, tempo: u32) -> Vec<LoopAction> {
        self.rearm = None;
        (0..self.slots.len())
            .filter(|&i| self.should_play(i))
            .filter_map(|i| self.placement(i, tempo, 0))
            .map(|start| LoopAction::Start {
                start,
                at: first_step,
            })
            .collect()
    }

    /// Transport stopped: loops have no release, they stop at once
    pub fn on_transport_stop(&mut self) -> Vec<LoopAction> {
        self.rearm = None;
        (0..self.slots.len())
            .map(|slot| LoopAction::Stop { slot })
            .collect()
    }

    /// Restart slots whose re-arm delay has elapsed
    pub fn service(&mut self, ctx: LoopContext) -> Vec<LoopAction> {
        match &self.rearm {
            Some((due, _)) if *due <= ctx.now => {}
            _ => return Vec::new(),
        }
        let Some((_, slots)) = self.rearm.take() else {
            return Vec::new();
        };
        if !ctx.playing {
            return Vec::new();
        }

        slots
            .into_iter()
            .filter(|&i| self.should_play(i))
            .filter_map(|i| self.placement(i, ctx.tempo, ctx.bar_index))
            .map(|start| {
                info!(
                    slot = start.slot,
                    rate = start.rate,
                    offset = start.offset,
                    bar = ctx.bar_index,
                    "loop restarted"
                );
                LoopAction::Start { start, at: ctx.now }
            })
            .collect()
    }

    /// Rate and offset for slot `index` at the given tempo and bar
    pub fn placement(&self, index: usize, tempo: u32, bar_index: usize) -> Option<LoopStart> {
        let slot = self.slots.get(index)?;
        let buffer = slot.buffer.clone()?;
        Some(LoopStart {
            slot: index,
            role: slot.role,
            rate: loop_playback_rate(buffer.duration(), slot.bar_span, tempo),
            offset: loop_start_offset(bar_index, slot.bar_span, tempo),
            volume: slot.volume,
            buffer,
        })
    }

    /// Stop now, restart after the re-arm delay
    fn resync(&mut self, slots: impl IntoIterator<Item = usize>, ctx: LoopContext) -> Vec<LoopAction> {
        if !ctx.playing {
            return Vec::new();
        }
        let due = ctx.now + self.rearm_delay;
        let (pending_due, pending) = self.rearm.get_or_insert_with(|| (due, BTreeSet::new()));
        *pending_due = due;

        let mut actions = Vec::new();
        for slot in slots {
            pending.insert(slot);
            actions.push(LoopAction::Stop { slot });
        }
        debug!(count = actions.len(), due, "loop resync armed");
        actions
    }

    fn cancel_rearm(&mut self, index: usize) {
        if let Some((_, pending)) = self.rearm.as_mut() {
            pending.remove(&index);
            if pending.is_empty() {
                self.rearm = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesbox_core::types::transport::seconds_per_beat;

    fn ctx(now: f64, bar_index: usize) -> LoopContext {
        LoopContext {
            now,
            playing: true,
            tempo: 96,
            bar_index,
        }
    }

    fn two_second_buffer() -> Arc<PcmBuffer> {
        Arc::new(PcmBuffer::from_mono(&[0.0; 200], 100))
    }

    fn starts(actions: &[LoopAction]) -> Vec<&LoopStart> {
        actions
            .iter()
            .filter_map(|a| match a {
                LoopAction::Start { start, .. } => Some(start),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_source_switch_mid_progression_locks_to_bar() {
        let mut sync = LoopSynchronizer::new(0.02);
        sync.load(0, two_second_buffer(), Role::Drums, ctx(0.0, 0))
            .expect("slot 0");
        sync.set_bar_span(0, 2, ctx(0.0, 0)).expect("slot 0");
        sync.set_enabled(0, true, ctx(0.0, 0)).expect("slot 0");

        // Switching drums to loops at bar 7 stops first, restarts later
        let actions = sync.set_source_mode(Role::Drums, SourceMode::Loop, ctx(10.0, 7));
        assert!(matches!(actions.as_slice(), [LoopAction::Stop { slot: 0 }]));
        assert!(sync.suppresses(Role::Drums));
        assert!(!sync.suppresses(Role::Bass));

        assert!(sync.service(ctx(10.01, 7)).is_empty());
        let actions = sync.service(ctx(10.03, 7));
        let started = starts(&actions);
        assert_eq!(started.len(), 1);
        let expected = (7 % 2) as f64 * 4.0 * seconds_per_beat(96);
        assert!((started[0].offset - expected).abs() < 1e-12);
        // 2 s over two bars at 96 BPM (2.5 s per bar)
        assert!((started[0].rate - 0.4).abs() < 1e-12);
        assert_eq!(sync.next_wake(), None);
    }

    #[test]
    fn test_disable_stops_immediately_without_restart() {
        let mut sync = LoopSynchronizer::new(0.02);
        sync.set_source_mode(Role::Bass, SourceMode::Loop, ctx(0.0, 0));
        sync.load(1, two_second_buffer(), Role::Bass, ctx(0.0, 0))
            .expect("slot 1");
        sync.set_enabled(1, true, ctx(1.0, 0)).expect("slot 1");
        let actions = sync.set_enabled(1, false, ctx(1.005, 0)).expect("slot 1");
        assert!(matches!(actions.as_slice(), [LoopAction::Stop { slot: 1 }]));
        assert!(sync.service(ctx(2.0, 0)).is_empty());
    }

    #[test]
    fn test_nothing_restarts_while_stopped() {
        let mut sync = LoopSynchronizer::new(0.02);
        let stopped = LoopContext {
            playing: false,
            ..ctx(0.0, 0)
        };
        let actions = sync
            .load(0, two_second_buffer(), Role::Drums, stopped)
            .expect("slot 0");
        assert!(actions.is_empty());
        assert_eq!(sync.next_wake(), None);
    }

    #[test]
    fn test_transport_start_begins_at_bar_zero() {
        let mut sync = LoopSynchronizer::new(0.02);
        let stopped = LoopContext {
            playing: false,
            ..ctx(0.0, 0)
        };
        sync.set_source_mode(Role::Drums, SourceMode::Loop, stopped);
        sync.load(2, two_second_buffer(), Role::Drums, stopped)
            .expect("slot 2");
        sync.set_enabled(2, true, stopped).expect("slot 2");

        let actions = sync.on_transport_start(0.05, 120);
        let started = starts(&actions);
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].offset, 0.0);
        // 2 s buffer over the default 4 bars at 120 BPM (8 s)
        assert!((started[0].rate - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_loop_role_and_slot_errors() {
        let mut sync = LoopSynchronizer::new(0.02);
        assert!(matches!(
            sync.load(0, two_second_buffer(), Role::Lead, ctx(0.0, 0)),
            Err(EngineError::LoopRole(Role::Lead))
        ));
        assert!(matches!(
            sync.set_enabled(99, true, ctx(0.0, 0)),
            Err(EngineError::UnknownSlot(99))
        ));
    }

    #[test]
    fn test_bar_span_is_clamped() {
        let mut sync = LoopSynchronizer::new(0.02);
        sync.set_bar_span(0, 0, ctx(0.0, 0)).expect("slot 0");
        assert_eq!(sync.slot(0).map(|s| s.bar_span).ok(), Some(1));
        sync.set_bar_span(0, 99, ctx(0.0, 0)).expect("slot 0");
        assert_eq!(sync.slot(0).map(|s| s.bar_span).ok(), Some(16));
    }
}

//! Look-ahead transport scheduler
//!
//! Two states. Stopped: step 0, bar 0, nothing pending. Running: every
//! time the control loop wakes up, `advance` emits the current step at its
//! audio-clock time, moves to the next step and re-arms itself shortly
//! before that step is due. Step times are never earlier than
//! `now + epsilon` and never decrease.

use bluesbox_core::types::transport::{
    BEATS_PER_BAR, STEPS_PER_BAR, STEPS_PER_BEAT, clamp_tempo, seconds_per_beat, step_duration,
};
use bluesbox_core::types::{Bar, DrumSound, Progression, ScheduledAction, TransportState};

/// Bass pattern over the four beats, in semitones above the root
const BASS_WALK: [i32; BEATS_PER_BAR] = [0, 7, 10, 12];
/// MIDI octave of the bass root (C2 = 36)
const BASS_OCTAVE: i32 = 2;
/// MIDI octave of the strummed voicing (C3 = 48)
const GUITAR_OCTAVE: i32 = 3;
/// Hat velocity on the "and" of each beat
const HAT_SOFT: f32 = 0.35;
/// Hat velocity everywhere else
const HAT_HARD: f32 = 0.7;

/// Timing knobs the transport needs from the engine config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportTiming {
    pub start_lookahead: f64,
    pub schedule_epsilon: f64,
    pub reschedule_margin: f64,
}

/// One dispatched step
#[derive(Debug, Clone, PartialEq)]
pub struct StepTick {
    /// Audio-clock time all of this step's sounds share
    pub time: f64,
    pub step: usize,
    pub bar_index: usize,
    pub bar: Bar,
    pub tempo: u32,
}

impl StepTick {
    pub fn beat(&self) -> usize {
        self.step / STEPS_PER_BEAT
    }
}

pub struct Transport {
    state: TransportState,
    swing: f64,
    /// When the next step should be dispatched; `None` while stopped
    wake_at: Option<f64>,
    timing: TransportTiming,
}

impl Transport {
    pub fn new(tempo: u32, swing: f64, timing: TransportTiming) -> Self {
        Self {
            state: TransportState::stopped(tempo),
            swing: swing.clamp(0.0, 1.0),
            wake_at: None,
            timing,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    pub fn tempo(&self) -> u32 {
        self.state.tempo
    }

    /// Takes effect from the next scheduled step
    pub fn set_tempo(&mut self, bpm: i64) -> u32 {
        self.state.tempo = clamp_tempo(bpm);
        self.state.tempo
    }

    pub fn set_swing(&mut self, swing: f64) {
        self.swing = swing.clamp(0.0, 1.0);
    }

    pub fn swing(&self) -> f64 {
        self.swing
    }

    /// Reset to step 0 / bar 0 and place the first step just ahead of `now`
    pub fn start(&mut self, now: f64) {
        self.state.playing = true;
        self.state.step = 0;
        self.state.bar_index = 0;
        self.state.next_event_time = now + self.timing.start_lookahead;
        self.wake_at = Some(now);
    }

    /// Cancel the pending step and return to bar 0; tempo is kept
    pub fn stop(&mut self) {
        self.state = TransportState::stopped(self.state.tempo);
        self.wake_at = None;
    }

    /// When the control loop should next call `advance`
    pub fn next_wake(&self) -> Option<f64> {
        self.wake_at
    }

    /// Wrap the bar index into a progression of `len` bars
    pub fn wrap_bar(&mut self, len: usize) {
        if len > 0 {
            self.state.bar_index %= len;
        }
    }

    /// Dispatch the current step if it is due and re-arm for the next one
    pub fn advance(&mut self, now: f64, progression: &Progression) -> Option<StepTick> {
        let wake = self.wake_at?;
        if !self.state.playing || now < wake {
            return None;
        }

        let time = self
            .state
            .next_event_time
            .max(now + self.timing.schedule_epsilon);
        let len = progression.len().max(1);
        let bar_index = self.state.bar_index % len;
        let tick = StepTick {
            time,
            step: self.state.step,
            bar_index,
            bar: *progression.bar_at(bar_index),
            tempo: self.state.tempo,
        };

        self.state.step = (self.state.step + 1) % STEPS_PER_BAR;
        if self.state.step == 0 {
            self.state.bar_index = (bar_index + 1) % len;
        } else {
            self.state.bar_index = bar_index;
        }

        let duration = step_duration(self.state.step, self.state.tempo, self.swing);
        self.state.next_event_time = time + duration;
        // Wake `margin` before the next step enters the lookahead window
        let lead = self.timing.start_lookahead + self.timing.reschedule_margin;
        self.wake_at = Some((self.state.next_event_time - lead).max(now));

        Some(tick)
    }
}

/// The backing-band sounds of one step, all sharing `tick.time`
pub fn step_actions(tick: &StepTick) -> Vec<ScheduledAction> {
    let mut actions = Vec::with_capacity(4);
    let beat = tick.beat();
    let on_beat = tick.step % STEPS_PER_BEAT == 0;
    let on_and = tick.step % STEPS_PER_BEAT == 2;

    // Hat on every step; the last "and" of the bar opens up
    let hat = if tick.step == STEPS_PER_BAR - 2 {
        DrumSound::OpenHiHat
    } else {
        DrumSound::HiHat
    };
    actions.push(ScheduledAction::Drum {
        sound: hat,
        velocity: if on_and { HAT_SOFT } else { HAT_HARD },
    });

    if on_beat {
        let sound = if beat % 2 == 0 {
            DrumSound::Kick
        } else {
            DrumSound::Snare
        };
        actions.push(ScheduledAction::Drum {
            sound,
            velocity: 1.0,
        });

        let root = tick.bar.chord.root().midi_in_octave(BASS_OCTAVE);
        actions.push(ScheduledAction::Bass {
            pitch: root + BASS_WALK[beat],
            duration: seconds_per_beat(tick.tempo) * 0.9,
        });

        if beat % 2 == 1 {
            actions.push(ScheduledAction::Guitar {
                pitches: tick.bar.chord.voicing(GUITAR_OCTAVE),
            });
        }
    }

    actions
}

//! Control-loop thread
//!
//! The engine lives on one dedicated thread. UI code talks to it through a
//! cloneable `BluesBox` handle that sends `ControlCommand`s; the thread
//! answers fallible requests on a reply channel and otherwise sleeps until
//! the engine's next wake time, when it services the transport and loops.
//!
//! The engine is built on the thread itself because a device stream may
//! not be moved between threads.

use super::audio::AudioBackend;
use super::engine::{Engine, EngineSnapshot};
use super::voice_registry::{InputId, NoteOutcome};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use bluesbox_core::types::{DrumSound, LeadEngine, Role, SourceMode, SynthVoiceConfig};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

type Reply<T> = Sender<Result<T>>;

/// Requests the control thread understands
pub enum ControlCommand {
    SelectSequence(String, Reply<()>),
    SetTempo(i64),
    StartTransport(Reply<()>),
    StopTransport,

    SetBusVolume(Role, f32),
    SetBusMuted(Role, bool),
    SetMasterVolume(f32),
    SetDelayTime(f32),
    SetDelayFeedback(f32),
    SetDelayWet(f32),
    SetReverbWet(f32),
    SetReverbSeconds(f64),

    SetSynthConfig(SynthVoiceConfig),
    SetLeadEngine(LeadEngine),
    SetQuantize(bool),
    SetMaxVoices(usize),
    NoteOn {
        input: InputId,
        pitch: i32,
        reply: Reply<NoteOutcome>,
    },
    NoteOff(InputId),
    Retarget(InputId, i32),
    AllNotesOff,

    LoadSample {
        slot: usize,
        bytes: Vec<u8>,
        root_pitch: i32,
        reply: Reply<()>,
    },
    SetSampleInUse(usize, bool, Reply<()>),
    ClearSample(usize, Reply<()>),
    LoadDrumSample(DrumSound, Vec<u8>, Reply<()>),
    ClearDrumSample(DrumSound),
    LoadBassSample {
        bytes: Vec<u8>,
        root_pitch: i32,
        reply: Reply<()>,
    },
    ClearBassSample,

    LoadLoop {
        slot: usize,
        bytes: Vec<u8>,
        role: Role,
        reply: Reply<()>,
    },
    SetLoopEnabled(usize, bool, Reply<()>),
    SetLoopBars(usize, i64, Reply<()>),
    SetLoopVolume(usize, f32, Reply<()>),
    SetSourceMode(Role, SourceMode),

    Shutdown,
}

/// Handle for driving the engine from UI code
#[derive(Clone)]
pub struct BluesBox {
    command_tx: Sender<ControlCommand>,
    snapshot: Arc<RwLock<EngineSnapshot>>,
    is_running: Arc<AtomicBool>,
}

impl BluesBox {
    /// Start the control thread. Audio is not opened until first needed.
    pub fn spawn(config: EngineConfig, backend: Box<dyn AudioBackend>) -> Result<Self> {
        let (command_tx, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let is_running = Arc::new(AtomicBool::new(true));
        let running = is_running.clone();

        thread::spawn(move || {
            let engine = Engine::new(config, backend);
            let snapshot = Arc::new(RwLock::new(engine.snapshot()));
            if ready_tx.send(snapshot.clone()).is_err() {
                return;
            }
            ControlLoop {
                engine,
                command_rx,
                snapshot,
                is_running: running,
            }
            .run();
        });

        let snapshot = ready_rx.recv().map_err(|_| EngineError::Disconnected)?;
        info!("control thread started");
        Ok(Self {
            command_tx,
            snapshot,
            is_running,
        })
    }

    fn send(&self, command: ControlCommand) {
        if self.command_tx.send(command).is_err() {
            debug!("control thread gone; command dropped");
        }
    }

    fn request<T>(&self, build: impl FnOnce(Reply<T>) -> ControlCommand) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(build(reply_tx))
            .map_err(|_| EngineError::Disconnected)?;
        reply_rx.recv().map_err(|_| EngineError::Disconnected)?
    }

    /// Latest published engine state
    pub fn snapshot(&self) -> EngineSnapshot {
        match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    pub fn select_sequence(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.request(|reply| ControlCommand::SelectSequence(id, reply))
    }

    pub fn set_tempo(&self, bpm: i64) {
        self.send(ControlCommand::SetTempo(bpm));
    }

    pub fn start_transport(&self) -> Result<()> {
        self.request(ControlCommand::StartTransport)
    }

    pub fn stop_transport(&self) {
        self.send(ControlCommand::StopTransport);
    }

    pub fn set_bus_volume(&self, role: Role, volume: f32) {
        self.send(ControlCommand::SetBusVolume(role, volume));
    }

    pub fn set_bus_muted(&self, role: Role, muted: bool) {
        self.send(ControlCommand::SetBusMuted(role, muted));
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.send(ControlCommand::SetMasterVolume(volume));
    }

    pub fn set_delay_time(&self, seconds: f32) {
        self.send(ControlCommand::SetDelayTime(seconds));
    }

    pub fn set_delay_feedback(&self, feedback: f32) {
        self.send(ControlCommand::SetDelayFeedback(feedback));
    }

    pub fn set_delay_wet(&self, wet: f32) {
        self.send(ControlCommand::SetDelayWet(wet));
    }

    pub fn set_reverb_wet(&self, wet: f32) {
        self.send(ControlCommand::SetReverbWet(wet));
    }

    pub fn set_reverb_seconds(&self, seconds: f64) {
        self.send(ControlCommand::SetReverbSeconds(seconds));
    }

    pub fn set_synth_config(&self, config: SynthVoiceConfig) {
        self.send(ControlCommand::SetSynthConfig(config));
    }

    pub fn set_lead_engine(&self, engine: LeadEngine) {
        self.send(ControlCommand::SetLeadEngine(engine));
    }

    pub fn set_quantize(&self, enabled: bool) {
        self.send(ControlCommand::SetQuantize(enabled));
    }

    pub fn set_max_voices(&self, max_voices: usize) {
        self.send(ControlCommand::SetMaxVoices(max_voices));
    }

    pub fn note_on(&self, input: InputId, pitch: i32) -> Result<NoteOutcome> {
        self.request(|reply| ControlCommand::NoteOn {
            input,
            pitch,
            reply,
        })
    }

    pub fn note_off(&self, input: InputId) {
        self.send(ControlCommand::NoteOff(input));
    }

    pub fn retarget(&self, input: InputId, pitch: i32) {
        self.send(ControlCommand::Retarget(input, pitch));
    }

    pub fn all_notes_off(&self) {
        self.send(ControlCommand::AllNotesOff);
    }

    pub fn load_sample(&self, slot: usize, bytes: Vec<u8>, root_pitch: i32) -> Result<()> {
        self.request(|reply| ControlCommand::LoadSample {
            slot,
            bytes,
            root_pitch,
            reply,
        })
    }

    pub fn set_sample_in_use(&self, slot: usize, in_use: bool) -> Result<()> {
        self.request(|reply| ControlCommand::SetSampleInUse(slot, in_use, reply))
    }

    pub fn clear_sample(&self, slot: usize) -> Result<()> {
        self.request(|reply| ControlCommand::ClearSample(slot, reply))
    }

    pub fn load_drum_sample(&self, sound: DrumSound, bytes: Vec<u8>) -> Result<()> {
        self.request(|reply| ControlCommand::LoadDrumSample(sound, bytes, reply))
    }

    pub fn clear_drum_sample(&self, sound: DrumSound) {
        self.send(ControlCommand::ClearDrumSample(sound));
    }

    pub fn load_bass_sample(&self, bytes: Vec<u8>, root_pitch: i32) -> Result<()> {
        self.request(|reply| ControlCommand::LoadBassSample {
            bytes,
            root_pitch,
            reply,
        })
    }

    pub fn clear_bass_sample(&self) {
        self.send(ControlCommand::ClearBassSample);
    }

    pub fn load_loop(&self, slot: usize, bytes: Vec<u8>, role: Role) -> Result<()> {
        self.request(|reply| ControlCommand::LoadLoop {
            slot,
            bytes,
            role,
            reply,
        })
    }

    pub fn set_loop_enabled(&self, slot: usize, enabled: bool) -> Result<()> {
        self.request(|reply| ControlCommand::SetLoopEnabled(slot, enabled, reply))
    }

    pub fn set_loop_bars(&self, slot: usize, bars: i64) -> Result<()> {
        self.request(|reply| ControlCommand::SetLoopBars(slot, bars, reply))
    }

    pub fn set_loop_volume(&self, slot: usize, volume: f32) -> Result<()> {
        self.request(|reply| ControlCommand::SetLoopVolume(slot, volume, reply))
    }

    pub fn set_source_mode(&self, role: Role, mode: SourceMode) {
        self.send(ControlCommand::SetSourceMode(role, mode));
    }

    /// Stop the control thread; the audio stream closes with it
    pub fn shutdown(&self) {
        self.send(ControlCommand::Shutdown);
    }
}

struct ControlLoop {
    engine: Engine,
    command_rx: Receiver<ControlCommand>,
    snapshot: Arc<RwLock<EngineSnapshot>>,
    is_running: Arc<AtomicBool>,
}

impl ControlLoop {
    fn run(mut self) {
        loop {
            let command = match self.engine.next_wake() {
                Some(wake) => {
                    let wait = (wake - self.engine.now()).max(0.0);
                    crossbeam_channel::select! {
                        recv(self.command_rx) -> msg => match msg {
                            Ok(cmd) => Some(cmd),
                            Err(_) => break,
                        },
                        default(Duration::from_secs_f64(wait)) => None,
                    }
                }
                None => match self.command_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            match command {
                Some(cmd) => {
                    if !self.handle_command(cmd) {
                        break;
                    }
                }
                None => {
                    self.engine.service();
                    self.publish();
                }
            }
        }

        self.engine.stop_transport();
        self.engine.all_notes_off();
        self.is_running.store(false, Ordering::Relaxed);
        info!("control thread stopped");
    }

    fn publish(&self) {
        match self.snapshot.write() {
            Ok(mut guard) => *guard = self.engine.snapshot(),
            Err(_) => warn!("snapshot lock poisoned"),
        }
    }

    /// Publish first so a caller that has its answer sees the new state
    fn answer<T>(&self, reply: Reply<T>, result: Result<T>) {
        self.publish();
        let _ = reply.send(result);
    }

    /// Handle a command, returns false if should shutdown
    fn handle_command(&mut self, cmd: ControlCommand) -> bool {
        let engine = &mut self.engine;
        match cmd {
            ControlCommand::SelectSequence(id, reply) => {
                let result = engine.select_sequence(&id);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::SetTempo(bpm) => {
                engine.set_tempo(bpm);
            }
            ControlCommand::StartTransport(reply) => {
                let result = engine.start_transport();
                self.answer(reply, result);
                return true;
            }
            ControlCommand::StopTransport => engine.stop_transport(),

            ControlCommand::SetBusVolume(role, volume) => engine.set_bus_volume(role, volume),
            ControlCommand::SetBusMuted(role, muted) => engine.set_bus_muted(role, muted),
            ControlCommand::SetMasterVolume(volume) => engine.set_master_volume(volume),
            ControlCommand::SetDelayTime(seconds) => engine.set_delay_time(seconds),
            ControlCommand::SetDelayFeedback(feedback) => engine.set_delay_feedback(feedback),
            ControlCommand::SetDelayWet(wet) => engine.set_delay_wet(wet),
            ControlCommand::SetReverbWet(wet) => engine.set_reverb_wet(wet),
            ControlCommand::SetReverbSeconds(seconds) => engine.set_reverb_seconds(seconds),

            ControlCommand::SetSynthConfig(config) => engine.set_synth_config(config),
            ControlCommand::SetLeadEngine(lead) => engine.set_lead_engine(lead),
            ControlCommand::SetQuantize(enabled) => engine.set_quantize(enabled),
            ControlCommand::SetMaxVoices(max_voices) => engine.set_max_voices(max_voices),
            ControlCommand::NoteOn {
                input,
                pitch,
                reply,
            } => {
                let result = engine.note_on(input, pitch);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::NoteOff(input) => engine.note_off(&input),
            ControlCommand::Retarget(input, pitch) => engine.retarget(&input, pitch),
            ControlCommand::AllNotesOff => engine.all_notes_off(),

            ControlCommand::LoadSample {
                slot,
                bytes,
                root_pitch,
                reply,
            } => {
                let result = engine.load_sample(slot, &bytes, root_pitch);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::SetSampleInUse(slot, in_use, reply) => {
                let result = engine.set_sample_in_use(slot, in_use);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::ClearSample(slot, reply) => {
                let result = engine.clear_sample(slot);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::LoadDrumSample(sound, bytes, reply) => {
                let result = engine.load_drum_sample(sound, &bytes);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::ClearDrumSample(sound) => engine.clear_drum_sample(sound),
            ControlCommand::LoadBassSample {
                bytes,
                root_pitch,
                reply,
            } => {
                let result = engine.load_bass_sample(&bytes, root_pitch);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::ClearBassSample => engine.clear_bass_sample(),

            ControlCommand::LoadLoop {
                slot,
                bytes,
                role,
                reply,
            } => {
                let result = engine.load_loop(slot, &bytes, role);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::SetLoopEnabled(slot, enabled, reply) => {
                let result = engine.set_loop_enabled(slot, enabled);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::SetLoopBars(slot, bars, reply) => {
                let result = engine.set_loop_bars(slot, bars);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::SetLoopVolume(slot, volume, reply) => {
                let result = engine.set_loop_volume(slot, volume);
                self.answer(reply, result);
                return true;
            }
            ControlCommand::SetSourceMode(role, mode) => engine.set_source_mode(role, mode),

            ControlCommand::Shutdown => return false,
        }
        self.publish();
        true
    }
}

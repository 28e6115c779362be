//! The engine facade
//!
//! `Engine` owns every piece of control-side state: the selected sequence,
//! the transport, the loop synchronizer, the voice registry and the sample
//! assignments. It is single-threaded; the control loop in `scheduler`
//! calls `service` whenever `next_wake` comes due and forwards UI input to
//! the other methods.
//!
//! Audio is opened lazily, on the first transport start or note-on. Every
//! setting made before then is kept and applies once audio exists.

use super::audio::{AudioBackend, AudioLink};
use super::loop_sync::{LoopAction, LoopContext, LoopSynchronizer};
use super::mixer::MixerControls;
use super::render::RenderCommand;
use super::reverb::{ConvolutionReverb, REVERB_BLOCK, generate_impulse_response};
use super::sample_bank::SampleBank;
use super::sample_buffer::{Decoder, PcmBuffer, WavDecoder};
use super::transport::{StepTick, Transport, TransportTiming, step_actions};
use super::voice::VoiceSpec;
use super::voice_registry::{HeldVoice, InputId, NoteOutcome, VoiceKind, VoiceRegistry};
use crate::config::{EngineConfig, SAMPLE_SLOTS, clamp_max_voices, clamp_reverb_seconds};
use crate::error::{EngineError, Result};
use bluesbox_core::types::{
    Chord, Degree, DrumSound, LeadEngine, PitchClassSet, Progression, Role, ScheduledAction,
    ScheduledEvent, SequenceDescriptor, SourceMode, SynthVoiceConfig, TransportState,
    default_sequence, find_sequence, quantize, scale_for,
};
use colored::Colorize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Published view of the engine for display
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub transport: TransportState,
    pub sequence_id: &'static str,
    pub progression_len: usize,
    pub chord: Chord,
    pub degree: Degree,
    /// Pitch classes of the scale for the current chord
    pub highlighted: PitchClassSet,
    pub held_voices: usize,
}

impl fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.transport.playing {
            "▶".green().bold()
        } else {
            "■".red().bold()
        };
        write!(
            f,
            "{} {} bar {}/{} {} ({}) {} bpm",
            status,
            self.sequence_id.cyan(),
            self.transport.bar_index + 1,
            self.progression_len,
            self.chord,
            self.degree.numeral(),
            self.transport.tempo
        )
    }
}

pub struct Engine {
    config: EngineConfig,
    backend: Box<dyn AudioBackend>,
    link: Option<AudioLink>,
    /// Set once opening audio has failed; never retried
    unavailable: Option<String>,
    controls: Arc<MixerControls>,
    decoder: Box<dyn Decoder>,
    sequence: &'static SequenceDescriptor,
    progression: Progression,
    tempo_overridden: bool,
    transport: Transport,
    loops: LoopSynchronizer,
    voices: VoiceRegistry,
    bank: SampleBank,
    drum_samples: Vec<(DrumSound, Arc<PcmBuffer>)>,
    bass_sample: Option<(Arc<PcmBuffer>, i32)>,
    synth: SynthVoiceConfig,
    lead_engine: LeadEngine,
    quantize: bool,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Box<dyn AudioBackend>) -> Self {
        let sequence = default_sequence();
        let timing = TransportTiming {
            start_lookahead: config.start_lookahead,
            schedule_epsilon: config.schedule_epsilon,
            reschedule_margin: config.reschedule_margin,
        };
        let transport = Transport::new(
            sequence.groove.default_tempo(),
            sequence.groove.swing_amount(),
            timing,
        );

        Self {
            backend,
            link: None,
            unavailable: None,
            controls: Arc::new(MixerControls::new()),
            decoder: Box::new(WavDecoder),
            progression: sequence.progression(),
            sequence,
            tempo_overridden: false,
            transport,
            loops: LoopSynchronizer::new(config.rearm_delay),
            voices: VoiceRegistry::new(clamp_max_voices(config.max_voices)),
            bank: SampleBank::new(),
            drum_samples: Vec::new(),
            bass_sample: None,
            synth: SynthVoiceConfig::default(),
            lead_engine: LeadEngine::Synth,
            quantize: true,
            config,
        }
    }

    /// Replace the file decoder
    pub fn with_decoder(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn controls(&self) -> &Arc<MixerControls> {
        &self.controls
    }

    pub fn is_audio_open(&self) -> bool {
        self.link.is_some()
    }

    /// Current audio-clock time; zero before audio exists
    pub fn now(&self) -> f64 {
        self.link.as_ref().map_or(0.0, |link| link.clock.now())
    }

    /// Open audio if it is not open yet
    pub fn ensure_audio(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        if let Some(reason) = &self.unavailable {
            return Err(EngineError::EnvironmentUnavailable(reason.clone()));
        }

        match self.backend.open(self.controls.clone(), &self.config) {
            Ok(link) => {
                info!(sample_rate = link.clock.sample_rate(), "audio engine constructed");
                self.link = Some(link);
                for (sound, buffer) in self.drum_samples.clone() {
                    self.send(RenderCommand::AssignDrumSample {
                        sound,
                        buffer: Some(buffer),
                    });
                }
                if let Some(sample) = self.bass_sample.clone() {
                    self.send(RenderCommand::AssignBassSample(Some(sample)));
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "audio engine unavailable");
                self.unavailable = Some(match &e {
                    EngineError::EnvironmentUnavailable(reason) => reason.clone(),
                    other => other.to_string(),
                });
                Err(e)
            }
        }
    }

    fn send(&self, command: RenderCommand) {
        if let Some(link) = &self.link {
            if link.commands.send(command).is_err() {
                warn!("render side has gone away; command dropped");
            }
        }
    }

    // ---------------------------------------------------------------
    // Sequence and transport
    // ---------------------------------------------------------------

    pub fn sequence(&self) -> &'static SequenceDescriptor {
        self.sequence
    }

    pub fn progression(&self) -> &Progression {
        &self.progression
    }

    /// Switch to a catalog sequence. The tempo follows the groove unless
    /// the performer has set one.
    pub fn select_sequence(&mut self, id: &str) -> Result<()> {
        let sequence =
            find_sequence(id).ok_or_else(|| EngineError::UnknownSequence(id.to_string()))?;
        self.sequence = sequence;
        self.progression = sequence.progression();
        self.transport.wrap_bar(self.progression.len());
        self.transport.set_swing(sequence.groove.swing_amount());
        if !self.tempo_overridden {
            self.apply_tempo(sequence.groove.default_tempo() as i64);
        }
        info!(id = sequence.id, title = sequence.title, "sequence selected");
        Ok(())
    }

    /// Set the tempo from the UI; clamped to the supported range
    pub fn set_tempo(&mut self, bpm: i64) -> u32 {
        self.tempo_overridden = true;
        self.apply_tempo(bpm)
    }

    fn apply_tempo(&mut self, bpm: i64) -> u32 {
        let before = self.transport.tempo();
        let tempo = self.transport.set_tempo(bpm);
        if tempo != before {
            info!(tempo, "tempo changed");
            let actions = self.loops.on_tempo_change(self.loop_context());
            self.apply_loop_actions(actions);
        }
        tempo
    }

    pub fn tempo(&self) -> u32 {
        self.transport.tempo()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    /// Start from bar 1, opening audio if needed
    pub fn start_transport(&mut self) -> Result<()> {
        self.ensure_audio()?;
        if let Some(stream) = self.link.as_ref().and_then(|l| l.stream.as_ref()) {
            if let Err(e) = stream.resume() {
                warn!(error = %e, "could not resume output stream");
            }
        }

        let now = self.now();
        self.transport.start(now);
        let state = self.transport.state();
        let actions = self
            .loops
            .on_transport_start(state.next_event_time, state.tempo);
        self.apply_loop_actions(actions);
        info!(tempo = state.tempo, sequence = self.sequence.id, "transport started");
        self.service();
        Ok(())
    }

    /// Stop and return to bar 1. Backing notes release, loops stop at once.
    pub fn stop_transport(&mut self) {
        if !self.transport.is_playing() {
            return;
        }
        self.transport.stop();
        let actions = self.loops.on_transport_stop();
        self.apply_loop_actions(actions);
        self.send(RenderCommand::ReleaseBacking);
        info!("transport stopped");
    }

    /// Earliest audio-clock time at which `service` has work to do
    pub fn next_wake(&self) -> Option<f64> {
        match (self.transport.next_wake(), self.loops.next_wake()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run everything that is due: transport steps and loop re-arms
    pub fn service(&mut self) {
        let now = self.now();
        while let Some(tick) = self.transport.advance(now, &self.progression) {
            self.dispatch_step(&tick);
        }
        let actions = self.loops.service(self.loop_context());
        self.apply_loop_actions(actions);
    }

    fn dispatch_step(&mut self, tick: &StepTick) {
        for action in step_actions(tick) {
            let role = match &action {
                ScheduledAction::Drum { .. } => Role::Drums,
                ScheduledAction::Bass { .. } => Role::Bass,
                ScheduledAction::Guitar { .. } => Role::Guitar,
            };
            if self.loops.suppresses(role) {
                continue;
            }
            self.send(RenderCommand::Backing(ScheduledEvent::new(tick.time, action)));
        }
        if tick.step == 0 {
            debug!(bar = tick.bar_index, chord = %tick.bar.chord.symbol(), "bar");
        }
    }

    // ---------------------------------------------------------------
    // Harmony display
    // ---------------------------------------------------------------

    pub fn current_chord(&self) -> Chord {
        self.progression
            .bar_at(self.transport.state().bar_index)
            .chord
    }

    /// Pitch classes to highlight on the keyboard
    pub fn highlighted_pitch_classes(&self) -> PitchClassSet {
        scale_for(&self.current_chord())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let transport = self.transport.state();
        let bar = self.progression.bar_at(transport.bar_index);
        EngineSnapshot {
            transport,
            sequence_id: self.sequence.id,
            progression_len: self.progression.len(),
            chord: bar.chord,
            degree: bar.degree,
            highlighted: scale_for(&bar.chord),
            held_voices: self.voices.active_count(),
        }
    }

    // ---------------------------------------------------------------
    // Mixer
    // ---------------------------------------------------------------

    pub fn set_bus_volume(&mut self, role: Role, volume: f32) {
        self.controls.set_bus_gain(role, volume);
    }

    pub fn set_bus_muted(&mut self, role: Role, muted: bool) {
        self.controls.set_bus_muted(role, muted);
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.controls.set_master(volume);
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        self.controls.set_delay_time(seconds);
    }

    pub fn set_delay_feedback(&mut self, feedback: f32) {
        self.controls.set_delay_feedback(feedback);
    }

    pub fn set_delay_wet(&mut self, wet: f32) {
        self.controls.set_delay_wet(wet);
    }

    pub fn set_reverb_wet(&mut self, wet: f32) {
        self.controls.set_reverb_wet(wet);
    }

    /// Regenerate the impulse response at a new length
    pub fn set_reverb_seconds(&mut self, seconds: f64) {
        self.config.reverb_seconds = clamp_reverb_seconds(seconds);
        if let Some(link) = &self.link {
            let impulse = generate_impulse_response(
                self.config.reverb_seconds,
                link.clock.sample_rate(),
                self.config.reverb_seed,
            );
            let reverb = ConvolutionReverb::new(&impulse, REVERB_BLOCK);
            self.send(RenderCommand::SetReverb(Box::new(reverb)));
        }
        info!(seconds = self.config.reverb_seconds, "reverb length changed");
    }

    pub fn reverb_seconds(&self) -> f64 {
        self.config.reverb_seconds
    }

    // ---------------------------------------------------------------
    // Lead voices
    // ---------------------------------------------------------------

    /// Edits apply to voices started afterwards
    pub fn set_synth_config(&mut self, config: SynthVoiceConfig) {
        self.synth = config.clamped();
    }

    pub fn synth_config(&self) -> SynthVoiceConfig {
        self.synth
    }

    pub fn set_lead_engine(&mut self, engine: LeadEngine) {
        self.lead_engine = engine;
    }

    pub fn lead_engine(&self) -> LeadEngine {
        self.lead_engine
    }

    pub fn set_quantize(&mut self, enabled: bool) {
        self.quantize = enabled;
    }

    pub fn quantize_enabled(&self) -> bool {
        self.quantize
    }

    pub fn set_max_voices(&mut self, max_voices: usize) {
        self.voices.set_max_voices(clamp_max_voices(max_voices));
    }

    pub fn max_voices(&self) -> usize {
        self.voices.max_voices()
    }

    pub fn held_voices(&self) -> usize {
        self.voices.active_count()
    }

    /// Pitch a lead note will actually sound at
    pub fn lead_pitch(&self, pitch: i32) -> i32 {
        let pitch = pitch.clamp(0, 127);
        if self.quantize {
            quantize(pitch, &self.highlighted_pitch_classes())
        } else {
            pitch
        }
    }

    fn voice_spec(&self, pitch: i32) -> (VoiceSpec, VoiceKind) {
        if self.lead_engine == LeadEngine::Sampler {
            if let Some((slot, entry)) = self.bank.closest(pitch) {
                return (
                    VoiceSpec::Sampler {
                        buffer: entry.buffer.clone(),
                        root_pitch: entry.root_pitch,
                        pitch,
                        envelope: self.synth.envelope,
                    },
                    VoiceKind::Sampler { slot },
                );
            }
        }
        (
            VoiceSpec::Synth {
                pitch,
                config: self.synth,
            },
            VoiceKind::Synth,
        )
    }

    /// Start a lead note for `input`
    pub fn note_on(&mut self, input: InputId, pitch: i32) -> Result<NoteOutcome> {
        self.ensure_audio()?;
        if let Some(outcome) = self.voices.admit(&input) {
            if outcome == NoteOutcome::Dropped {
                debug!(%input, pitch, max = self.voices.max_voices(), "note dropped at voice cap");
            }
            return Ok(outcome);
        }

        let pitch = self.lead_pitch(pitch);
        let voice = self.start_voice(pitch);
        self.voices.insert(input, voice);
        Ok(NoteOutcome::Started {
            id: voice.id,
            pitch,
        })
    }

    fn start_voice(&mut self, pitch: i32) -> HeldVoice {
        let id = self.voices.allocate_id();
        let (spec, kind) = self.voice_spec(pitch);
        let at = self.now();
        self.send(RenderCommand::StartVoice { id, spec, at });
        HeldVoice { id, pitch, kind }
    }

    /// Release the note held by `input`, if any
    pub fn note_off(&mut self, input: &InputId) {
        if let Some(voice) = self.voices.release(input) {
            let at = self.now();
            self.send(RenderCommand::ReleaseVoice { id: voice.id, at });
        }
    }

    /// Move a held note to a new pitch. Synth voices glide; sampler voices
    /// are replaced by a new voice at the new pitch.
    pub fn retarget(&mut self, input: &InputId, pitch: i32) {
        let Some(held) = self.voices.get(input).copied() else {
            return;
        };
        let pitch = self.lead_pitch(pitch);
        if pitch == held.pitch {
            return;
        }
        let at = self.now();
        match held.kind {
            VoiceKind::Synth => {
                self.send(RenderCommand::RetargetVoice {
                    id: held.id,
                    pitch,
                    at,
                });
                self.voices.set_pitch(input, pitch);
            }
            VoiceKind::Sampler { .. } => {
                self.send(RenderCommand::ReleaseVoice { id: held.id, at });
                let voice = self.start_voice(pitch);
                self.voices.replace(input, voice);
            }
        }
    }

    /// Release every held lead note. Starts still queued on the render side
    /// get a timed release behind them.
    pub fn all_notes_off(&mut self) {
        let released = self.voices.drain();
        if !released.is_empty() {
            info!(count = released.len(), "all notes off");
        }
        let at = self.now();
        for voice in released {
            self.send(RenderCommand::ReleaseVoice { id: voice.id, at });
        }
        self.send(RenderCommand::ReleaseAllVoices);
    }

    // ---------------------------------------------------------------
    // Samples
    // ---------------------------------------------------------------

    fn decode(&self, slot: String, bytes: &[u8]) -> Result<Arc<PcmBuffer>> {
        match self.decoder.decode(bytes) {
            Ok(buffer) => Ok(Arc::new(buffer)),
            Err(e) => {
                warn!(%slot, error = %e, "decode failed");
                Err(EngineError::Decode {
                    slot,
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    /// Load a lead sample recorded at `root_pitch`
    pub fn load_sample(&mut self, slot: usize, bytes: &[u8], root_pitch: i32) -> Result<()> {
        if slot >= SAMPLE_SLOTS {
            return Err(EngineError::UnknownSlot(slot));
        }
        let buffer = self.decode(format!("sample {}", slot + 1), bytes)?;
        self.bank.load(slot, buffer, root_pitch)?;
        info!(slot, root_pitch, "sample loaded");
        Ok(())
    }

    /// Empty a sample slot, releasing any notes still playing from it
    pub fn clear_sample(&mut self, slot: usize) -> Result<()> {
        self.bank.clear(slot)?;
        self.release_slot(slot);
        Ok(())
    }

    pub fn set_sample_in_use(&mut self, slot: usize, in_use: bool) -> Result<()> {
        self.bank.set_in_use(slot, in_use)?;
        if !in_use {
            self.release_slot(slot);
        }
        Ok(())
    }

    fn release_slot(&mut self, slot: usize) {
        let released = self.voices.drain_slot(slot);
        if released.is_empty() {
            return;
        }
        debug!(slot, count = released.len(), "releasing notes from sample slot");
        let at = self.now();
        for voice in released {
            self.send(RenderCommand::ReleaseVoice { id: voice.id, at });
        }
    }

    pub fn sample_bank(&self) -> &SampleBank {
        &self.bank
    }

    /// Use a recorded hit for a drum sound; both hats share one sample
    pub fn load_drum_sample(&mut self, sound: DrumSound, bytes: &[u8]) -> Result<()> {
        let buffer = self.decode(format!("{} sample", sound), bytes)?;
        self.drum_samples
            .retain(|(s, _)| !(*s == sound || (s.is_hat() && sound.is_hat())));
        self.drum_samples.push((sound, buffer.clone()));
        self.send(RenderCommand::AssignDrumSample {
            sound,
            buffer: Some(buffer),
        });
        Ok(())
    }

    /// Go back to the synthesized sound
    pub fn clear_drum_sample(&mut self, sound: DrumSound) {
        self.drum_samples
            .retain(|(s, _)| !(*s == sound || (s.is_hat() && sound.is_hat())));
        self.send(RenderCommand::AssignDrumSample {
            sound,
            buffer: None,
        });
    }

    pub fn load_bass_sample(&mut self, bytes: &[u8], root_pitch: i32) -> Result<()> {
        let buffer = self.decode("bass sample".to_string(), bytes)?;
        let sample = (buffer, root_pitch.clamp(0, 127));
        self.bass_sample = Some(sample.clone());
        self.send(RenderCommand::AssignBassSample(Some(sample)));
        Ok(())
    }

    pub fn clear_bass_sample(&mut self) {
        self.bass_sample = None;
        self.send(RenderCommand::AssignBassSample(None));
    }

    // ---------------------------------------------------------------
    // Loops
    // ---------------------------------------------------------------

    fn loop_context(&self) -> LoopContext {
        let state = self.transport.state();
        LoopContext {
            now: self.now(),
            playing: state.playing,
            tempo: state.tempo,
            bar_index: state.bar_index,
        }
    }

    fn apply_loop_actions(&mut self, actions: Vec<LoopAction>) {
        for action in actions {
            let command = match action {
                LoopAction::Stop { slot } => RenderCommand::StopLoop { slot },
                LoopAction::Start { start, at } => RenderCommand::StartLoop { start, at },
                LoopAction::SetVolume { slot, volume } => {
                    RenderCommand::SetLoopVolume { slot, volume }
                }
            };
            self.send(command);
        }
    }

    pub fn loops(&self) -> &LoopSynchronizer {
        &self.loops
    }

    /// Decode a loop into a slot for the drum or bass role
    pub fn load_loop(&mut self, slot: usize, bytes: &[u8], role: Role) -> Result<()> {
        self.loops.slot(slot)?;
        let buffer = self.decode(format!("loop {}", slot + 1), bytes)?;
        let actions = self.loops.load(slot, buffer, role, self.loop_context())?;
        self.apply_loop_actions(actions);
        Ok(())
    }

    pub fn set_loop_enabled(&mut self, slot: usize, enabled: bool) -> Result<()> {
        let actions = self
            .loops
            .set_enabled(slot, enabled, self.loop_context())?;
        self.apply_loop_actions(actions);
        Ok(())
    }

    pub fn set_loop_bars(&mut self, slot: usize, bars: i64) -> Result<()> {
        let actions = self.loops.set_bar_span(slot, bars, self.loop_context())?;
        self.apply_loop_actions(actions);
        Ok(())
    }

    pub fn set_loop_volume(&mut self, slot: usize, volume: f32) -> Result<()> {
        let actions = self.loops.set_volume(slot, volume)?;
        self.apply_loop_actions(actions);
        Ok(())
    }

    /// Switch a backing role between sequenced triggers and loops
    pub fn set_source_mode(&mut self, role: Role, mode: SourceMode) {
        let actions = self.loops.set_source_mode(role, mode, self.loop_context());
        info!(%role, ?mode, "source mode changed");
        self.apply_loop_actions(actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::audio::OfflineBackend;
    use crate::audio::sample_buffer::wav_bytes;
    use bluesbox_core::types::PitchClass;

    fn engine() -> (Engine, OfflineBackend) {
        let backend = OfflineBackend::new(8000);
        let config = EngineConfig::new().with_reverb_seconds(0.1).with_reverb_seed(3);
        (Engine::new(config, Box::new(backend.clone())), backend)
    }

    #[test]
    fn test_audio_opens_lazily() {
        let (mut engine, backend) = engine();
        engine.set_tempo(100);
        engine.select_sequence("g-quick-swing").expect("catalog id");
        assert!(!engine.is_audio_open());
        assert!(backend.take().is_none());

        engine.start_transport().expect("offline audio");
        assert!(engine.is_audio_open());
        assert!(backend.take().is_some());
    }

    #[test]
    fn test_sequence_selection_resets_tempo_unless_overridden() {
        let (mut engine, _) = engine();
        engine.select_sequence("a-minor-slow").expect("catalog id");
        assert_eq!(engine.tempo(), 66);
        engine.set_tempo(140);
        engine.select_sequence("c-shuffle").expect("catalog id");
        assert_eq!(engine.tempo(), 140);
    }

    #[test]
    fn test_unknown_sequence() {
        let (mut engine, _) = engine();
        assert!(matches!(
            engine.select_sequence("polka"),
            Err(EngineError::UnknownSequence(_))
        ));
        assert_eq!(engine.sequence().id, "c-shuffle");
    }

    #[test]
    fn test_highlight_follows_current_chord() {
        let (engine, _) = engine();
        let highlighted = engine.highlighted_pitch_classes();
        let expected: PitchClassSet = [0u8, 3, 5, 6, 7, 10]
            .iter()
            .map(|&v| PitchClass::wrapping(v))
            .collect();
        assert_eq!(highlighted, expected);
    }

    #[test]
    fn test_quantize_toggle() {
        let (mut engine, _) = engine();
        // E (64) is not in the C blues scale; the tie between D# and F goes up
        assert_eq!(engine.lead_pitch(64), 65);
        engine.set_quantize(false);
        assert_eq!(engine.lead_pitch(64), 64);
    }

    #[test]
    fn test_sampler_falls_back_to_synth_when_bank_empty() {
        let (mut engine, _) = engine();
        engine.set_lead_engine(LeadEngine::Sampler);
        let (_, kind) = engine.voice_spec(60);
        assert_eq!(kind, VoiceKind::Synth);

        let bytes = wav_bytes(&[0.1; 64], 8000);
        engine.load_sample(4, &bytes, 57).expect("decodes");
        let (_, kind) = engine.voice_spec(60);
        assert_eq!(kind, VoiceKind::Sampler { slot: 4 });
    }

    #[test]
    fn test_clearing_a_slot_releases_its_notes() {
        let (mut engine, _) = engine();
        engine.set_lead_engine(LeadEngine::Sampler);
        let bytes = wav_bytes(&[0.1; 64], 8000);
        engine.load_sample(2, &bytes, 60).expect("decodes");
        engine.load_sample(5, &bytes, 72).expect("decodes");

        engine.note_on(InputId::Pointer(1), 60).expect("audio");
        engine.note_on(InputId::Pointer(2), 72).expect("audio");
        assert_eq!(engine.held_voices(), 2);

        engine.set_sample_in_use(5, false).expect("slot 5");
        assert_eq!(engine.held_voices(), 1);
        engine.clear_sample(2).expect("slot 2");
        assert_eq!(engine.held_voices(), 0);
        assert!(engine.sample_bank().get(2).is_none());
    }

    #[test]
    fn test_decode_failure_leaves_slot_empty() {
        let (mut engine, _) = engine();
        let err = engine.load_sample(0, b"garbage", 60).unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
        assert!(engine.sample_bank().get(0).is_none());
        let err = engine.load_loop(1, b"garbage", Role::Drums).unwrap_err();
        assert!(matches!(err, EngineError::Decode { .. }));
        assert!(engine.loops().slot(1).map(|s| s.buffer.is_none()).unwrap_or(false));
    }

    #[test]
    fn test_note_cap_and_release() {
        let (mut engine, _) = engine();
        engine.set_max_voices(2);
        let a = engine.note_on(InputId::Key("a".into()), 60).expect("audio");
        let b = engine.note_on(InputId::Key("s".into()), 63).expect("audio");
        let c = engine.note_on(InputId::Key("d".into()), 65).expect("audio");
        assert!(matches!(a, NoteOutcome::Started { .. }));
        assert!(matches!(b, NoteOutcome::Started { .. }));
        assert_eq!(c, NoteOutcome::Dropped);
        assert_eq!(engine.held_voices(), 2);

        engine.note_off(&InputId::Key("a".into()));
        assert_eq!(engine.held_voices(), 1);
        let d = engine.note_on(InputId::Key("d".into()), 65).expect("audio");
        assert!(matches!(d, NoteOutcome::Started { .. }));

        engine.all_notes_off();
        assert_eq!(engine.held_voices(), 0);
    }

    #[test]
    fn test_extreme_pitches_are_clamped_to_midi_range() {
        let (mut engine, _) = engine();
        let low = engine.note_on(InputId::Pointer(1), i32::MIN).expect("audio");
        let high = engine.note_on(InputId::Pointer(2), i32::MAX).expect("audio");
        assert!(matches!(low, NoteOutcome::Started { pitch: 0, .. }));
        assert!(matches!(high, NoteOutcome::Started { pitch: 127, .. }));

        engine.set_quantize(false);
        engine.retarget(&InputId::Pointer(1), -500);
        assert_eq!(engine.lead_pitch(-500), 0);
        assert_eq!(engine.held_voices(), 2);
    }

    #[test]
    fn test_snapshot_display_mentions_chord() {
        let (engine, _) = engine();
        let text = engine.snapshot().to_string();
        assert!(text.contains("C7"));
        assert!(text.contains("bar 1/12"));
    }
}

//! The render graph: everything that runs inside the output callback
//!
//! Commands arrive over a channel from the control side. Time-stamped ones
//! wait in a min-heap and are applied at their exact frame while the block
//! is rendered sample by sample; the rest apply at the start of the block.
//! After each block the shared `AudioClock` is advanced, which is how the
//! control side learns what "now" is.

use super::clock::AudioClock;
use super::drum_synth::DrumOscillator;
use super::mixer::{MixerControls, StereoDelay};
use super::reverb::{ConvolutionReverb, REVERB_BLOCK, generate_impulse_response};
use super::sample_buffer::{PcmBuffer, StereoFrame};
use super::voice::{
    SamplerVoice, SynthVoice, Voice, VoiceId, VoiceSpec, bass_patch, guitar_patch, one_shot_envelope,
};
use crate::config::{EngineConfig, LOOP_SLOTS};
use bluesbox_core::types::{DrumSound, Role, ScheduledAction, ScheduledEvent};
use crossbeam_channel::Receiver;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Gap between successive strings of a strum (s)
const STRUM_SPACING: f64 = 0.012;
/// How long a strummed string rings before its release (s)
const STRING_HOLD: f64 = 0.25;

/// A loop start, fully resolved on the control side
#[derive(Debug, Clone)]
pub struct LoopStart {
    pub slot: usize,
    pub role: Role,
    pub buffer: Arc<PcmBuffer>,
    /// Tempo-fit playback rate (1.0 = the buffer's natural speed)
    pub rate: f64,
    /// Start offset in transport seconds
    pub offset: f64,
    pub volume: f32,
}

/// Messages from the control side
pub enum RenderCommand {
    /// A backing-band sound at an audio-clock time
    Backing(ScheduledEvent),
    StartVoice { id: VoiceId, spec: VoiceSpec, at: f64 },
    RetargetVoice { id: VoiceId, pitch: i32, at: f64 },
    ReleaseVoice { id: VoiceId, at: f64 },
    /// Release every lead voice now
    ReleaseAllVoices,
    /// Release sounding bass and guitar notes now
    ReleaseBacking,
    StartLoop { start: LoopStart, at: f64 },
    /// Stop a loop immediately, including a start still pending
    StopLoop { slot: usize },
    SetLoopVolume { slot: usize, volume: f32 },
    AssignDrumSample { sound: DrumSound, buffer: Option<Arc<PcmBuffer>> },
    AssignBassSample(Option<(Arc<PcmBuffer>, i32)>),
    SetReverb(Box<ConvolutionReverb>),
}

enum TimedAction {
    Backing(ScheduledAction),
    StartVoice { id: VoiceId, spec: VoiceSpec },
    Retarget { id: VoiceId, pitch: i32 },
    Release { id: VoiceId },
    StartLoop { start: LoopStart, epoch: u64 },
}

struct Timed {
    frame: u64,
    seq: u64,
    action: TimedAction,
}

impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame && self.seq == other.seq
    }
}

impl Eq for Timed {}

impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timed {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap behavior; FIFO within a frame
        other
            .frame
            .cmp(&self.frame)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

enum BackingSource {
    Drum(DrumOscillator),
    Voice(Voice),
}

/// A sequenced sound: drums, bass or one guitar string
struct BackingVoice {
    role: Role,
    source: BackingSource,
    gain: f32,
    /// Frames of silence before the sound begins
    delay: usize,
    /// Frames until release; `None` for one-shots that end by themselves
    hold: Option<usize>,
}

impl BackingVoice {
    fn next_frame(&mut self) -> StereoFrame {
        if self.delay > 0 {
            self.delay -= 1;
            return StereoFrame::default();
        }
        if let Some(hold) = self.hold.as_mut() {
            if *hold == 0 {
                self.release();
            } else {
                *hold -= 1;
            }
        }
        let frame = match &mut self.source {
            BackingSource::Drum(osc) => StereoFrame::mono(osc.next_sample()),
            BackingSource::Voice(voice) => voice.next_frame(),
        };
        frame.scaled(self.gain)
    }

    fn release(&mut self) {
        self.hold = None;
        if let BackingSource::Voice(voice) = &mut self.source {
            voice.release();
        }
    }

    fn is_finished(&self) -> bool {
        self.delay == 0
            && match &self.source {
                BackingSource::Drum(osc) => osc.is_finished(),
                BackingSource::Voice(voice) => voice.is_finished(),
            }
    }
}

/// A held or releasing lead voice
struct LeadVoice {
    id: VoiceId,
    voice: Voice,
    /// Frames left after the release tail before teardown
    teardown: Option<usize>,
}

struct LoopPlayer {
    role: Role,
    buffer: Arc<PcmBuffer>,
    /// Buffer frames advanced per output frame
    step: f64,
    position: f64,
    volume: f32,
}

impl LoopPlayer {
    fn next_frame(&mut self) -> StereoFrame {
        let frame = self.buffer.frame_looped(self.position);
        self.position = (self.position + self.step) % self.buffer.len().max(1) as f64;
        frame.scaled(self.volume)
    }
}

pub struct RenderGraph {
    clock: AudioClock,
    commands: Receiver<RenderCommand>,
    controls: Arc<MixerControls>,
    sample_rate: f32,
    pending: BinaryHeap<Timed>,
    seq: u64,
    lead: Vec<LeadVoice>,
    backing: Vec<BackingVoice>,
    loops: Vec<Option<LoopPlayer>>,
    loop_epochs: Vec<u64>,
    drum_samples: [Option<Arc<PcmBuffer>>; 3],
    bass_sample: Option<(Arc<PcmBuffer>, i32)>,
    delay: StereoDelay,
    reverb: ConvolutionReverb,
    teardown_frames: usize,
    noise_seed: u64,
    scratch: Vec<StereoFrame>,
}

impl RenderGraph {
    pub fn new(
        clock: AudioClock,
        commands: Receiver<RenderCommand>,
        controls: Arc<MixerControls>,
        config: &EngineConfig,
    ) -> Self {
        let sample_rate = clock.sample_rate() as f32;
        let impulse =
            generate_impulse_response(config.reverb_seconds, clock.sample_rate(), config.reverb_seed);

        Self {
            sample_rate,
            pending: BinaryHeap::with_capacity(256),
            seq: 0,
            lead: Vec::with_capacity(crate::config::MAX_VOICES_LIMIT * 2),
            backing: Vec::with_capacity(64),
            loops: (0..LOOP_SLOTS).map(|_| None).collect(),
            loop_epochs: vec![0; LOOP_SLOTS],
            drum_samples: [None, None, None],
            bass_sample: None,
            delay: StereoDelay::new(sample_rate),
            reverb: ConvolutionReverb::new(&impulse, REVERB_BLOCK),
            teardown_frames: (config.teardown_pad * sample_rate as f64) as usize,
            noise_seed: 1,
            scratch: Vec::with_capacity(4096),
            clock,
            commands,
            controls,
        }
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    /// Lead voices still allocated, including releasing ones
    pub fn lead_voice_count(&self) -> usize {
        self.lead.len()
    }

    /// Sounds currently running on a backing bus
    pub fn backing_voice_count(&self, role: Role) -> usize {
        self.backing.iter().filter(|v| v.role == role).count()
    }

    pub fn is_loop_playing(&self, slot: usize) -> bool {
        matches!(self.loops.get(slot), Some(Some(_)))
    }

    /// Render into an interleaved buffer with `channels` channels.
    /// Mono devices get the average of both sides; extra channels are silent.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(frames, StereoFrame::default());
        self.render_block(&mut scratch);

        for (frame, chunk) in scratch.iter().zip(out.chunks_mut(channels)) {
            match chunk {
                [mono] => *mono = (frame.left + frame.right) * 0.5,
                [left, right, rest @ ..] => {
                    *left = frame.left;
                    *right = frame.right;
                    rest.iter_mut().for_each(|s| *s = 0.0);
                }
                [] => {}
            }
        }
        self.scratch = scratch;
    }

    /// Render one block of stereo frames and advance the clock
    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        self.drain_commands();

        let base = self.clock.frames();
        for (i, slot) in out.iter_mut().enumerate() {
            let frame = base + i as u64;
            while self.pending.peek().is_some_and(|t| t.frame <= frame) {
                if let Some(timed) = self.pending.pop() {
                    self.apply_timed(timed.action);
                }
            }
            *slot = self.mix_frame();
        }

        self.lead.retain(|v| v.teardown != Some(0));
        self.backing.retain(|v| !v.is_finished());
        self.clock.advance(out.len() as u64);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply_command(command);
        }
    }

    fn push_timed(&mut self, at: f64, action: TimedAction) {
        let frame = self.clock.seconds_to_frames(at);
        self.seq += 1;
        self.pending.push(Timed {
            frame,
            seq: self.seq,
            action,
        });
    }

    fn apply_command(&mut self, command: RenderCommand) {
        match command {
            RenderCommand::Backing(event) => {
                self.push_timed(event.time, TimedAction::Backing(event.action))
            }
            RenderCommand::StartVoice { id, spec, at } => {
                self.push_timed(at, TimedAction::StartVoice { id, spec })
            }
            RenderCommand::RetargetVoice { id, pitch, at } => {
                self.push_timed(at, TimedAction::Retarget { id, pitch })
            }
            RenderCommand::ReleaseVoice { id, at } => {
                self.push_timed(at, TimedAction::Release { id })
            }
            RenderCommand::ReleaseAllVoices => {
                for lead in &mut self.lead {
                    lead.voice.release();
                }
            }
            RenderCommand::ReleaseBacking => {
                for voice in &mut self.backing {
                    voice.release();
                }
            }
            RenderCommand::StartLoop { start, at } => {
                if let Some(epoch) = self.loop_epochs.get(start.slot).copied() {
                    self.push_timed(at, TimedAction::StartLoop { start, epoch });
                }
            }
            RenderCommand::StopLoop { slot } => {
                if let Some(epoch) = self.loop_epochs.get_mut(slot) {
                    *epoch += 1;
                }
                if let Some(player) = self.loops.get_mut(slot) {
                    *player = None;
                }
            }
            RenderCommand::SetLoopVolume { slot, volume } => {
                if let Some(Some(player)) = self.loops.get_mut(slot) {
                    player.volume = volume;
                }
            }
            RenderCommand::AssignDrumSample { sound, buffer } => {
                self.drum_samples[drum_slot(sound)] = buffer;
            }
            RenderCommand::AssignBassSample(sample) => {
                self.bass_sample = sample;
            }
            RenderCommand::SetReverb(reverb) => {
                self.reverb = *reverb;
            }
        }
    }

    fn apply_timed(&mut self, action: TimedAction) {
        match action {
            TimedAction::Backing(action) => self.trigger_backing(action),
            TimedAction::StartVoice { id, spec } => {
                self.lead.push(LeadVoice {
                    id,
                    voice: spec.build(self.sample_rate),
                    teardown: None,
                });
            }
            TimedAction::Retarget { id, pitch } => {
                if let Some(lead) = self.lead.iter_mut().find(|v| v.id == id) {
                    lead.voice.retarget(pitch);
                }
            }
            TimedAction::Release { id } => {
                if let Some(lead) = self.lead.iter_mut().find(|v| v.id == id) {
                    lead.voice.release();
                }
            }
            TimedAction::StartLoop { start, epoch } => {
                if self.loop_epochs.get(start.slot) != Some(&epoch) {
                    return;
                }
                let buffer_rate = start.buffer.sample_rate() as f64;
                let len = start.buffer.len().max(1) as f64;
                let player = LoopPlayer {
                    role: start.role,
                    step: start.rate * buffer_rate / self.sample_rate as f64,
                    position: (start.offset * start.rate * buffer_rate) % len,
                    volume: start.volume,
                    buffer: start.buffer,
                };
                if let Some(slot) = self.loops.get_mut(start.slot) {
                    *slot = Some(player);
                }
            }
        }
    }

    fn trigger_backing(&mut self, action: ScheduledAction) {
        match action {
            ScheduledAction::Drum { sound, velocity } => {
                let source = match &self.drum_samples[drum_slot(sound)] {
                    Some(buffer) => BackingSource::Voice(Voice::Sampler(SamplerVoice::new(
                        buffer.clone(),
                        0,
                        0,
                        one_shot_envelope(),
                        self.sample_rate,
                    ))),
                    None => {
                        self.noise_seed = self.noise_seed.wrapping_add(1);
                        BackingSource::Drum(DrumOscillator::new(
                            sound,
                            velocity,
                            self.sample_rate,
                            self.noise_seed,
                        ))
                    }
                };
                let gain = match source {
                    BackingSource::Voice(_) => velocity,
                    BackingSource::Drum(_) => 1.0,
                };
                self.backing.push(BackingVoice {
                    role: Role::Drums,
                    source,
                    gain,
                    delay: 0,
                    hold: None,
                });
            }
            ScheduledAction::Bass { pitch, duration } => {
                let voice = match &self.bass_sample {
                    Some((buffer, root)) => Voice::Sampler(SamplerVoice::new(
                        buffer.clone(),
                        *root,
                        pitch,
                        one_shot_envelope(),
                        self.sample_rate,
                    )),
                    None => Voice::Synth(SynthVoice::new(pitch, bass_patch(), self.sample_rate)),
                };
                self.backing.push(BackingVoice {
                    role: Role::Bass,
                    source: BackingSource::Voice(voice),
                    gain: 1.0,
                    delay: 0,
                    hold: Some((duration * self.sample_rate as f64) as usize),
                });
            }
            ScheduledAction::Guitar { pitches } => {
                let spacing = (STRUM_SPACING * self.sample_rate as f64) as usize;
                let hold = (STRING_HOLD * self.sample_rate as f64) as usize;
                for (i, pitch) in pitches.into_iter().enumerate() {
                    let voice = SynthVoice::new(pitch, guitar_patch(), self.sample_rate);
                    self.backing.push(BackingVoice {
                        role: Role::Guitar,
                        source: BackingSource::Voice(Voice::Synth(voice)),
                        gain: 0.6,
                        delay: i * spacing,
                        hold: Some(hold),
                    });
                }
            }
        }
    }

    fn mix_frame(&mut self) -> StereoFrame {
        let mut buses = [StereoFrame::default(); 4];

        for voice in &mut self.backing {
            let frame = voice.next_frame();
            add(&mut buses[voice.role.index()], frame);
        }

        for player in self.loops.iter_mut().flatten() {
            let frame = player.next_frame();
            add(&mut buses[player.role.index()], frame);
        }

        let mut lead_in = StereoFrame::default();
        for lead in &mut self.lead {
            add(&mut lead_in, lead.voice.next_frame());
            if lead.voice.is_finished() {
                let left = lead.teardown.unwrap_or(self.teardown_frames);
                lead.teardown = Some(left.saturating_sub(1));
            }
        }

        let controls = &self.controls;
        let delayed = self
            .delay
            .process(lead_in, controls.delay_time(), controls.delay_feedback());
        let reverberated = self.reverb.process(lead_in);
        let lead_bus = &mut buses[Role::Lead.index()];
        add(lead_bus, lead_in);
        add(lead_bus, delayed.scaled(controls.delay_wet()));
        add(lead_bus, reverberated.scaled(controls.reverb_wet()));

        let mut out = StereoFrame::default();
        for role in Role::ALL {
            add(
                &mut out,
                buses[role.index()].scaled(controls.bus(role).effective_gain()),
            );
        }
        out.scaled(controls.master())
    }
}

fn add(acc: &mut StereoFrame, frame: StereoFrame) {
    acc.left += frame.left;
    acc.right += frame.right;
}

/// Kick, snare and the shared hat slot
fn drum_slot(sound: DrumSound) -> usize {
    match sound {
        DrumSound::Kick => 0,
        DrumSound::Snare => 1,
        DrumSound::HiHat | DrumSound::OpenHiHat => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesbox_core::types::SynthVoiceConfig;
    use crossbeam_channel::{Sender, unbounded};

    const SR: u32 = 8_000;

    fn graph() -> (RenderGraph, Sender<RenderCommand>, Arc<MixerControls>) {
        let (tx, rx) = unbounded();
        let controls = Arc::new(MixerControls::new());
        let config = EngineConfig::new()
            .with_sample_rate(SR)
            .with_reverb_seconds(0.2)
            .with_reverb_seed(1);
        let graph = RenderGraph::new(AudioClock::new(SR), rx, controls.clone(), &config);
        (graph, tx, controls)
    }

    fn render(graph: &mut RenderGraph, frames: usize) -> Vec<StereoFrame> {
        let mut out = vec![StereoFrame::default(); frames];
        graph.render_block(&mut out);
        out
    }

    fn peak(frames: &[StereoFrame]) -> f32 {
        frames
            .iter()
            .map(|f| f.left.abs().max(f.right.abs()))
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_silence_advances_clock() {
        let (mut graph, _tx, _) = graph();
        let out = render(&mut graph, 256);
        assert_eq!(peak(&out), 0.0);
        assert_eq!(graph.clock().frames(), 256);
    }

    #[test]
    fn test_backing_event_sounds_at_its_frame() {
        let (mut graph, tx, _) = graph();
        // 100 frames in at 8 kHz
        let event = ScheduledEvent::new(
            100.0 / SR as f64,
            ScheduledAction::Drum {
                sound: DrumSound::Kick,
                velocity: 1.0,
            },
        );
        tx.send(RenderCommand::Backing(event)).expect("send");
        let out = render(&mut graph, 400);
        assert_eq!(peak(&out[..100]), 0.0);
        assert!(peak(&out[100..]) > 0.0);
    }

    #[test]
    fn test_muted_bus_is_silent() {
        let (mut graph, tx, controls) = graph();
        controls.set_bus_muted(Role::Drums, true);
        let event = ScheduledEvent::new(
            0.0,
            ScheduledAction::Drum {
                sound: DrumSound::Snare,
                velocity: 1.0,
            },
        );
        tx.send(RenderCommand::Backing(event)).expect("send");
        let out = render(&mut graph, 400);
        assert_eq!(peak(&out), 0.0);
        assert_eq!(graph.backing_voice_count(Role::Drums), 1);
    }

    #[test]
    fn test_lead_voice_tears_down_after_release() {
        let (mut graph, tx, _) = graph();
        let spec = VoiceSpec::Synth {
            pitch: 60,
            config: SynthVoiceConfig::default(),
        };
        tx.send(RenderCommand::StartVoice { id: 1, spec, at: 0.0 })
            .expect("send");
        render(&mut graph, 800);
        assert_eq!(graph.lead_voice_count(), 1);

        tx.send(RenderCommand::ReleaseVoice { id: 1, at: 0.0 })
            .expect("send");
        // 0.3 s release plus 0.05 s pad at 8 kHz is 2800 frames
        render(&mut graph, 2000);
        assert_eq!(graph.lead_voice_count(), 1);
        render(&mut graph, 2000);
        assert_eq!(graph.lead_voice_count(), 0);
    }

    #[test]
    fn test_stop_loop_cancels_pending_start() {
        let (mut graph, tx, _) = graph();
        let start = LoopStart {
            slot: 0,
            role: Role::Drums,
            buffer: Arc::new(PcmBuffer::from_mono(&[0.5; 800], SR)),
            rate: 1.0,
            offset: 0.0,
            volume: 1.0,
        };
        tx.send(RenderCommand::StartLoop { start, at: 0.05 })
            .expect("send");
        tx.send(RenderCommand::StopLoop { slot: 0 }).expect("send");
        render(&mut graph, 1600);
        assert!(!graph.is_loop_playing(0));
    }

    #[test]
    fn test_loop_starts_at_offset() {
        let (mut graph, tx, controls) = graph();
        controls.set_master(1.0);
        controls.set_bus_gain(Role::Bass, 1.0);
        // Ramp buffer so the read position is visible in the output
        let ramp: Vec<f32> = (0..800).map(|i| i as f32 / 1000.0).collect();
        let start = LoopStart {
            slot: 1,
            role: Role::Bass,
            buffer: Arc::new(PcmBuffer::from_mono(&ramp, SR)),
            rate: 0.5,
            // 0.1 s of transport time at half speed is 0.05 s of buffer
            offset: 0.1,
            volume: 1.0,
        };
        tx.send(RenderCommand::StartLoop { start, at: 0.0 })
            .expect("send");
        let out = render(&mut graph, 4);
        assert!(graph.is_loop_playing(1));
        assert!((out[0].left - 0.4).abs() < 1e-4, "got {}", out[0].left);
        assert!((out[1].left - 0.4005).abs() < 1e-4);
    }
}

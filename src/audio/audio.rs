//! Audio output backends
//!
//! A backend is asked to open the audio path the first time the engine
//! needs sound. It returns an `AudioLink`: the clock the render graph
//! advances and the channel that feeds the graph. `CpalBackend` runs the
//! graph inside a device callback; `OfflineBackend` hands the graph's
//! inputs to the caller so it can be rendered by hand.

use super::clock::AudioClock;
use super::mixer::MixerControls;
use super::render::{RenderCommand, RenderGraph};
use crate::config::EngineConfig;
use crate::error::EngineError;
use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// A running output that may need resuming
pub trait OutputStream {
    fn resume(&self) -> Result<()>;
}

/// The control side's view of an open audio path
pub struct AudioLink {
    pub clock: AudioClock,
    pub commands: Sender<RenderCommand>,
    /// Keeps the device stream alive; `None` for offline rendering
    pub stream: Option<Box<dyn OutputStream>>,
}

/// Opens the audio path on first use
pub trait AudioBackend: Send {
    fn open(&mut self, controls: Arc<MixerControls>, config: &EngineConfig) -> Result<AudioLink, EngineError>;
}

/// Default output device through cpal
#[derive(Debug, Default)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    fn open(&mut self, controls: Arc<MixerControls>, config: &EngineConfig) -> Result<AudioLink, EngineError> {
        let (clock, commands, player) = AudioPlayer::new(controls, config)
            .map_err(|e| EngineError::EnvironmentUnavailable(format!("{:#}", e)))?;
        player
            .play()
            .map_err(|e| EngineError::EnvironmentUnavailable(format!("{:#}", e)))?;
        Ok(AudioLink {
            clock,
            commands,
            stream: Some(Box::new(player)),
        })
    }
}

struct AudioPlayer {
    stream: Stream,
}

impl AudioPlayer {
    fn new(
        controls: Arc<MixerControls>,
        engine_config: &EngineConfig,
    ) -> Result<(AudioClock, Sender<RenderCommand>, Self)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let config = device.default_output_config()?;

        let sample_format = config.sample_format();
        let config: StreamConfig = config.into();

        let clock = AudioClock::new(config.sample_rate.0);
        let (tx, rx) = unbounded();
        let graph = RenderGraph::new(clock.clone(), rx, controls, engine_config);
        info!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            ?sample_format,
            "opening output stream"
        );

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, graph)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, graph)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, graph)?,
            _ => return Err(anyhow!("Unsupported sample format: {:?}", sample_format)),
        };

        Ok((clock, tx, AudioPlayer { stream }))
    }

    fn build_stream<T>(device: &cpal::Device, config: &StreamConfig, mut graph: RenderGraph) -> Result<Stream>
    where
        T: Sample + SizedSample + Send + 'static + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut scratch: Vec<f32> = Vec::with_capacity(8192);

        let err_fn = |err| error!("an error occurred on the output audio stream: {:?}", err);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    graph.render_interleaved(&mut scratch, channels);
                    for (out, value) in data.iter_mut().zip(&scratch) {
                        *out = T::from_sample(value.clamp(-1.0, 1.0));
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| anyhow!("Failed to build output stream: {}", e))?;

        Ok(stream)
    }

    fn play(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| anyhow!("Failed to play stream: {}", e))
    }
}

impl OutputStream for AudioPlayer {
    fn resume(&self) -> Result<()> {
        self.play()
    }
}

/// What an offline open hands back to the caller
pub struct OfflineAudio {
    pub clock: AudioClock,
    pub commands: Receiver<RenderCommand>,
    pub controls: Arc<MixerControls>,
    pub config: EngineConfig,
}

impl OfflineAudio {
    /// Build the render graph for these inputs
    pub fn into_graph(self) -> RenderGraph {
        RenderGraph::new(self.clock, self.commands, self.controls, &self.config)
    }
}

/// Device-free backend. The render side is parked in a shared slot until
/// the caller takes it.
#[derive(Clone)]
pub struct OfflineBackend {
    sample_rate: u32,
    opened: Arc<Mutex<Option<OfflineAudio>>>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            opened: Arc::new(Mutex::new(None)),
        }
    }

    /// Take the render side once the engine has opened audio
    pub fn take(&self) -> Option<OfflineAudio> {
        self.opened.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl AudioBackend for OfflineBackend {
    fn open(&mut self, controls: Arc<MixerControls>, config: &EngineConfig) -> Result<AudioLink, EngineError> {
        let clock = AudioClock::new(self.sample_rate);
        let (tx, rx) = unbounded();
        let audio = OfflineAudio {
            clock: clock.clone(),
            commands: rx,
            controls,
            config: config.clone().with_sample_rate(self.sample_rate),
        };
        let mut slot = self
            .opened
            .lock()
            .map_err(|e| EngineError::EnvironmentUnavailable(e.to_string()))?;
        *slot = Some(audio);
        Ok(AudioLink {
            clock,
            commands: tx,
            stream: None,
        })
    }
}

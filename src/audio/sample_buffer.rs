//! Decoded PCM audio and the decoder seam
//!
//! Every loaded file (lead samples, drum and bass one-shots, loops) ends up
//! as an immutable `PcmBuffer` shared through an `Arc`. Buffers keep the
//! file's own sample rate; playback rates account for the difference.

use anyhow::{Result, bail};
use std::io::Cursor;

/// One stereo frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    pub fn scaled(self, gain: f32) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
        }
    }
}

/// Immutable decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    frames: Vec<StereoFrame>,
    sample_rate: u32,
}

impl PcmBuffer {
    pub fn new(frames: Vec<StereoFrame>, sample_rate: u32) -> Self {
        Self {
            frames,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Build a buffer from mono samples (duplicated to both sides)
    pub fn from_mono(samples: &[f32], sample_rate: u32) -> Self {
        Self::new(
            samples.iter().copied().map(StereoFrame::mono).collect(),
            sample_rate,
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.sample_rate as f64
    }

    /// Linearly interpolated frame at a fractional position; silent past the end
    pub fn frame_at(&self, position: f64) -> StereoFrame {
        if position < 0.0 {
            return StereoFrame::default();
        }
        let idx = position.floor() as usize;
        let frac = (position - idx as f64) as f32;
        match (self.frames.get(idx), self.frames.get(idx + 1)) {
            (Some(a), Some(b)) => StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            },
            (Some(a), None) => a.scaled(1.0 - frac),
            _ => StereoFrame::default(),
        }
    }

    /// Frame at a fractional position, wrapping around the end
    pub fn frame_looped(&self, position: f64) -> StereoFrame {
        let len = self.frames.len();
        if len == 0 {
            return StereoFrame::default();
        }
        let wrapped = position.rem_euclid(len as f64);
        let idx = wrapped.floor() as usize % len;
        let next = (idx + 1) % len;
        let frac = (wrapped - wrapped.floor()) as f32;
        let a = self.frames[idx];
        let b = self.frames[next];
        StereoFrame {
            left: a.left * (1.0 - frac) + b.left * frac,
            right: a.right * (1.0 - frac) + b.right * frac,
        }
    }
}

/// Turns encoded file bytes into PCM
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer>;
}

/// RIFF/WAVE decoder backed by hound
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PcmBuffer> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let frames: Vec<StereoFrame> = match spec.channels {
            0 => bail!("WAV file declares zero channels"),
            1 => samples.into_iter().map(StereoFrame::mono).collect(),
            n => samples
                .chunks_exact(n as usize)
                .map(|c| StereoFrame {
                    left: c[0],
                    right: c[1],
                })
                .collect(),
        };

        if frames.is_empty() {
            bail!("WAV file contains no audio frames");
        }

        Ok(PcmBuffer::new(frames, spec.sample_rate))
    }
}

#[cfg(test)]
pub(crate) fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for s in samples {
            writer
                .write_sample((s * i16::MAX as f32) as i16)
                .expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mono_wav() {
        let bytes = wav_bytes(&[0.0, 0.5, -0.5, 0.25], 22_050);
        let buffer = WavDecoder.decode(&bytes).expect("decodes");
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.sample_rate(), 22_050);
        let frame = buffer.frame_at(1.0);
        assert!((frame.left - 0.5).abs() < 1e-3);
        assert_eq!(frame.left, frame.right);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(WavDecoder.decode(b"definitely not a wav file").is_err());
    }

    #[test]
    fn test_interpolation() {
        let buffer = PcmBuffer::from_mono(&[0.0, 1.0], 100);
        assert!((buffer.frame_at(0.5).left - 0.5).abs() < 1e-6);
        assert_eq!(buffer.frame_at(5.0), StereoFrame::default());
        assert_eq!(buffer.frame_at(-1.0), StereoFrame::default());
    }

    #[test]
    fn test_looped_wraps() {
        let buffer = PcmBuffer::from_mono(&[0.0, 1.0, 2.0, 3.0], 4);
        assert_eq!(buffer.frame_looped(5.0).left, 1.0);
        assert!((buffer.frame_looped(3.5).left - 1.5).abs() < 1e-6);
        assert!((buffer.duration() - 1.0).abs() < 1e-12);
    }
}

//! Convolution reverb with a generated impulse response
//!
//! The impulse response is stereo noise under a cubic decay, so it is never
//! loaded from disk. Convolution is uniformly partitioned overlap-save: the
//! response is cut into blocks, each block's spectrum is multiplied with the
//! spectrum of the input from that many blocks ago, and the products are
//! summed. The wet signal is one block late.

use super::sample_buffer::StereoFrame;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Partition length in frames
pub const REVERB_BLOCK: usize = 1024;

/// Two-channel impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl ImpulseResponse {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn duration(&self) -> f64 {
        self.left.len() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Generate `seconds` of uniform noise in [-1, 1) per channel, shaped by
/// `(1 - i / len)^3` and scaled to unit energy across both channels
pub fn generate_impulse_response(seconds: f64, sample_rate: u32, seed: Option<u64>) -> ImpulseResponse {
    let len = ((seconds * sample_rate as f64).round() as usize).max(1);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let channel = |rng: &mut StdRng| -> Vec<f32> {
        (0..len)
            .map(|i| {
                let decay = (1.0 - i as f32 / len as f32).powi(3);
                rng.gen_range(-1.0f32..1.0) * decay
            })
            .collect()
    };

    let mut left = channel(&mut rng);
    let mut right = channel(&mut rng);
    normalize_energy(&mut left, &mut right);
    ImpulseResponse {
        left,
        right,
        sample_rate,
    }
}

/// Equal-power normalization: Σ(l² + r²) becomes 1
fn normalize_energy(left: &mut [f32], right: &mut [f32]) {
    let energy: f64 = left
        .iter()
        .chain(right.iter())
        .map(|&x| (x as f64) * (x as f64))
        .sum();
    if energy <= f64::EPSILON {
        return;
    }
    let gain = (1.0 / energy.sqrt()) as f32;
    left.iter_mut().chain(right.iter_mut()).for_each(|x| *x *= gain);
}

/// Single-channel partitioned convolver
pub struct Convolver {
    block: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    /// Spectrum of each impulse-response partition
    partitions: Vec<Vec<Complex<f32>>>,
    /// Input spectra, newest at `head`
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// Previous block followed by the block being filled
    window: Vec<f32>,
    time_scratch: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    /// Output of the last completed block
    output: Vec<f32>,
    pos: usize,
}

impl Convolver {
    pub fn new(impulse: &[f32], block: usize) -> Self {
        let block = block.max(1);
        let fft_size = block * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let count = impulse.len().div_ceil(block).max(1);
        let mut partitions = Vec::with_capacity(count);
        for chunk_idx in 0..count {
            let start = (chunk_idx * block).min(impulse.len());
            let end = (start + block).min(impulse.len());
            let mut padded = vec![0.0; fft_size];
            padded[..end - start].copy_from_slice(&impulse[start..end]);
            let mut spectrum = r2c.make_output_vec();
            if r2c.process(&mut padded, &mut spectrum).is_err() {
                spectrum.iter_mut().for_each(|c| *c = Complex::new(0.0, 0.0));
            }
            partitions.push(spectrum);
        }

        let bins = r2c.make_output_vec().len();
        Self {
            block,
            history: vec![vec![Complex::new(0.0, 0.0); bins]; count],
            head: 0,
            window: vec![0.0; fft_size],
            time_scratch: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); bins],
            accum: vec![Complex::new(0.0, 0.0); bins],
            output: vec![0.0; block],
            pos: 0,
            partitions,
            r2c,
            c2r,
        }
    }

    /// Latency of the wet signal in frames
    pub fn latency(&self) -> usize {
        self.block
    }

    pub fn process(&mut self, input: f32) -> f32 {
        let out = self.output[self.pos];
        self.window[self.block + self.pos] = input;
        self.pos += 1;
        if self.pos == self.block {
            self.flush();
            self.pos = 0;
        }
        out
    }

    fn flush(&mut self) {
        let block = self.block;
        let count = self.partitions.len();

        self.time_scratch.copy_from_slice(&self.window);
        self.window.copy_within(block.., 0);

        if self
            .r2c
            .process(&mut self.time_scratch, &mut self.spectrum)
            .is_err()
        {
            self.output.fill(0.0);
            return;
        }

        self.head = (self.head + count - 1) % count;
        self.history[self.head].copy_from_slice(&self.spectrum);

        self.accum.fill(Complex::new(0.0, 0.0));
        for (k, partition) in self.partitions.iter().enumerate() {
            let input = &self.history[(self.head + k) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(input).zip(partition) {
                *acc += x * h;
            }
        }

        // DC and Nyquist bins of a real signal carry no imaginary part
        if let Some(first) = self.accum.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.accum.last_mut() {
            last.im = 0.0;
        }

        if self
            .c2r
            .process(&mut self.accum, &mut self.time_scratch)
            .is_err()
        {
            self.output.fill(0.0);
            return;
        }

        let scale = 1.0 / (block * 2) as f32;
        for (out, y) in self.output.iter_mut().zip(&self.time_scratch[block..]) {
            *out = y * scale;
        }
    }
}

/// Stereo convolution reverb
pub struct ConvolutionReverb {
    left: Convolver,
    right: Convolver,
    duration: f64,
}

impl ConvolutionReverb {
    pub fn new(impulse: &ImpulseResponse, block: usize) -> Self {
        Self {
            left: Convolver::new(&impulse.left, block),
            right: Convolver::new(&impulse.right, block),
            duration: impulse.duration(),
        }
    }

    /// Length of the response this reverb was built from, in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn process(&mut self, input: StereoFrame) -> StereoFrame {
        StereoFrame {
            left: self.left.process(input.left),
            right: self.right.process(input.right),
        }
    }
}

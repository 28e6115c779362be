//! Biquad construction helpers
//!
//! Coefficient design fails for a cutoff at or above Nyquist, so requested
//! frequencies are pulled into range first. If design still fails the
//! filter passes its input through unchanged.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};

/// Design a biquad of `kind` at `frequency` Hz
pub fn design(kind: Type<f32>, sample_rate: f32, frequency: f32, q: f32) -> DirectForm2Transposed<f32> {
    DirectForm2Transposed::<f32>::new(coefficients(kind, sample_rate, frequency, q))
}

/// Replace the coefficients of an existing filter, keeping its state
pub fn retune(
    filter: &mut DirectForm2Transposed<f32>,
    kind: Type<f32>,
    sample_rate: f32,
    frequency: f32,
    q: f32,
) {
    filter.update_coefficients(coefficients(kind, sample_rate, frequency, q));
}

fn coefficients(kind: Type<f32>, sample_rate: f32, frequency: f32, q: f32) -> Coefficients<f32> {
    let frequency = frequency.clamp(10.0, sample_rate * 0.45);
    Coefficients::<f32>::from_params(kind, sample_rate.hz(), frequency.hz(), q.max(0.05))
        .unwrap_or(PASSTHROUGH)
}

const PASSTHROUGH: Coefficients<f32> = Coefficients {
    a1: 0.0,
    a2: 0.0,
    b0: 1.0,
    b1: 0.0,
    b2: 0.0,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowpass_attenuates_nyquist() {
        let mut lp = design(Type::LowPass, 48_000.0, 500.0, 0.707);
        let mut peak: f32 = 0.0;
        for i in 0..4800 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = lp.run(x);
            if i > 480 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.01, "peak {}", peak);
    }

    #[test]
    fn test_out_of_range_cutoff_is_clamped() {
        // 30 kHz at 48 kHz would be above Nyquist
        let mut lp = design(Type::LowPass, 48_000.0, 30_000.0, 1.0);
        for _ in 0..100 {
            assert!(lp.run(0.5).is_finite());
        }
    }
}

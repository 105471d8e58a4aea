//! Nonlinear and time-domain effects
//!
//! - [`distort`]: tanh soft clipping
//! - [`bitcrush`]: amplitude quantization
//! - [`comb_reverb`]: single feedback comb, the "simple reverb" used for echoey tails

use tracing::debug;

use crate::error::{Result, SynthError};
use crate::signal::{ms_to_samples, Signal};

/// Largest `f32` strictly below 1.0
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

pub const MAX_BITS: u32 = 24;

/// Soft clip via `tanh(x * amount)`
///
/// Small amounts are nearly linear (`tanh(x·a) ≈ x·a`), large amounts approach a hard
/// square. In `f32`, tanh rounds to ±1.0 for large arguments, so the output is pinned
/// to the largest representable value below 1 to stay strictly inside (-1, 1).
pub fn distort(signal: &Signal, amount: f32) -> Result<Signal> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(SynthError::parameter(
            "amount",
            format!("{amount} must be a positive number"),
        ));
    }
    Ok(signal.map(|s| (s * amount).tanh().clamp(-BELOW_ONE, BELOW_ONE)))
}

/// Quantize to a uniform grid with step `2^-bits`: `round(x · 2^bits) / 2^bits`
///
/// The step is a power of two, so scaling onto the grid and back is exact and
/// crushing an already-crushed signal changes nothing.
pub fn bitcrush(signal: &Signal, bits: u32) -> Result<Signal> {
    if !(1..=MAX_BITS).contains(&bits) {
        return Err(SynthError::parameter(
            "bits",
            format!("{bits} is outside 1..={MAX_BITS}"),
        ));
    }
    let scale = (1u32 << bits) as f32;
    Ok(signal.map(|s| (s * scale).round() / scale))
}

/// Feedback comb filter: `y[i] = x[i] + decay * y[i - D]`
///
/// `D` is `delay_ms` in whole samples. The recurrence reads its own output, so it runs
/// strictly front to back. `decay` must lie in 0.0..1.0; anything at or above 1 grows
/// without bound and is rejected rather than clamped.
pub fn comb_reverb(signal: &Signal, decay: f32, delay_ms: f32) -> Result<Signal> {
    if !(0.0..1.0).contains(&decay) {
        return Err(SynthError::UnstableFeedback { decay });
    }
    if decay == 0.0 {
        return Ok(signal.clone());
    }

    let delay = ms_to_samples(delay_ms, signal.sample_rate());
    if delay == 0 {
        return Err(SynthError::parameter(
            "delay_ms",
            format!("{delay_ms} ms is shorter than one sample"),
        ));
    }
    debug!(decay, delay, "comb reverb");

    let mut out = signal.samples().to_vec();
    for i in delay..out.len() {
        out[i] += decay * out[i - delay];
    }
    Ok(Signal::from_samples(signal.sample_rate(), out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;

    fn ramp(len: usize, span: f32) -> Signal {
        Signal::from_fn(len, SAMPLE_RATE, |i| {
            -span + 2.0 * span * i as f32 / (len - 1) as f32
        })
    }

    #[test]
    fn test_distort_bounded() {
        let input = ramp(1001, 1000.0);
        for amount in [0.01, 1.0, 2.0, 50.0, 1e6] {
            let out = distort(&input, amount).unwrap();
            assert_eq!(out.len(), input.len());
            assert!(
                out.samples().iter().all(|&s| s > -1.0 && s < 1.0),
                "amount {amount}"
            );
        }
    }

    #[test]
    fn test_distort_small_amount_is_linear() {
        let input = ramp(101, 1.0);
        let out = distort(&input, 0.001).unwrap();
        for (x, y) in input.samples().iter().zip(out.samples()) {
            assert!((y - x * 0.001).abs() < 1e-8);
        }
    }

    #[test]
    fn test_distort_rejects_bad_amount() {
        let input = ramp(10, 1.0);
        assert!(distort(&input, 0.0).is_err());
        assert!(distort(&input, -1.0).is_err());
        assert!(distort(&input, f32::INFINITY).is_err());
    }

    #[test]
    fn test_bitcrush_idempotent() {
        let input = Signal::from_fn(2000, SAMPLE_RATE, |i| (i as f32 * 0.0137).sin() * 0.93);
        for bits in [1, 2, 4, 6, 8, 12, 16, 24] {
            let once = bitcrush(&input, bits).unwrap();
            let twice = bitcrush(&once, bits).unwrap();
            assert_eq!(once, twice, "bits {bits}");
        }
    }

    #[test]
    fn test_bitcrush_levels() {
        let input = ramp(10_001, 1.0);
        let out = bitcrush(&input, 2).unwrap();
        let mut levels: Vec<i32> = out.samples().iter().map(|&s| (s * 4.0) as i32).collect();
        levels.dedup();
        // step 0.25 across -1..=1
        assert_eq!(levels, (-4..=4).collect::<Vec<_>>());
    }

    #[test]
    fn test_bitcrush_rounds_to_nearest_step() {
        let input = Signal::from_samples(SAMPLE_RATE, vec![0.3, -1.0, 0.0, 1.0, 0.6]);
        let out = bitcrush(&input, 2).unwrap();
        assert_eq!(out.samples(), &[0.25, -1.0, 0.0, 1.0, 0.5]);

        // one bit: half steps
        let out = bitcrush(&ramp(1001, 1.0), 1).unwrap();
        let mut levels: Vec<i32> = out.samples().iter().map(|&s| (s * 2.0) as i32).collect();
        levels.dedup();
        assert_eq!(levels, (-2..=2).collect::<Vec<_>>());
    }

    #[test]
    fn test_bitcrush_rejects_bad_bits() {
        let input = ramp(10, 1.0);
        assert!(bitcrush(&input, 0).is_err());
        assert!(bitcrush(&input, 25).is_err());
    }

    #[test]
    fn test_comb_zero_decay_is_identity() {
        let input = ramp(500, 0.8);
        for delay in [0.0, 0.01, 15.0, 40.0, 1000.0] {
            assert_eq!(comb_reverb(&input, 0.0, delay).unwrap(), input);
        }
    }

    #[test]
    fn test_comb_rejects_unstable_decay() {
        let input = ramp(500, 0.8);
        for decay in [1.0, 1.5, -0.1, f32::NAN] {
            assert!(matches!(
                comb_reverb(&input, decay, 30.0),
                Err(SynthError::UnstableFeedback { .. })
            ));
        }
    }

    #[test]
    fn test_comb_rejects_sub_sample_delay() {
        let input = ramp(500, 0.8);
        assert!(matches!(
            comb_reverb(&input, 0.3, 0.01),
            Err(SynthError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_comb_recurrence() {
        // 1 ms at 44.1 kHz is 44 samples
        let mut impulse = vec![0.0f32; 200];
        impulse[0] = 1.0;
        let input = Signal::from_samples(SAMPLE_RATE, impulse);
        let out = comb_reverb(&input, 0.5, 1.0).unwrap();

        assert_eq!(out.samples()[0], 1.0);
        assert_eq!(out.samples()[44], 0.5);
        assert_eq!(out.samples()[88], 0.25);
        assert_eq!(out.samples()[132], 0.125);
        assert_eq!(out.samples()[43], 0.0);
        // input untouched
        assert_eq!(input.samples()[44], 0.0);
    }

    #[test]
    fn test_comb_bounded() {
        let input = Signal::from_samples(SAMPLE_RATE, vec![1.0; 4410]);
        let out = comb_reverb(&input, 0.9, 1.0).unwrap();
        // geometric series bound
        assert!(out.peak() <= 10.0 + 1e-3);
    }
}

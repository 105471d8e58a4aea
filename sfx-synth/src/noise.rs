//! Colored noise generation
//!
//! White noise is drawn from a standard normal distribution using a caller-owned
//! random source, so a fixed seed always reproduces the same buffer. Pink noise is
//! shaped in the frequency domain; brown noise is integrated white noise.

use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::signal::{sample_count, Signal};

/// Divisor applied to integrated white noise.
///
/// Tuned for effects well under a few seconds long. The variance of a random walk
/// grows with its length, so long brown buffers still reach larger amplitudes.
pub const BROWN_NOISE_DIVISOR: f32 = 100.0;

/// Spectral color of a noise buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    /// Flat spectrum
    White,
    /// -3 dB per octave (1/f power)
    Pink,
    /// -6 dB per octave (1/f² power)
    Brown,
}

/// Generate `round(duration * sample_rate)` samples of colored noise
///
/// # Arguments
/// * `duration` - Duration in seconds
/// * `color` - Spectral shaping to apply
/// * `rng` - Random source; the same seed yields the same buffer
/// * `sample_rate` - Sample rate in Hz
pub fn noise<R: Rng + ?Sized>(
    duration: f32,
    color: NoiseColor,
    rng: &mut R,
    sample_rate: u32,
) -> Signal {
    let white = white_samples(sample_count(duration, sample_rate), rng);
    let samples = match color {
        NoiseColor::White => white,
        NoiseColor::Pink => pink_from_white(&white, sample_rate),
        NoiseColor::Brown => brown_from_white(&white),
    };
    Signal::from_samples(sample_rate, samples)
}

/// Independent standard-normal samples
pub fn white_samples<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<f32> {
    (0..len).map(|_| rng.sample::<f32, _>(StandardNormal)).collect()
}

/// Shape a white buffer to a 1/f power spectrum.
///
/// Every bin is scaled by `1/sqrt(f)` with `f` in Hz. The zero-frequency bin is
/// zeroed, so the result has no DC offset.
fn pink_from_white(white: &[f32], sample_rate: u32) -> Vec<f32> {
    let n = white.len();
    if n == 0 {
        return Vec::new();
    }

    let mut spectrum: Vec<Complex<f64>> =
        white.iter().map(|&s| Complex::new(s as f64, 0.0)).collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let bin_width = sample_rate as f64 / n as f64;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        // Bins k and n-k hold the same |f|; scaling them equally keeps the
        // spectrum Hermitian and the inverse real.
        let harmonic = k.min(n - k);
        if harmonic == 0 {
            *bin = Complex::new(0.0, 0.0);
        } else {
            *bin *= 1.0 / (harmonic as f64 * bin_width).sqrt();
        }
    }

    planner.plan_fft_inverse(n).process(&mut spectrum);

    let scale = 1.0 / n as f64;
    spectrum.iter().map(|c| (c.re * scale) as f32).collect()
}

/// Running sum of white samples, scaled by [`BROWN_NOISE_DIVISOR`]
fn brown_from_white(white: &[f32]) -> Vec<f32> {
    let mut acc = 0.0f64;
    white
        .iter()
        .map(|&s| {
            acc += s as f64;
            (acc / BROWN_NOISE_DIVISOR as f64) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    const COLORS: [NoiseColor; 3] = [NoiseColor::White, NoiseColor::Pink, NoiseColor::Brown];

    fn band_energy(samples: &[f32], sample_rate: u32, lo: f64, hi: f64) -> f64 {
        let n = samples.len();
        let mut spectrum: Vec<Complex<f64>> =
            samples.iter().map(|&s| Complex::new(s as f64, 0.0)).collect();
        FftPlanner::<f64>::new()
            .plan_fft_forward(n)
            .process(&mut spectrum);
        let bin_width = sample_rate as f64 / n as f64;
        spectrum[..n / 2]
            .iter()
            .enumerate()
            .filter(|(k, _)| {
                let f = *k as f64 * bin_width;
                f >= lo && f < hi
            })
            .map(|(_, c)| c.norm_sqr())
            .sum()
    }

    #[test]
    fn test_noise_length_every_color() {
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        for color in COLORS {
            for duration in [0.01, 0.15, 0.3, 1.0] {
                let signal = noise(duration, color, &mut rng, SAMPLE_RATE);
                assert_eq!(signal.len(), sample_count(duration, SAMPLE_RATE), "{color:?}");
                assert_eq!(signal.sample_rate(), SAMPLE_RATE);
            }
        }
    }

    #[test]
    fn test_noise_odd_length_pink() {
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let signal = noise(0.0101, NoiseColor::Pink, &mut rng, SAMPLE_RATE);
        assert_eq!(signal.len(), 445);
        assert!(signal.samples().iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_noise_reproducibility() {
        for color in COLORS {
            let a = noise(0.05, color, &mut Pcg64Mcg::seed_from_u64(42), SAMPLE_RATE);
            let b = noise(0.05, color, &mut Pcg64Mcg::seed_from_u64(42), SAMPLE_RATE);
            let c = noise(0.05, color, &mut Pcg64Mcg::seed_from_u64(43), SAMPLE_RATE);
            assert_eq!(a, b);
            assert_ne!(a, c);
        }
    }

    #[test]
    fn test_zero_duration() {
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        for color in COLORS {
            assert!(noise(0.0, color, &mut rng, SAMPLE_RATE).is_empty());
        }
    }

    #[test]
    fn test_pink_has_no_dc() {
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let pink = noise(0.2, NoiseColor::Pink, &mut rng, SAMPLE_RATE);
        let mean: f64 =
            pink.samples().iter().map(|&s| s as f64).sum::<f64>() / pink.len() as f64;
        assert!(mean.abs() < 1e-6, "mean = {mean}");
    }

    #[test]
    fn test_pink_tilts_toward_low_frequencies() {
        let mut rng = Pcg64Mcg::seed_from_u64(11);
        let pink = noise(0.5, NoiseColor::Pink, &mut rng, SAMPLE_RATE);
        // Equal-width bands: 1/f power puts far more energy low
        let low = band_energy(pink.samples(), SAMPLE_RATE, 100.0, 1100.0);
        let high = band_energy(pink.samples(), SAMPLE_RATE, 10_000.0, 11_000.0);
        assert!(low > high * 4.0, "low={low} high={high}");
    }

    #[test]
    fn test_brown_is_integrated_white() {
        let white = noise(0.01, NoiseColor::White, &mut Pcg64Mcg::seed_from_u64(5), SAMPLE_RATE);
        let brown = noise(0.01, NoiseColor::Brown, &mut Pcg64Mcg::seed_from_u64(5), SAMPLE_RATE);

        let mut acc = 0.0f64;
        for (w, b) in white.samples().iter().zip(brown.samples()) {
            acc += *w as f64;
            assert!(((acc / 100.0) as f32 - b).abs() < 1e-6);
        }
    }
}

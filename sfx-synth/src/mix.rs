//! Layer mixing, peak normalization and the final fade/normalize pass

use serde::{Deserialize, Serialize};

use crate::envelope::apply_fade;
use crate::error::{Result, SynthError};
use crate::signal::Signal;
use crate::DEFAULT_PEAK;

/// Scale so the largest absolute sample equals `peak`
///
/// An all-zero signal has no peak to scale and is returned unchanged.
pub fn normalize(signal: &Signal, peak: f32) -> Signal {
    let current = signal.peak();
    if current > 0.0 {
        signal.scaled(peak / current)
    } else {
        signal.clone()
    }
}

/// One weighted layer of a mix, starting `offset` samples into the output
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    pub signal: &'a Signal,
    pub gain: f32,
    pub offset: usize,
}

impl<'a> Layer<'a> {
    pub fn new(signal: &'a Signal, gain: f32) -> Self {
        Self {
            signal,
            gain,
            offset: 0,
        }
    }

    pub fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Weighted sum of `(signal, gain)` pairs, each padded or truncated to `target_len`
pub fn mix(layers: &[(&Signal, f32)], target_len: usize) -> Result<Signal> {
    let placed: Vec<Layer> = layers
        .iter()
        .map(|&(signal, gain)| Layer::new(signal, gain))
        .collect();
    mix_at(&placed, target_len)
}

/// Weighted sum of layers placed at sample offsets
///
/// Anything running past `target_len` is cut off. All layers must share one sample
/// rate; an empty layer list yields silence at [`crate::SAMPLE_RATE`].
pub fn mix_at(layers: &[Layer], target_len: usize) -> Result<Signal> {
    let sample_rate = layers
        .first()
        .map(|layer| layer.signal.sample_rate())
        .unwrap_or(crate::SAMPLE_RATE);

    let mut out = vec![0.0f32; target_len];
    for layer in layers {
        if layer.signal.sample_rate() != sample_rate {
            return Err(SynthError::SampleRateMismatch {
                expected: sample_rate,
                found: layer.signal.sample_rate(),
            });
        }
        if layer.offset >= target_len {
            continue;
        }
        for (dst, &src) in out[layer.offset..].iter_mut().zip(layer.signal.samples()) {
            *dst += src * layer.gain;
        }
    }
    Ok(Signal::from_samples(sample_rate, out))
}

fn default_peak() -> f32 {
    DEFAULT_PEAK
}

fn default_fade_in_ms() -> f32 {
    5.0
}

fn default_fade_out_ms() -> f32 {
    50.0
}

/// Final shaping applied to every finished effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Finish {
    #[serde(default = "default_fade_in_ms")]
    pub fade_in_ms: f32,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: f32,
    /// Output ceiling
    #[serde(default = "default_peak")]
    pub peak: f32,
}

impl Default for Finish {
    fn default() -> Self {
        Self {
            fade_in_ms: default_fade_in_ms(),
            fade_out_ms: default_fade_out_ms(),
            peak: default_peak(),
        }
    }
}

/// Fade both ends, then normalize to the ceiling
///
/// Normalizing last guarantees the output peak is exactly `finish.peak` (or the
/// signal is silent) and the faded ends stay at zero.
pub fn finalize(signal: &Signal, finish: &Finish) -> Signal {
    let faded = apply_fade(signal, finish.fade_in_ms, finish.fade_out_ms);
    normalize(&faded, finish.peak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;

    #[test]
    fn test_normalize_to_peak() {
        let signal = Signal::from_samples(SAMPLE_RATE, vec![0.1, -0.4, 0.2]);
        let out = normalize(&signal, 0.9);
        assert!((out.peak() - 0.9).abs() < 1e-6);
        assert!((out.samples()[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_silence_unchanged() {
        let signal = Signal::silence(100, SAMPLE_RATE);
        assert_eq!(normalize(&signal, 0.9), signal);
        assert!(normalize(&Signal::silence(0, SAMPLE_RATE), 0.9).is_empty());
    }

    #[test]
    fn test_mix_reconciles_lengths() {
        let short = Signal::from_samples(SAMPLE_RATE, vec![1.0; 1000]);
        let long = Signal::from_samples(SAMPLE_RATE, vec![1.0; 1500]);
        let out = mix(&[(&short, 0.5), (&long, 0.25)], 1200).unwrap();

        assert_eq!(out.len(), 1200);
        assert!((out.samples()[0] - 0.75).abs() < 1e-6);
        assert!((out.samples()[999] - 0.75).abs() < 1e-6);
        // past the short layer only the long one contributes
        assert!((out.samples()[1000] - 0.25).abs() < 1e-6);
        assert!((out.samples()[1199] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_mix_pads_short_layer_to_longest() {
        let a = Signal::from_samples(SAMPLE_RATE, vec![0.4; 1000]);
        let b = Signal::from_samples(SAMPLE_RATE, vec![0.2; 1500]);
        let out = mix(&[(&a, 0.5), (&b, 1.0)], 1500).unwrap();

        assert_eq!(out.len(), 1500);
        assert!(out.samples()[..1000]
            .iter()
            .all(|&s| (s - 0.4).abs() < 1e-6));
        // last 500 samples come from the longer layer alone
        assert!(out.samples()[1000..]
            .iter()
            .all(|&s| (s - 0.2).abs() < 1e-6));
    }

    #[test]
    fn test_mix_rejects_rate_mismatch() {
        let a = Signal::silence(10, SAMPLE_RATE);
        let b = Signal::silence(10, 22_050);
        assert!(matches!(
            mix(&[(&a, 1.0), (&b, 1.0)], 10),
            Err(SynthError::SampleRateMismatch {
                expected: 44_100,
                found: 22_050
            })
        ));
    }

    #[test]
    fn test_mix_empty() {
        let out = mix(&[], 64).unwrap();
        assert_eq!(out.len(), 64);
        assert!(out.is_silent());
    }

    #[test]
    fn test_mix_at_offsets() {
        let click = Signal::from_samples(SAMPLE_RATE, vec![1.0, 1.0]);
        let layers = [
            Layer::new(&click, 1.0),
            Layer::new(&click, 0.5).at(5),
            Layer::new(&click, 1.0).at(9),
            Layer::new(&click, 1.0).at(50),
        ];
        let out = mix_at(&layers, 10).unwrap();
        assert_eq!(
            out.samples(),
            &[1.0, 1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_finalize() {
        let signal = Signal::from_fn(8820, SAMPLE_RATE, |i| ((i as f32) * 0.05).sin() * 3.0);
        let out = finalize(&signal, &Finish::default());

        assert_eq!(out.len(), signal.len());
        assert!((out.peak() - DEFAULT_PEAK).abs() < 1e-5);
        assert_eq!(out.samples()[0], 0.0);
        assert_eq!(*out.samples().last().unwrap(), 0.0);
    }

    #[test]
    fn test_finish_defaults_from_toml() {
        let finish: Finish = toml::from_str("peak = 0.7").unwrap();
        assert_eq!(finish.peak, 0.7);
        assert_eq!(finish.fade_in_ms, 5.0);
        assert_eq!(finish.fade_out_ms, 50.0);
    }
}

//! Sample buffer type shared by every stage of the engine.

/// Number of samples covering `duration` seconds, rounded to the nearest sample.
///
/// Negative or non-finite durations produce an empty buffer.
pub fn sample_count(duration: f32, sample_rate: u32) -> usize {
    let count = (duration as f64 * sample_rate as f64).round();
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

/// Number of whole samples in `ms` milliseconds (truncating, like a sample index).
pub fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    let count = (sample_rate as f64 * ms as f64 / 1000.0).floor();
    if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    }
}

/// Mono audio signal (f32 samples at a fixed sample rate)
///
/// Signals are never mutated once produced: every transform in the engine
/// borrows its input and returns a new `Signal`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl Signal {
    /// Create a signal from samples
    pub fn from_samples(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// All-zero signal of `len` samples
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::from_samples(sample_rate, vec![0.0; len])
    }

    /// Build a signal by evaluating `f` at every sample index
    pub fn from_fn(len: usize, sample_rate: u32, f: impl FnMut(usize) -> f32) -> Self {
        Self::from_samples(sample_rate, (0..len).map(f).collect())
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if signal is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value (0.0 for an empty signal)
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// True when every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// New signal with `f` applied to every sample
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self::from_samples(self.sample_rate, self.samples.iter().map(|&s| f(s)).collect())
    }

    /// New signal scaled by a constant gain
    pub fn scaled(&self, gain: f32) -> Self {
        self.map(|s| s * gain)
    }

    /// New signal zero-padded or truncated to exactly `len` samples
    pub fn resized(&self, len: usize) -> Self {
        let mut samples = self.samples.clone();
        samples.resize(len, 0.0);
        Self::from_samples(self.sample_rate, samples)
    }

    /// Convert to 16-bit PCM, clamping to the -1.0..=1.0 range
    pub fn to_pcm_i16(&self) -> Vec<i16> {
        to_pcm_i16(&self.samples)
    }
}

/// Convert f32 samples (-1.0 to 1.0) to PCM i16
pub fn to_pcm_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

//! Butterworth filter bank
//!
//! Filters are designed from the analog Butterworth prototype, moved to the
//! requested band with the standard frequency transforms, and discretized with
//! the bilinear transform (with pre-warping). The result is realized as a cascade
//! of second-order sections, which keeps high orders numerically stable.
//!
//! Filtering is always zero-phase: the cascade runs forward, then backward over
//! the reversed output, so percussive transients stay where they were.

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, SynthError};
use crate::oscillators::FrequencyPath;
use crate::signal::Signal;

/// Upper bound on cutoff / Nyquist; designs closer to Nyquist are unstable
pub const MAX_NORMALIZED_CUTOFF: f64 = 0.99;

/// Highest Butterworth order accepted
pub const MAX_FILTER_ORDER: usize = 8;

/// Order used when a recipe does not name one
pub const DEFAULT_ORDER: usize = 4;

/// Block length for time-varying band-pass sweeps
pub const DEFAULT_SWEEP_BLOCK: usize = 512;

type C64 = Complex<f64>;

/// Which band a filter passes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    /// Pass below `cutoff` Hz
    Lowpass { cutoff: f32 },
    /// Pass above `cutoff` Hz
    Highpass { cutoff: f32 },
    /// Pass between `low` and `high` Hz
    Bandpass { low: f32, high: f32 },
}

/// Butterworth filter request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(flatten)]
    pub kind: FilterKind,
    #[serde(default = "default_order")]
    pub order: usize,
}

fn default_order() -> usize {
    DEFAULT_ORDER
}

impl FilterSpec {
    pub fn lowpass(cutoff: f32) -> Self {
        Self {
            kind: FilterKind::Lowpass { cutoff },
            order: DEFAULT_ORDER,
        }
    }

    pub fn highpass(cutoff: f32) -> Self {
        Self {
            kind: FilterKind::Highpass { cutoff },
            order: DEFAULT_ORDER,
        }
    }

    pub fn bandpass(low: f32, high: f32) -> Self {
        Self {
            kind: FilterKind::Bandpass { low, high },
            order: DEFAULT_ORDER,
        }
    }

    /// Set the filter order
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }
}

/// One second-order section in transposed direct form II.
///
/// `b` are feed-forward and `a` feedback coefficients, with `a[0] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn from_roots(zeros: &[C64], poles: &[C64]) -> Self {
        Self {
            b: real_poly(zeros),
            a: real_poly(poles),
        }
    }

    /// Complex transfer function value at `z`
    fn eval(&self, z: C64) -> C64 {
        let zi = z.inv();
        let zi2 = zi * zi;
        let num = zi2 * self.b[2] + zi * self.b[1] + self.b[0];
        let den = zi2 * self.a[2] + zi * self.a[1] + self.a[0];
        num / den
    }

    /// DC gain, used to carry steady-state levels through the cascade
    fn dc_gain(&self) -> f64 {
        let den = self.a.iter().sum::<f64>();
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            self.b.iter().sum::<f64>() / den
        }
    }

    /// State that makes a constant input of 1.0 pass without a start transient
    fn step_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z2 = self.b[2] - self.a[2] * g;
        let z1 = self.b[1] - self.a[1] * g + z2;
        [z1, z2]
    }

    /// Both poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        let (a1, a2) = (self.a[1], self.a[2]);
        a2.abs() < 1.0 && a1.abs() < 1.0 + a2
    }

    fn run(&self, samples: &mut [f64], state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let [mut z1, mut z2] = state;
        for sample in samples.iter_mut() {
            let x = *sample;
            let y = b0 * x + z1;
            z1 = b1 * x - a1 * y + z2;
            z2 = b2 * x - a2 * y;
            *sample = y;
        }
    }
}

/// Coefficients of `(1 - r0 z^-1)(1 - r1 z^-1)` for a conjugate or real pair
fn real_poly(roots: &[C64]) -> [f64; 3] {
    match roots {
        [] => [1.0, 0.0, 0.0],
        [r] => [1.0, -r.re, 0.0],
        [r0, r1, ..] => [1.0, -(r0 + r1).re, (r0 * r1).re],
    }
}

/// Butterworth design as a cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct Butterworth {
    sections: Vec<Biquad>,
}

impl Butterworth {
    /// Design the filter described by `spec` at `sample_rate`
    ///
    /// Cutoffs are clamped to [`MAX_NORMALIZED_CUTOFF`] of Nyquist. A band whose low
    /// edge is not below its high edge after clamping gets `low = high / 2`.
    pub fn design(spec: &FilterSpec, sample_rate: u32) -> Result<Self> {
        if spec.order == 0 || spec.order > MAX_FILTER_ORDER {
            return Err(SynthError::filter(format!(
                "order {} outside 1..={}",
                spec.order, MAX_FILTER_ORDER
            )));
        }
        let nyquist = sample_rate as f64 / 2.0;
        let order = spec.order;

        // Digital design at fs = 2 (frequencies normalized to Nyquist)
        let warp = |wn: f64| 4.0 * (PI * wn / 2.0).tan();
        let prototype = prototype_poles(order);

        let (poles, zeros, reference) = match spec.kind {
            FilterKind::Lowpass { cutoff } => {
                let wn = normalize_cutoff(cutoff, nyquist)?;
                let w = warp(wn);
                let poles: Vec<C64> = prototype.iter().map(|&p| p * w).collect();
                (poles, vec![C64::new(-1.0, 0.0); order], C64::new(1.0, 0.0))
            }
            FilterKind::Highpass { cutoff } => {
                let wn = normalize_cutoff(cutoff, nyquist)?;
                let w = warp(wn);
                let poles: Vec<C64> = prototype.iter().map(|&p| C64::new(w, 0.0) / p).collect();
                (poles, vec![C64::new(1.0, 0.0); order], C64::new(-1.0, 0.0))
            }
            FilterKind::Bandpass { low, high } => {
                let mut lo = normalize_cutoff(low, nyquist)?;
                let hi = normalize_cutoff(high, nyquist)?;
                if lo >= hi {
                    tracing::warn!(low, high, "band-pass edges out of order, using low = high / 2");
                    lo = hi * 0.5;
                }
                let (w_lo, w_hi) = (warp(lo), warp(hi));
                let bandwidth = w_hi - w_lo;
                let w0_sq = w_lo * w_hi;

                let mut poles = Vec::with_capacity(2 * order);
                for &p in &prototype {
                    let half = p * (bandwidth / 2.0);
                    let root = (half * half - w0_sq).sqrt();
                    poles.push(half + root);
                    poles.push(half - root);
                }
                // One zero at z = 1 and one at z = -1 per section
                let zeros: Vec<C64> = (0..2 * order)
                    .map(|i| C64::new(if i % 2 == 0 { 1.0 } else { -1.0 }, 0.0))
                    .collect();
                let center = 2.0 * (w0_sq.sqrt() / 4.0).atan();
                (poles, zeros, C64::from_polar(1.0, center))
            }
        };

        let digital: Vec<C64> = poles.iter().map(|&s| bilinear(s)).collect();
        let mut sections = pair_sections(&digital, &zeros);

        let response = sections
            .iter()
            .fold(C64::new(1.0, 0.0), |acc, s| acc * s.eval(reference));
        let gain = 1.0 / response.norm();
        if !gain.is_finite() {
            return Err(SynthError::filter("degenerate design: zero gain at reference frequency"));
        }
        if let Some(first) = sections.first_mut() {
            first.b.iter_mut().for_each(|b| *b *= gain);
        }

        tracing::trace!(?spec, sections = sections.len(), "designed butterworth filter");
        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64, sample_rate: u32) -> f64 {
        let omega = 2.0 * PI * frequency / sample_rate as f64;
        let z = C64::from_polar(1.0, omega);
        self.sections
            .iter()
            .fold(C64::new(1.0, 0.0), |acc, s| acc * s.eval(z))
            .norm()
    }

    /// Single causal pass, starting from the steady state of `initial`
    fn run_causal(&self, samples: &mut [f64], initial: f64) {
        let mut level = initial;
        for section in &self.sections {
            let [z1, z2] = section.step_state();
            section.run(samples, [z1 * level, z2 * level]);
            level *= section.dc_gain();
        }
    }

    /// Forward-backward (zero-phase) filtering
    ///
    /// The input is extended at both ends by odd reflection and each pass starts
    /// from steady-state conditions, which keeps the edges free of start-up ringing.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let len = input.len();
        if len == 0 {
            return Vec::new();
        }

        let edge = (3 * (2 * self.sections.len() + 1)).min(len - 1);
        let first = input[0];
        let last = input[len - 1];

        let mut ext = Vec::with_capacity(len + 2 * edge);
        ext.extend((1..=edge).rev().map(|i| 2.0 * first - input[i]));
        ext.extend_from_slice(input);
        ext.extend((1..=edge).map(|i| 2.0 * last - input[len - 1 - i]));

        let start = ext[0];
        self.run_causal(&mut ext, start);

        ext.reverse();
        let start = ext[0];
        self.run_causal(&mut ext, start);
        ext.reverse();

        ext[edge..edge + len].to_vec()
    }

    /// Zero-phase filter a signal; output has the same length
    pub fn apply(&self, signal: &Signal) -> Signal {
        let input: Vec<f64> = signal.samples().iter().map(|&s| s as f64).collect();
        let output = self.filtfilt(&input);
        Signal::from_samples(
            signal.sample_rate(),
            output.into_iter().map(|s| s as f32).collect(),
        )
    }
}

/// Normalize a cutoff in Hz to a fraction of Nyquist, clamped below 1
fn normalize_cutoff(cutoff: f32, nyquist: f64) -> Result<f64> {
    let cutoff = cutoff as f64;
    if !cutoff.is_finite() || cutoff <= 0.0 {
        return Err(SynthError::filter(format!(
            "cutoff {cutoff} Hz must be a positive frequency"
        )));
    }
    let wn = cutoff / nyquist;
    if wn > MAX_NORMALIZED_CUTOFF {
        tracing::debug!(cutoff, nyquist, "cutoff clamped below nyquist");
        Ok(MAX_NORMALIZED_CUTOFF)
    } else {
        Ok(wn)
    }
}

/// Poles of the unit-cutoff analog Butterworth low-pass of the given order
fn prototype_poles(order: usize) -> Vec<C64> {
    let n = order as i64;
    (0..order as i64)
        .map(|k| {
            let m = (-n + 1 + 2 * k) as f64;
            -C64::from_polar(1.0, PI * m / (2.0 * order as f64))
        })
        .collect()
}

/// Bilinear transform at fs = 2: `z = (4 + s) / (4 - s)`
fn bilinear(s: C64) -> C64 {
    (C64::new(4.0, 0.0) + s) / (C64::new(4.0, 0.0) - s)
}

/// Group poles into conjugate pairs (or real pairs) and hand out zeros in order
fn pair_sections(poles: &[C64], zeros: &[C64]) -> Vec<Biquad> {
    const IMAG_TOLERANCE: f64 = 1e-12;

    let mut pairs: Vec<Vec<C64>> = poles
        .iter()
        .filter(|p| p.im > IMAG_TOLERANCE)
        .map(|&p| vec![p, p.conj()])
        .collect();

    let mut real: Vec<f64> = poles
        .iter()
        .filter(|p| p.im.abs() <= IMAG_TOLERANCE)
        .map(|p| p.re)
        .collect();
    real.sort_by(|a, b| a.total_cmp(b));
    for chunk in real.chunks(2) {
        pairs.push(chunk.iter().map(|&r| C64::new(r, 0.0)).collect());
    }

    let mut remaining = zeros;
    pairs
        .iter()
        .map(|section_poles| {
            let take = section_poles.len().min(remaining.len());
            let (section_zeros, rest) = remaining.split_at(take);
            remaining = rest;
            Biquad::from_roots(section_zeros, section_poles)
        })
        .collect()
}

/// Apply a Butterworth filter with zero phase; output length equals input length
pub fn apply(signal: &Signal, spec: &FilterSpec) -> Result<Signal> {
    Ok(Butterworth::design(spec, signal.sample_rate())?.apply(signal))
}

/// Band-pass sweep settings for [`sweep_bandpass`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFilter {
    /// Center frequency over time
    pub center: FrequencyPath,
    /// Block length in samples
    #[serde(default = "default_block")]
    pub block: usize,
    /// Low edge as a fraction of the center
    #[serde(default = "default_low_ratio")]
    pub low_ratio: f32,
    /// High edge as a fraction of the center
    #[serde(default = "default_high_ratio")]
    pub high_ratio: f32,
    #[serde(default = "default_order")]
    pub order: usize,
}

fn default_block() -> usize {
    DEFAULT_SWEEP_BLOCK
}

fn default_low_ratio() -> f32 {
    0.5
}

fn default_high_ratio() -> f32 {
    1.5
}

impl SweepFilter {
    pub fn new(center: FrequencyPath) -> Self {
        Self {
            center,
            block: DEFAULT_SWEEP_BLOCK,
            low_ratio: default_low_ratio(),
            high_ratio: default_high_ratio(),
            order: DEFAULT_ORDER,
        }
    }
}

/// Time-varying band-pass, recomputed once per block
///
/// The signal is cut into contiguous blocks of `sweep.block` samples. Each block
/// gets its own band-pass centered on the path's frequency at the block start and
/// is filtered independently, so small steps at block boundaries are expected.
pub fn sweep_bandpass(signal: &Signal, sweep: &SweepFilter) -> Result<Signal> {
    if sweep.block == 0 {
        return Err(SynthError::parameter("block", "sweep block length must be at least 1"));
    }
    let rate = signal.sample_rate();
    let duration = signal.len() as f64 / rate as f64;
    let input: Vec<f64> = signal.samples().iter().map(|&s| s as f64).collect();
    let mut output = Vec::with_capacity(input.len());

    for (index, block) in input.chunks(sweep.block).enumerate() {
        let t = (index * sweep.block) as f64 / rate as f64;
        let center = sweep.center.frequency_at(t, duration) as f32;
        let spec = FilterSpec::bandpass(center * sweep.low_ratio, center * sweep.high_ratio)
            .with_order(sweep.order);
        output.extend(Butterworth::design(&spec, rate)?.filtfilt(block));
    }

    Ok(Signal::from_samples(
        rate,
        output.into_iter().map(|s| s as f32).collect(),
    ))
}

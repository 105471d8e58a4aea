//! Gain envelopes and boundary fades
//!
//! An [`Envelope`] is a per-sample gain curve with the same length as the signal it
//! shapes. The three-segment curve from [`build_envelope`] is the general-purpose
//! amplitude shape; [`EnvelopeShape`] adds the analytic curves recipes use
//! (exponential decays, arches, tremolo, ...). [`apply_fade`] is the anti-click
//! ramp applied to every finished effect.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::error::{Result, SynthError};
use crate::signal::{ms_to_samples, sample_count, Signal};

/// Per-sample gain multipliers
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    gains: Vec<f32>,
}

impl Envelope {
    pub fn from_gains(gains: Vec<f32>) -> Self {
        Self { gains }
    }

    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    /// Multiply `signal` by this envelope, returning a new signal.
    ///
    /// Samples past the end of the envelope are silenced.
    pub fn apply(&self, signal: &Signal) -> Signal {
        Signal::from_fn(signal.len(), signal.sample_rate(), |i| {
            signal.samples()[i] * self.gains.get(i).copied().unwrap_or(0.0)
        })
    }
}

/// `n` evenly spaced values from `start` to `end`, both ends included.
///
/// A single point yields `start`. The last point is exactly `end`.
fn linspace(start: f64, end: f64, n: usize) -> impl Iterator<Item = f64> {
    let last = n.saturating_sub(1).max(1) as f64;
    (0..n).map(move |i| start + (end - start) * (i as f64 / last))
}

fn check_fraction(name: &'static str, value: f32) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value as f64)
    } else {
        Err(SynthError::parameter(name, format!("{value} must be a non-negative number")))
    }
}

/// Build a three-segment envelope: 0 → 1 → `sustain` → 0
///
/// Segment lengths are the attack, decay and release fractions normalized by their
/// sum, so they need not add up to 1. There is no held sustain stage. The result
/// has exactly `round(duration * sample_rate)` samples.
///
/// # Arguments
/// * `duration` - Total duration in seconds
/// * `attack` - Relative length of the 0 → 1 ramp
/// * `decay` - Relative length of the 1 → sustain ramp
/// * `sustain` - Level reached at the end of the decay (clamped to 0.0..=1.0)
/// * `release` - Relative length of the sustain → 0 ramp
/// * `sample_rate` - Sample rate in Hz
pub fn build_envelope(
    duration: f32,
    attack: f32,
    decay: f32,
    sustain: f32,
    release: f32,
    sample_rate: u32,
) -> Result<Envelope> {
    three_segment(
        sample_count(duration, sample_rate),
        attack,
        decay,
        sustain,
        release,
    )
}

fn three_segment(len: usize, attack: f32, decay: f32, sustain: f32, release: f32) -> Result<Envelope> {
    let attack = check_fraction("attack", attack)?;
    let decay = check_fraction("decay", decay)?;
    let release = check_fraction("release", release)?;
    if !sustain.is_finite() {
        return Err(SynthError::parameter("sustain", "must be finite"));
    }
    let sustain = sustain.clamp(0.0, 1.0) as f64;

    let total = attack + decay + release;
    if total <= 0.0 {
        return Err(SynthError::parameter(
            "attack",
            "attack, decay and release fractions sum to zero",
        ));
    }

    let attack_len = (len as f64 * attack / total).floor() as usize;
    let decay_len = (len as f64 * decay / total).floor() as usize;
    let release_len = len.saturating_sub(attack_len + decay_len);

    let mut gains: Vec<f32> = linspace(0.0, 1.0, attack_len.max(1))
        .chain(linspace(1.0, sustain, decay_len.max(1)))
        .chain(linspace(sustain, 0.0, release_len.max(1)))
        .map(|g| g as f32)
        .collect();
    gains.resize(len, 0.0);
    Ok(Envelope::from_gains(gains))
}

/// Linear fade-in over the first `fade_in_ms` and fade-out over the last `fade_out_ms`
///
/// A side whose ramp would be empty or cover the whole signal is left untouched.
pub fn apply_fade(signal: &Signal, fade_in_ms: f32, fade_out_ms: f32) -> Signal {
    let len = signal.len();
    let fade_in = ms_to_samples(fade_in_ms, signal.sample_rate());
    let fade_out = ms_to_samples(fade_out_ms, signal.sample_rate());

    let mut samples = signal.samples().to_vec();
    if fade_in > 0 && fade_in < len {
        for (sample, gain) in samples.iter_mut().zip(linspace(0.0, 1.0, fade_in)) {
            *sample *= gain as f32;
        }
    }
    if fade_out > 0 && fade_out < len {
        for (sample, gain) in samples[len - fade_out..]
            .iter_mut()
            .zip(linspace(1.0, 0.0, fade_out))
        {
            *sample *= gain as f32;
        }
    }
    Signal::from_samples(signal.sample_rate(), samples)
}

/// Evaluate `f(t, u)` at every sample, `t` in seconds and `u` in 0..1
fn curve(len: usize, sample_rate: u32, f: impl Fn(f64, f64) -> f64) -> Envelope {
    let rate = sample_rate as f64;
    Envelope::from_gains(
        (0..len)
            .map(|i| f(i as f64 / rate, i as f64 / len as f64) as f32)
            .collect(),
    )
}

/// Analytic gain curves
///
/// `t` is time in seconds and `u` the normalized position in 0..1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvelopeShape {
    /// `e^(-rate·t)`
    Exponential { rate: f32 },
    /// `1 - e^(-rate·t)`, a soft onset
    Attack { rate: f32 },
    /// `sin(π·u)^power`, rises and falls back
    Arch { power: f32 },
    /// `1 - u^power`
    RampDown { power: f32 },
    /// `1 - |2u - 1|`
    Triangle,
    /// `1 - depth + depth·sin(2π·rate·t)`
    Tremolo { rate: f32, depth: f32 },
    /// Flat, then a linear release over the final `seconds`
    Tail { seconds: f32 },
    /// Three-segment curve from [`build_envelope`]
    Adr {
        attack: f32,
        decay: f32,
        sustain: f32,
        release: f32,
    },
    /// Square-root onset over `attack` seconds, then `e^(-x)` with x running 0..`span`
    Swell { attack: f32, span: f32 },
}

impl EnvelopeShape {
    /// Render the shape over `len` samples
    pub fn render(&self, len: usize, sample_rate: u32) -> Result<Envelope> {
        let envelope = match *self {
            EnvelopeShape::Exponential { rate } => {
                curve(len, sample_rate, |t, _| (-(rate as f64) * t).exp())
            }
            EnvelopeShape::Attack { rate } => {
                curve(len, sample_rate, |t, _| 1.0 - (-(rate as f64) * t).exp())
            }
            EnvelopeShape::Arch { power } => curve(len, sample_rate, |_, u| {
                (PI * u).sin().max(0.0).powf(power as f64)
            }),
            EnvelopeShape::RampDown { power } => {
                curve(len, sample_rate, |_, u| 1.0 - u.powf(power as f64))
            }
            EnvelopeShape::Triangle => curve(len, sample_rate, |_, u| 1.0 - (2.0 * u - 1.0).abs()),
            EnvelopeShape::Tremolo { rate, depth } => {
                let depth = depth as f64;
                curve(len, sample_rate, |t, _| {
                    1.0 - depth + depth * (TAU * rate as f64 * t).sin()
                })
            }
            EnvelopeShape::Tail { seconds } => {
                let tail = sample_count(seconds, sample_rate).min(len);
                let mut gains = vec![1.0f32; len - tail];
                gains.extend(linspace(1.0, 0.0, tail).map(|g| g as f32));
                Envelope::from_gains(gains)
            }
            EnvelopeShape::Adr {
                attack,
                decay,
                sustain,
                release,
            } => three_segment(len, attack, decay, sustain, release)?,
            EnvelopeShape::Swell { attack, span } => {
                let onset = sample_count(attack, sample_rate).min(len);
                let mut gains: Vec<f32> = linspace(0.0, 1.0, onset)
                    .map(|g| g.sqrt() as f32)
                    .collect();
                gains.extend(linspace(0.0, span as f64, len - onset).map(|x| (-x).exp() as f32));
                Envelope::from_gains(gains)
            }
        };
        Ok(envelope)
    }
}

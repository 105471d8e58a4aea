//! Audio oscillators and waveform generators
//!
//! Fixed-frequency tones are evaluated directly from time. Anything whose pitch
//! moves is generated from an integrated phase: the instantaneous frequency is
//! accumulated sample by sample and divided by the sample rate, so the waveform
//! stays continuous however fast the pitch changes.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::signal::{sample_count, Signal};

/// Waveform types for audio synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    /// Pure sine wave - smooth, fundamental tone
    #[default]
    Sine,
    /// Square wave - hollow, buzzy sound (odd harmonics)
    Square,
    /// Sawtooth wave - bright sound (all harmonics)
    Saw,
    /// Triangle wave - softer than square (odd harmonics, quieter)
    Triangle,
}

impl Waveform {
    /// Evaluate the waveform at `phase` radians
    pub fn at(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Square => {
                let s = phase.sin();
                if s > 0.0 {
                    1.0
                } else if s < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Waveform::Saw => {
                let t = (phase / TAU).rem_euclid(1.0);
                2.0 * t - 1.0
            }
            Waveform::Triangle => {
                let t = (phase / TAU).rem_euclid(1.0);
                4.0 * (t - 0.5).abs() - 1.0
            }
        }
    }
}

/// Generate a pure sinusoid: `sin(2π·freq·t + phase)`
///
/// # Arguments
/// * `frequency` - Frequency in Hz
/// * `duration` - Duration in seconds
/// * `phase` - Starting phase in radians
/// * `sample_rate` - Sample rate in Hz
pub fn tone(frequency: f32, duration: f32, phase: f32, sample_rate: u32) -> Signal {
    let omega = TAU * frequency as f64 / sample_rate as f64;
    Signal::from_fn(sample_count(duration, sample_rate), sample_rate, |i| {
        (omega * i as f64 + phase as f64).sin() as f32
    })
}

/// Generate oscillator samples for a given waveform at a fixed frequency
pub fn oscillator(waveform: Waveform, frequency: f32, duration: f32, sample_rate: u32) -> Signal {
    let omega = TAU * frequency as f64 / sample_rate as f64;
    Signal::from_fn(sample_count(duration, sample_rate), sample_rate, |i| {
        waveform.at(omega * i as f64) as f32
    })
}

/// Two-operator FM: `sin(2π·carrier·t + index·sin(2π·modulator·t))`
///
/// # Arguments
/// * `carrier` - Carrier frequency in Hz
/// * `modulator` - Modulator frequency in Hz
/// * `index` - Modulation index (higher = more sidebands)
/// * `duration` - Duration in seconds
/// * `sample_rate` - Sample rate in Hz
pub fn fm_synthesize(
    carrier: f32,
    modulator: f32,
    index: f32,
    duration: f32,
    sample_rate: u32,
) -> Signal {
    let rate = sample_rate as f64;
    Signal::from_fn(sample_count(duration, sample_rate), sample_rate, |i| {
        let t = i as f64 / rate;
        let modulation = index as f64 * (TAU * modulator as f64 * t).sin();
        (TAU * carrier as f64 * t + modulation).sin() as f32
    })
}

/// Instantaneous frequency over the life of a swept tone
///
/// `t` is elapsed time in seconds and `u = t / duration` the normalized position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrequencyPath {
    /// Fixed pitch
    Constant { freq: f32 },
    /// `from + (to - from)·u`
    Linear { from: f32, to: f32 },
    /// `from + (to - from)·u^exponent`
    Power { from: f32, to: f32, exponent: f32 },
    /// `from·e^(-rate·t)`
    Decay { from: f32, rate: f32 },
    /// `from + (to - from)·(1 - e^(-rate·t))`
    Approach { from: f32, to: f32, rate: f32 },
    /// `center + depth·sin(2π·rate·t)`
    Vibrato { center: f32, depth: f32, rate: f32 },
    /// Piecewise-linear `[u, freq]` points, held flat outside the first/last point
    Breakpoints { points: Vec<[f32; 2]> },
}

impl FrequencyPath {
    /// Frequency in Hz at `t` seconds into a tone lasting `duration` seconds
    pub fn frequency_at(&self, t: f64, duration: f64) -> f64 {
        let u = if duration > 0.0 { t / duration } else { 0.0 };
        match *self {
            FrequencyPath::Constant { freq } => freq as f64,
            FrequencyPath::Linear { from, to } => from as f64 + (to - from) as f64 * u,
            FrequencyPath::Power { from, to, exponent } => {
                from as f64 + (to - from) as f64 * u.max(0.0).powf(exponent as f64)
            }
            FrequencyPath::Decay { from, rate } => from as f64 * (-(rate as f64) * t).exp(),
            FrequencyPath::Approach { from, to, rate } => {
                from as f64 + (to - from) as f64 * (1.0 - (-(rate as f64) * t).exp())
            }
            FrequencyPath::Vibrato {
                center,
                depth,
                rate,
            } => center as f64 + depth as f64 * (TAU * rate as f64 * t).sin(),
            FrequencyPath::Breakpoints { ref points } => breakpoint_at(points, u),
        }
    }

    /// Sample the path once per sample over `len` samples
    pub fn render(&self, len: usize, sample_rate: u32) -> Vec<f64> {
        let rate = sample_rate as f64;
        let duration = len as f64 / rate;
        (0..len)
            .map(|i| self.frequency_at(i as f64 / rate, duration))
            .collect()
    }
}

fn breakpoint_at(points: &[[f32; 2]], u: f64) -> f64 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    if u <= first[0] as f64 {
        return first[1] as f64;
    }
    for pair in points.windows(2) {
        let (u0, f0) = (pair[0][0] as f64, pair[0][1] as f64);
        let (u1, f1) = (pair[1][0] as f64, pair[1][1] as f64);
        if u <= u1 {
            if u1 <= u0 {
                return f1;
            }
            return f0 + (f1 - f0) * (u - u0) / (u1 - u0);
        }
    }
    points[points.len() - 1][1] as f64
}

/// Running phase (radians) of a tone with the given per-sample frequencies.
///
/// `phase[i] = 2π · Σ_{k ≤ i} freq[k] / sample_rate`
pub fn integrate_phase(frequencies: &[f64], sample_rate: u32) -> Vec<f64> {
    let rate = sample_rate as f64;
    let mut cycles = 0.0f64;
    frequencies
        .iter()
        .map(|&f| {
            cycles += f / rate;
            TAU * cycles
        })
        .collect()
}

/// One partial of a swept or sequenced tone: `gain · sin(multiple · phase)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    pub multiple: f32,
    pub gain: f32,
}

impl Harmonic {
    pub const FUNDAMENTAL: Harmonic = Harmonic {
        multiple: 1.0,
        gain: 1.0,
    };

    pub fn new(multiple: f32, gain: f32) -> Self {
        Self { multiple, gain }
    }
}

fn sum_harmonics(waveform: Waveform, phase: f64, harmonics: &[Harmonic]) -> f64 {
    if harmonics.is_empty() {
        return waveform.at(phase);
    }
    harmonics
        .iter()
        .map(|h| h.gain as f64 * waveform.at(h.multiple as f64 * phase))
        .sum()
}

/// Generate a tone whose pitch follows `path`
///
/// The phase is integrated from the instantaneous frequency, never computed as
/// `sin(2π·f(t)·t)`. An empty harmonic list means the bare fundamental.
pub fn sweep(
    waveform: Waveform,
    path: &FrequencyPath,
    harmonics: &[Harmonic],
    duration: f32,
    sample_rate: u32,
) -> Signal {
    let len = sample_count(duration, sample_rate);
    let phase = integrate_phase(&path.render(len, sample_rate), sample_rate);
    Signal::from_samples(
        sample_rate,
        phase
            .iter()
            .map(|&p| sum_harmonics(waveform, p, harmonics) as f32)
            .collect(),
    )
}

/// A single note in a sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Frequency in Hz
    pub freq: f32,
    /// Duration in seconds
    pub duration: f32,
}

/// Concatenate short decaying sine notes (arpeggios, jingles)
///
/// Each note restarts at zero phase and decays as `e^(-decay·t)` over its own
/// duration.
pub fn note_sequence(notes: &[Note], harmonics: &[Harmonic], decay: f32, sample_rate: u32) -> Signal {
    let rate = sample_rate as f64;
    let mut samples = Vec::new();
    for note in notes {
        let omega = TAU * note.freq as f64 / rate;
        let len = sample_count(note.duration, sample_rate);
        samples.extend((0..len).map(|i| {
            let t = i as f64 / rate;
            let level = (-(decay as f64) * t).exp();
            (sum_harmonics(Waveform::Sine, omega * i as f64, harmonics) * level) as f32
        }));
    }
    Signal::from_samples(sample_rate, samples)
}

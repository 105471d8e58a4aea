//! Declarative effect recipes
//!
//! A [`Recipe`] is a named list of layers. Each layer renders a [`Source`] and runs it
//! through a fixed chain:
//!
//! ```text
//! source -> filters -> sweep filter -> modulator -> effects -> envelopes -> gain
//! ```
//!
//! Layers are mixed at their start offsets to the recipe duration, post effects run
//! on the mix, and [`finalize`] fades both ends and normalizes to the recipe peak.
//!
//! Recipes deserialize from TOML, see `catalog/effects.toml`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effects::{bitcrush, comb_reverb, distort};
use crate::envelope::EnvelopeShape;
use crate::error::{Result, SynthError};
use crate::filters::{self, FilterSpec, SweepFilter};
use crate::mix::{finalize, mix_at, Finish, Layer};
use crate::noise::{self, white_samples, NoiseColor};
use crate::oscillators::{
    fm_synthesize, note_sequence, oscillator, sweep, tone, FrequencyPath, Harmonic, Note,
    Waveform,
};
use crate::signal::{sample_count, Signal};
use crate::DEFAULT_PEAK;

fn default_peak() -> f32 {
    DEFAULT_PEAK
}

fn default_fade_in_ms() -> f32 {
    Finish::default().fade_in_ms
}

fn default_fade_out_ms() -> f32 {
    Finish::default().fade_out_ms
}

fn default_gain() -> f32 {
    1.0
}

/// A complete sound effect description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Output length in seconds
    pub duration: f32,
    /// Output ceiling after normalization
    #[serde(default = "default_peak")]
    pub peak: f32,
    #[serde(default = "default_fade_in_ms")]
    pub fade_in_ms: f32,
    #[serde(default = "default_fade_out_ms")]
    pub fade_out_ms: f32,
    /// Effects applied to the mixed layers, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<Effect>,
    #[serde(default, rename = "layer")]
    pub layers: Vec<LayerRecipe>,
}

/// One signal path of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecipe {
    pub source: Source,
    /// Start offset in seconds
    #[serde(default)]
    pub start: f32,
    /// Layer length in seconds; runs to the end of the recipe when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,
    /// Time-varying band-pass applied after the static filters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepFilter>,
    /// Layer multiplied into this one sample by sample (ring modulation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulator: Option<Box<LayerRecipe>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envelopes: Vec<EnvelopeShape>,
}

impl LayerRecipe {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            start: 0.0,
            duration: None,
            gain: default_gain(),
            filters: Vec::new(),
            sweep: None,
            modulator: None,
            effects: Vec::new(),
            envelopes: Vec::new(),
        }
    }
}

/// Raw material of a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    Noise {
        color: NoiseColor,
    },
    /// Sine at a fixed pitch
    Tone {
        freq: f32,
        #[serde(default)]
        phase: f32,
    },
    Wave {
        waveform: Waveform,
        freq: f32,
    },
    Fm {
        carrier: f32,
        modulator: f32,
        index: f32,
    },
    /// Pitch glide with integrated phase
    Sweep {
        path: FrequencyPath,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        harmonics: Vec<Harmonic>,
        #[serde(default)]
        waveform: Waveform,
    },
    /// Back-to-back decaying notes, zero-padded to the layer length
    Notes {
        notes: Vec<Note>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        harmonics: Vec<Harmonic>,
        decay: f32,
    },
    /// Randomly placed short grains
    Bursts(Bursts),
    Silence,
}

impl Source {
    pub fn kind(&self) -> &'static str {
        match self {
            Source::Noise { .. } => "noise",
            Source::Tone { .. } => "tone",
            Source::Wave { .. } => "wave",
            Source::Fm { .. } => "fm",
            Source::Sweep { .. } => "sweep",
            Source::Notes { .. } => "notes",
            Source::Bursts(_) => "bursts",
            Source::Silence => "silence",
        }
    }

    /// Render exactly `len` samples
    pub fn render<R: Rng + ?Sized>(&self, len: usize, rng: &mut R, sample_rate: u32) -> Result<Signal> {
        let duration = len as f32 / sample_rate as f32;
        let signal = match self {
            Source::Noise { color } => noise::noise(duration, *color, rng, sample_rate),
            Source::Tone { freq, phase } => tone(*freq, duration, *phase, sample_rate),
            Source::Wave { waveform, freq } => oscillator(*waveform, *freq, duration, sample_rate),
            Source::Fm {
                carrier,
                modulator,
                index,
            } => fm_synthesize(*carrier, *modulator, *index, duration, sample_rate),
            Source::Sweep {
                path,
                harmonics,
                waveform,
            } => sweep(*waveform, path, harmonics, duration, sample_rate),
            Source::Notes {
                notes,
                harmonics,
                decay,
            } => note_sequence(notes, harmonics, *decay, sample_rate),
            Source::Bursts(bursts) => bursts.render(len, rng, sample_rate)?,
            Source::Silence => Signal::silence(len, sample_rate),
        };
        Ok(signal.resized(len))
    }
}

/// How burst grains are spread over their window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Placement {
    /// Uniformly random start times
    #[default]
    Random,
    /// Evenly spaced starts, each nudged by up to `jitter` seconds either way
    Even { jitter: f32 },
}

fn default_amplitude() -> [f32; 2] {
    [1.0, 1.0]
}

/// Short decaying grains: pops, crackles, bubbles
///
/// Ranges are `[min, max]` pairs sampled uniformly per grain. Grains are white noise
/// unless `tone` gives a sine frequency range. Each grain decays as `e^(-x)` with x
/// running from 0 to `decay` over its length; grains past the end are cut off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bursts {
    pub count: u32,
    /// Grain start range in seconds, relative to the layer
    pub window: [f32; 2],
    /// Grain length range in seconds
    pub length: [f32; 2],
    #[serde(default = "default_amplitude")]
    pub amplitude: [f32; 2],
    pub decay: f32,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<[f32; 2]>,
    /// Filter run on each grain before the decay is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, [lo, hi]: [f32; 2]) -> f32 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

fn check_range(name: &'static str, [lo, hi]: [f32; 2]) -> Result<()> {
    if lo.is_finite() && hi.is_finite() && (hi - lo).is_finite() {
        Ok(())
    } else {
        Err(SynthError::parameter(
            name,
            format!("[{lo}, {hi}] must be a finite range"),
        ))
    }
}

impl Bursts {
    /// Reject ranges that cannot be sampled
    pub fn validate(&self) -> Result<()> {
        check_range("window", self.window)?;
        check_range("length", self.length)?;
        check_range("amplitude", self.amplitude)?;
        if let Some(tone) = self.tone {
            check_range("tone", tone)?;
        }
        if let Placement::Even { jitter } = self.placement {
            check_range("jitter", [-jitter, jitter])?;
        }
        Ok(())
    }

    pub fn render<R: Rng + ?Sized>(&self, len: usize, rng: &mut R, sample_rate: u32) -> Result<Signal> {
        self.validate()?;
        let mut out = vec![0.0f32; len];
        for i in 0..self.count {
            let start = match self.placement {
                Placement::Random => uniform(rng, self.window),
                Placement::Even { jitter } => {
                    let [lo, hi] = self.window;
                    lo + (hi - lo) * i as f32 / self.count as f32 + uniform(rng, [-jitter, jitter])
                }
            };
            let offset = sample_count(start.max(0.0), sample_rate);
            let grain_len = sample_count(uniform(rng, self.length), sample_rate).max(1);
            let amplitude = uniform(rng, self.amplitude);

            let mut grain = match self.tone {
                Some(range) => {
                    let freq = uniform(rng, range);
                    tone(freq, grain_len as f32 / sample_rate as f32, 0.0, sample_rate)
                        .resized(grain_len)
                }
                None => Signal::from_samples(sample_rate, white_samples(grain_len, rng)),
            };
            if let Some(spec) = &self.filter {
                grain = filters::apply(&grain, spec)?;
            }

            let step = if grain_len > 1 {
                self.decay / (grain_len - 1) as f32
            } else {
                0.0
            };
            if offset >= len {
                continue;
            }
            for (k, (dst, &src)) in out[offset..].iter_mut().zip(grain.samples()).enumerate() {
                *dst += src * (-(step * k as f32)).exp() * amplitude;
            }
        }
        Ok(Signal::from_samples(sample_rate, out))
    }
}

/// Time-domain effect step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Distort { amount: f32 },
    Bitcrush { bits: u32 },
    Reverb { decay: f32, delay_ms: f32 },
}

impl Effect {
    pub fn apply(&self, signal: &Signal) -> Result<Signal> {
        match *self {
            Effect::Distort { amount } => distort(signal, amount),
            Effect::Bitcrush { bits } => bitcrush(signal, bits),
            Effect::Reverb { decay, delay_ms } => comb_reverb(signal, decay, delay_ms),
        }
    }
}

impl LayerRecipe {
    fn validate(&self, recipe: &str) -> Result<()> {
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(SynthError::parameter(
                "start",
                format!("{recipe}: layer start {} must be >= 0", self.start),
            ));
        }
        if let Source::Bursts(bursts) = &self.source {
            bursts.validate()?;
        }
        match &self.modulator {
            Some(modulator) => modulator.validate(recipe),
            None => Ok(()),
        }
    }

    /// Render this layer given the number of samples left after its start offset
    fn render<R: Rng + ?Sized>(&self, available: usize, rng: &mut R, sample_rate: u32) -> Result<Signal> {
        let len = match self.duration {
            Some(duration) => sample_count(duration, sample_rate),
            None => available,
        };

        let mut signal = self.source.render(len, rng, sample_rate)?;
        for spec in &self.filters {
            signal = filters::apply(&signal, spec)?;
        }
        if let Some(sweep) = &self.sweep {
            signal = filters::sweep_bandpass(&signal, sweep)?;
        }
        if let Some(modulator) = &self.modulator {
            let carrier = modulator.render(len, rng, sample_rate)?;
            signal = Signal::from_fn(len, sample_rate, |i| {
                signal.samples()[i] * carrier.samples().get(i).copied().unwrap_or(0.0)
            });
        }
        for effect in &self.effects {
            signal = effect.apply(&signal)?;
        }
        for shape in &self.envelopes {
            signal = shape.render(len, sample_rate)?.apply(&signal);
        }
        Ok(signal)
    }
}

impl Recipe {
    /// Check the recipe-level parameters that cannot be clamped
    pub fn validate(&self) -> Result<()> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SynthError::parameter(
                "duration",
                format!("{}: {} must be a positive number of seconds", self.name, self.duration),
            ));
        }
        if !(self.peak > 0.0 && self.peak <= 1.0) {
            return Err(SynthError::parameter(
                "peak",
                format!("{}: {} is outside (0, 1]", self.name, self.peak),
            ));
        }
        if self.layers.is_empty() {
            return Err(SynthError::parameter(
                "layer",
                format!("{} has no layers", self.name),
            ));
        }
        for layer in &self.layers {
            layer.validate(&self.name)?;
        }
        Ok(())
    }

    pub fn finish(&self) -> Finish {
        Finish {
            fade_in_ms: self.fade_in_ms,
            fade_out_ms: self.fade_out_ms,
            peak: self.peak,
        }
    }

    /// Number of samples this recipe renders to
    pub fn len(&self, sample_rate: u32) -> usize {
        sample_count(self.duration, sample_rate)
    }

    /// Render the finished effect
    ///
    /// Layers draw from `rng` in declaration order, so a fixed seed always renders
    /// the same buffer.
    pub fn render<R: Rng + ?Sized>(&self, rng: &mut R, sample_rate: u32) -> Result<Signal> {
        self.validate()?;
        let total = self.len(sample_rate);

        let mut rendered = Vec::with_capacity(self.layers.len());
        for (index, layer) in self.layers.iter().enumerate() {
            let offset = sample_count(layer.start, sample_rate);
            debug!(
                recipe = %self.name,
                layer = index,
                source = layer.source.kind(),
                offset,
                "rendering layer"
            );
            let signal = layer.render(total.saturating_sub(offset), rng, sample_rate)?;
            rendered.push((signal, layer.gain, offset));
        }

        let placed: Vec<Layer> = rendered
            .iter()
            .map(|(signal, gain, offset)| Layer::new(signal, *gain).at(*offset))
            .collect();
        let mut mixed = mix_at(&placed, total)?;
        for effect in &self.post {
            mixed = effect.apply(&mixed)?;
        }
        Ok(finalize(&mixed, &self.finish()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SAMPLE_RATE;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    fn recipe(layers: Vec<LayerRecipe>) -> Recipe {
        Recipe {
            name: "test".into(),
            category: "test".into(),
            description: String::new(),
            duration: 0.1,
            peak: 0.8,
            fade_in_ms: 5.0,
            fade_out_ms: 20.0,
            post: Vec::new(),
            layers,
        }
    }

    #[test]
    fn test_render_length_and_peak() {
        let mut layer = LayerRecipe::new(Source::Noise {
            color: NoiseColor::Pink,
        });
        layer.filters.push(FilterSpec::bandpass(200.0, 2000.0));
        layer.envelopes.push(EnvelopeShape::Exponential { rate: 30.0 });

        let out = recipe(vec![layer])
            .render(&mut Pcg64Mcg::seed_from_u64(1), SAMPLE_RATE)
            .unwrap();
        assert_eq!(out.len(), 4410);
        assert!((out.peak() - 0.8).abs() < 1e-5);
        assert_eq!(out.samples()[0], 0.0);
        assert_eq!(*out.samples().last().unwrap(), 0.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let r = recipe(vec![LayerRecipe::new(Source::Noise {
            color: NoiseColor::Brown,
        })]);
        let a = r.render(&mut Pcg64Mcg::seed_from_u64(9), SAMPLE_RATE).unwrap();
        let b = r.render(&mut Pcg64Mcg::seed_from_u64(9), SAMPLE_RATE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_layer_offset_and_duration() {
        let mut late = LayerRecipe::new(Source::Tone {
            freq: 440.0,
            phase: std::f32::consts::FRAC_PI_2,
        });
        late.start = 0.05;
        late.duration = Some(0.01);
        let mut r = recipe(vec![late]);
        r.fade_in_ms = 0.0;
        r.fade_out_ms = 0.0;

        let out = r.render(&mut Pcg64Mcg::seed_from_u64(0), SAMPLE_RATE).unwrap();
        assert_eq!(out.len(), 4410);
        assert!(out.samples()[..2205].iter().all(|&s| s == 0.0));
        assert!(out.samples()[2205] > 0.7);
        assert!(out.samples()[2205 + 441..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_modulator_multiplies() {
        let mut layer = LayerRecipe::new(Source::Wave {
            waveform: Waveform::Square,
            freq: 100.0,
        });
        layer.modulator = Some(Box::new(LayerRecipe::new(Source::Silence)));
        let rendered = layer
            .render(1000, &mut Pcg64Mcg::seed_from_u64(0), SAMPLE_RATE)
            .unwrap();
        assert!(rendered.is_silent());
    }

    #[test]
    fn test_silent_recipe_stays_silent() {
        let out = recipe(vec![LayerRecipe::new(Source::Silence)])
            .render(&mut Pcg64Mcg::seed_from_u64(0), SAMPLE_RATE)
            .unwrap();
        assert_eq!(out.len(), 4410);
        assert!(out.is_silent());
    }

    #[test]
    fn test_bursts_stay_in_window() {
        let bursts = Bursts {
            count: 12,
            window: [0.01, 0.02],
            length: [0.001, 0.002],
            amplitude: [0.5, 1.0],
            decay: 5.0,
            placement: Placement::Random,
            tone: None,
            filter: None,
        };
        let out = bursts
            .render(4410, &mut Pcg64Mcg::seed_from_u64(4), SAMPLE_RATE)
            .unwrap();
        assert_eq!(out.len(), 4410);
        assert!(out.samples()[..441].iter().all(|&s| s == 0.0));
        assert!(out.samples()[1000..].iter().all(|&s| s == 0.0));
        assert!(!out.is_silent());
    }

    #[test]
    fn test_bursts_past_end_are_cut() {
        let bursts = Bursts {
            count: 4,
            window: [0.0, 1.0],
            length: [0.5, 0.5],
            amplitude: [1.0, 1.0],
            decay: 1.0,
            placement: Placement::Even { jitter: 0.0 },
            tone: Some([300.0, 600.0]),
            filter: Some(FilterSpec::highpass(100.0)),
        };
        let out = bursts
            .render(441, &mut Pcg64Mcg::seed_from_u64(4), SAMPLE_RATE)
            .unwrap();
        assert_eq!(out.len(), 441);
    }

    #[test]
    fn test_bursts_reject_infinite_ranges() {
        let good = Bursts {
            count: 3,
            window: [0.0, 0.05],
            length: [0.001, 0.002],
            amplitude: [1.0, 1.0],
            decay: 2.0,
            placement: Placement::Random,
            tone: None,
            filter: None,
        };
        let mut rng = Pcg64Mcg::seed_from_u64(0);
        assert!(good.render(4410, &mut rng, SAMPLE_RATE).is_ok());

        let bad = [
            Bursts {
                window: [0.0, f32::INFINITY],
                ..good.clone()
            },
            Bursts {
                length: [f32::NAN, 0.1],
                ..good.clone()
            },
            Bursts {
                amplitude: [-f32::MAX, f32::MAX],
                ..good.clone()
            },
            Bursts {
                tone: Some([200.0, f32::INFINITY]),
                ..good.clone()
            },
            Bursts {
                placement: Placement::Even {
                    jitter: f32::INFINITY,
                },
                ..good.clone()
            },
        ];
        for bursts in bad {
            assert!(
                matches!(
                    bursts.render(4410, &mut rng, SAMPLE_RATE),
                    Err(SynthError::InvalidParameter { .. })
                ),
                "{bursts:?}"
            );

            // caught before rendering, including inside a modulator
            let mut layer = LayerRecipe::new(Source::Silence);
            layer.modulator = Some(Box::new(LayerRecipe::new(Source::Bursts(bursts))));
            assert!(recipe(vec![layer]).validate().is_err());
        }
    }

    #[test]
    fn test_post_reverb_rejects_unstable() {
        let mut r = recipe(vec![LayerRecipe::new(Source::Tone {
            freq: 440.0,
            phase: 0.0,
        })]);
        r.post.push(Effect::Reverb {
            decay: 1.2,
            delay_ms: 30.0,
        });
        assert!(matches!(
            r.render(&mut Pcg64Mcg::seed_from_u64(0), SAMPLE_RATE),
            Err(SynthError::UnstableFeedback { .. })
        ));
    }

    #[test]
    fn test_validate() {
        let mut r = recipe(vec![LayerRecipe::new(Source::Silence)]);
        assert!(r.validate().is_ok());
        r.duration = 0.0;
        assert!(r.validate().is_err());
        r.duration = 0.1;
        r.peak = 1.5;
        assert!(r.validate().is_err());
        r.peak = 0.5;
        r.layers.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_parse_recipe_toml() {
        let text = r#"
name = "zap"
duration = 0.2
fade_in_ms = 1.0
post = [{ type = "bitcrush", bits = 6 }]

[[layer]]
source = { type = "sweep", path = { type = "linear", from = 200.0, to = 800.0 } }
gain = 0.6
envelopes = [{ type = "exponential", rate = 8.0 }, { type = "attack", rate = 100.0 }]

[[layer]]
source = { type = "noise", color = "pink" }
filters = [{ type = "bandpass", low = 300.0, high = 1500.0 }]
"#;
        let r: Recipe = toml::from_str(text).unwrap();
        assert_eq!(r.name, "zap");
        assert_eq!(r.peak, DEFAULT_PEAK);
        assert_eq!(r.fade_in_ms, 1.0);
        assert_eq!(r.fade_out_ms, 50.0);
        assert_eq!(r.layers.len(), 2);
        assert_eq!(r.layers[1].gain, 1.0);
        assert_eq!(r.post, vec![Effect::Bitcrush { bits: 6 }]);
        assert!(matches!(r.layers[0].source, Source::Sweep { .. }));

        let out = r.render(&mut Pcg64Mcg::seed_from_u64(2), SAMPLE_RATE).unwrap();
        assert_eq!(out.len(), 8820);
    }
}

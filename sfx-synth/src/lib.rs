//! Procedural sound effect synthesis
//!
//! Builds short game sound effects from scratch: colored noise, tonal and FM
//! oscillators, zero-phase Butterworth filters, envelopes, time-domain effects and a
//! compositor that mixes layers into a faded, normalized buffer. Effects are
//! described declaratively as [`Recipe`]s; the crate ships a built-in [`Catalog`].
//!
//! Every transform borrows its input [`Signal`] and returns a new one. Randomness
//! always comes from a caller-supplied [`rand::Rng`], so a fixed seed reproduces a
//! buffer exactly.
//!
//! # Example
//! ```no_run
//! use rand::SeedableRng;
//! use rand_pcg::Pcg64Mcg;
//! use sfx_synth::*;
//!
//! // Render a built-in effect
//! let catalog = Catalog::builtin()?;
//! let mut rng = Pcg64Mcg::seed_from_u64(7);
//! let hit = catalog.get("sword_hit")?.render(&mut rng, SAMPLE_RATE)?;
//!
//! // Or assemble one by hand
//! let ring = tone(1200.0, 0.25, 0.0, SAMPLE_RATE);
//! let thud = apply(
//!     &noise(0.25, NoiseColor::Brown, &mut rng, SAMPLE_RATE),
//!     &FilterSpec::lowpass(400.0),
//! )?;
//! let mixed = mix(&[(&ring, 0.4), (&thud, 0.6)], ring.len())?;
//! let out = finalize(&mixed, &Finish::default());
//!
//! // Export to WAV (requires wav-export feature)
//! #[cfg(feature = "wav-export")]
//! write_wav(&out, std::path::Path::new("sword_hit.wav"))?;
//! # Ok::<(), SynthError>(())
//! ```

mod catalog;
mod effects;
mod envelope;
mod error;
mod filters;
mod mix;
mod noise;
mod oscillators;
mod recipe;
mod signal;

#[cfg(feature = "wav-export")]
mod export;

/// Output sample rate (44.1kHz)
pub const SAMPLE_RATE: u32 = 44_100;

/// Default output ceiling after normalization
pub const DEFAULT_PEAK: f32 = 0.9;

// Core buffer and errors
pub use error::{Result, SynthError};
pub use signal::{ms_to_samples, sample_count, to_pcm_i16, Signal};

// Generators
pub use noise::{noise, white_samples, NoiseColor, BROWN_NOISE_DIVISOR};
pub use oscillators::{
    fm_synthesize, integrate_phase, note_sequence, oscillator, sweep, tone, FrequencyPath,
    Harmonic, Note, Waveform,
};

// Filters
pub use filters::{
    apply, sweep_bandpass, Biquad, Butterworth, FilterKind, FilterSpec, SweepFilter,
    DEFAULT_ORDER, DEFAULT_SWEEP_BLOCK, MAX_FILTER_ORDER, MAX_NORMALIZED_CUTOFF,
};

// Envelopes, effects and mixing
pub use effects::{bitcrush, comb_reverb, distort, MAX_BITS};
pub use envelope::{apply_fade, build_envelope, Envelope, EnvelopeShape};
pub use mix::{finalize, mix, mix_at, normalize, Finish, Layer};

// Recipes
pub use catalog::Catalog;
pub use recipe::{Bursts, Effect, LayerRecipe, Placement, Recipe, Source};

#[cfg(feature = "wav-export")]
pub use export::{from_pcm_i16, read_wav, write_wav};

//! sfx-gen library - batch rendering of procedural sound effects
//!
//! Wraps the `sfx-synth` recipe catalog with catalog loading and a parallel batch
//! driver that writes one WAV file per effect.

pub mod batch;

use anyhow::{Context, Result};
use sfx_synth::Catalog;
use std::path::Path;

pub use batch::{effect_seed, generate, render_effect, BatchOptions, BatchReport};

/// Built-in catalog, optionally overlaid with a user catalog file
pub fn load_catalog(user: Option<&Path>) -> Result<Catalog> {
    let mut catalog = Catalog::builtin().context("Failed to parse built-in catalog")?;
    if let Some(path) = user {
        let extra = Catalog::load(path)
            .with_context(|| format!("Failed to load catalog: {}", path.display()))?;
        tracing::info!("Loaded {} recipes from {}", extra.len(), path.display());
        catalog.merge(extra);
    }
    Ok(catalog)
}

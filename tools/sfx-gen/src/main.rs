//! sfx-gen - Procedural sound effect generator
//!
//! Renders recipes from the built-in catalog (optionally extended with a user
//! catalog) to mono 16-bit WAV files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sfx_gen::{generate, load_catalog, BatchOptions};

#[derive(Parser)]
#[command(name = "sfx-gen")]
#[command(about = "Generate procedural game sound effects")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available sounds by category
    List {
        /// Extra recipe catalog (TOML) merged over the built-ins
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Render sounds to WAV files
    Generate {
        /// Sounds to generate (all when omitted)
        names: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = "generated")]
        output: PathBuf,

        /// Batch random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Extra recipe catalog (TOML) merged over the built-ins
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = sfx_synth::SAMPLE_RATE)]
        sample_rate: u32,

        /// Worker threads (defaults to one per core)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Print a recipe as TOML
    Show {
        /// Sound name
        name: String,

        /// Extra recipe catalog (TOML) merged over the built-ins
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            println!("Available sounds:");
            for (category, recipes) in catalog.by_category() {
                println!("\n  {}:", category);
                for recipe in recipes {
                    println!("    - {:<18} {}", recipe.name, recipe.description);
                }
            }
        }

        Commands::Generate {
            names,
            output,
            seed,
            catalog,
            sample_rate,
            jobs,
        } => {
            if let Some(jobs) = jobs {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build_global()
                    .context("Failed to configure worker threads")?;
            }

            let catalog = load_catalog(catalog.as_deref())?;
            let options = BatchOptions {
                output_dir: output,
                seed,
                sample_rate,
            };
            let report = generate(&catalog, &names, &options)?;
            if report.nothing_written() {
                anyhow::bail!(
                    "No sounds generated ({} failed, {} unknown)",
                    report.failed.len(),
                    report.unknown.len()
                );
            }
        }

        Commands::Show { name, catalog } => {
            let catalog = load_catalog(catalog.as_deref())?;
            let recipe = catalog.get(&name)?;
            print!("{}", recipe.to_toml()?);
        }
    }

    Ok(())
}

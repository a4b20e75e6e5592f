#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs scripted episodes on a static-map level.

mod runner;

use std::{fs, io, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use arena_level_core::LevelConfig;
use arena_level_map_files::TomlMapService;
use arena_level_map_provider::MapProvider;
use arena_level_rendering::{AsciiBackend, RenderingBackend, SvgBackend};
use clap::Parser;
use env_logger::Env;
use log::{info, LevelFilter};

use runner::Runner;

const SVG_PIXELS_PER_UNIT: f32 = 64.0;

/// Runs scripted episodes on a static-map training level.
#[derive(Debug, Parser)]
#[command(name = "arena-level", version)]
struct Args {
    /// Directory holding `<name>.toml` map files.
    #[arg(long, default_value = "maps")]
    maps: PathBuf,
    /// Map name; overrides `map_service` from the config file.
    #[arg(long)]
    map: Option<String>,
    /// Level configuration in TOML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of episodes to run.
    #[arg(long, default_value_t = 3)]
    episodes: usize,
    /// Step limit per episode.
    #[arg(long, default_value_t = 200)]
    steps: usize,
    /// Random seed; overrides `rng_seed` from the config file.
    #[arg(long)]
    seed: Option<u64>,
    /// Print an ASCII frame after every episode.
    #[arg(long, default_value_t = false)]
    render: bool,
    /// Maximum width of ASCII frames in characters.
    #[arg(long, default_value_t = 80)]
    columns: u32,
    /// Write an SVG frame after every episode into this directory.
    #[arg(long)]
    svg: Option<PathBuf>,
    /// Enable debug logging.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

/// Entry point for the arena level command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    info!(
        "running {} episodes on map `{}` with seed {:#x}",
        args.episodes, config.map_service, config.rng_seed
    );
    let maps = Arc::new(MapProvider::new(TomlMapService::new(&args.maps)));
    let mut runner = Runner::new(config, maps)?;

    let mut backends: Vec<Box<dyn RenderingBackend>> = Vec::new();
    if args.render {
        backends.push(Box::new(AsciiBackend::new(io::stdout(), args.columns)));
    }
    if let Some(directory) = &args.svg {
        backends.push(Box::new(SvgBackend::new(directory, SVG_PIXELS_PER_UNIT)?));
    }

    for _ in 0..args.episodes {
        let summary = runner.run_episode(args.steps)?;
        println!("{summary}");

        if backends.is_empty() {
            continue;
        }
        if let Some(scene) = runner.scene() {
            for backend in &mut backends {
                backend.present(&scene)?;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level.as_str()));
    let _ = builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn load_config(args: &Args) -> Result<LevelConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read level config {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse level config {}", path.display()))?
        }
        None => LevelConfig::default(),
    };

    if let Some(map) = &args.map {
        config.map_service = map.clone();
    }
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }
    Ok(config)
}

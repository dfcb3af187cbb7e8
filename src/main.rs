mod analyzer;
mod audio_player;
mod config;
mod device;
mod easing;
mod playback;
mod render_loop;
mod renderer;
mod sampler;
mod seek;
mod surface;
mod tui;
mod tween;

use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use env_logger::{Env, Target};
use log::info;

use crate::audio_player::{RodioGraph, RodioSource, Track};
use crate::config::Config;
use crate::playback::{Player, PlayerSettings};
use crate::renderer::PolarRenderer;

/// Plays a track and draws its stereo spectrum around a ring.
#[derive(Parser, Debug)]
#[command(name = "polarscope", version, about, long_about = None)]
struct Args {
    /// Audio file to play
    track: PathBuf,

    /// Config file (defaults to <config dir>/polarscope/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging()?;

    let config = Config::load(args.config.as_deref())?;
    let track = Track::load(&args.track)
        .wrap_err_with(|| format!("failed to load {}", args.track.display()))?;
    info!(
        "track ready: {:.1}s at {} Hz, {} channel(s)",
        track.duration_secs(),
        track.sample_rate(),
        track.channels()
    );

    let source = RodioSource::new(track, config.audio.fft_size);
    let graph = RodioGraph::new(config.audio.clone());
    let player = Player::new(
        source,
        graph,
        PolarRenderer::new(config.visual.clone()),
        PlayerSettings::from(&config.audio),
    );

    tui::run(player, &config)
}

/// Log to a file: stderr belongs to the terminal UI.
fn init_logging() -> Result<()> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("polarscope");
    std::fs::create_dir_all(&dir)
        .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
    let file = File::create(dir.join("polarscope.log"))?;

    env_logger::Builder::from_env(Env::new().filter_or("POLARSCOPE_LOG", "info"))
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::{Cli, Command};
use tonica::audio::decode::decode_audio;
use tonica::config::{self, Config};
use tonica::pitch::note::note_name;
use tonica::pitch::{FrameBuffer, PitchDetector, PitchSmoother};
use tonica::reference::{CleanConfig, ReferenceStore, ReferenceTrackBuilder};
use tonica::session::{Role, Session, Transport, WireEvent};

/// Stands in for the network link when running offline.
struct LogTransport;

impl Transport for LogTransport {
    fn send(&mut self, event: WireEvent) {
        if log::log_enabled!(log::Level::Trace) {
            match serde_json::to_string(&event) {
                Ok(json) => log::trace!("-> {}", json),
                Err(err) => log::trace!("-> unserializable event: {}", err),
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect tonica.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("tonica.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("tonica").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("tonica").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut cfg = match config_path {
        Some(ref path) => {
            let cfg = config::load_config(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    if let Some(dir) = cli.songs_dir {
        cfg.paths.songs_dir = dir;
    }
    if let Some(dir) = cli.references_dir {
        cfg.paths.references_dir = dir;
    }
    let store = ReferenceStore::new(&cfg.paths.songs_dir, &cfg.paths.references_dir);

    match cli.command {
        Command::Analyze { song, hop_size } => {
            if let Some(hop) = hop_size {
                cfg.reference.hop_size = hop;
            }
            cfg.validate()?;
            analyze(&store, &cfg, &song)
        }
        Command::Detect { input, all } => detect(&cfg, &input, all),
        Command::Compare {
            performance,
            song,
            tolerance,
            offset,
        } => {
            if let Some(tol) = tolerance {
                cfg.comparator.tolerance_hz = tol;
            }
            if let Some(offset) = offset {
                let mut delays = std::collections::HashMap::new();
                delays.insert(song.clone(), offset);
                cfg.delays = config::SongDelays::new(delays);
            }
            cfg.validate()?;
            compare(&store, &cfg, &performance, &song)
        }
        Command::Clean { song, max_jump } => {
            let clean_cfg = CleanConfig {
                max_jump_hz: max_jump,
                ..CleanConfig::default()
            };
            let out = store
                .write_guide(&song, &clean_cfg)
                .with_context(|| format!("Failed to clean reference for {}", song))?;
            println!("{}", out.display());
            Ok(())
        }
    }
}

fn analyze(store: &ReferenceStore, cfg: &Config, song: &str) -> Result<()> {
    let builder = ReferenceTrackBuilder::new(cfg.reference.builder())?;
    match store.build(song, &builder) {
        Ok(path) => {
            println!("{}", path.display());
            Ok(())
        }
        Err(err) => {
            log::error!("Analysis of {} failed ({:?}): {}", song, err.kind(), err);
            Err(err.into())
        }
    }
}

fn detect(cfg: &Config, input: &Path, all: bool) -> Result<()> {
    let audio = decode_audio(input)?;
    let frame_size = cfg.live.frame_size;
    let mut buffer = FrameBuffer::new(frame_size, audio.sample_rate)?;
    let mut detector = PitchDetector::new(cfg.live.detector())?;
    let mut smoother = PitchSmoother::new(cfg.live.smoother())?;

    let mut voiced = 0usize;
    for (i, block) in audio.samples.chunks_exact(frame_size).enumerate() {
        buffer.push(block);
        let Some(frame) = buffer.frame() else {
            continue;
        };
        let estimate = detector.detect_frame(&frame);
        let hz = smoother.update(estimate.hz);
        let t = (i * frame_size) as f64 / audio.sample_rate as f64;

        match hz {
            Some(hz) => {
                voiced += 1;
                let note = note_name(hz).unwrap_or_default();
                println!("{:8.2}s  {:8.2} Hz  {:<4}  rms {:.4}", t, hz, note, estimate.rms);
            }
            None if all => println!("{:8.2}s  {:>8} Hz  {:<4}  rms {:.4}", t, "-", "", estimate.rms),
            None => {}
        }
    }

    log::info!(
        "{} of {} frames voiced",
        voiced,
        audio.samples.len() / frame_size
    );
    Ok(())
}

fn compare(store: &ReferenceStore, cfg: &Config, performance: &Path, song: &str) -> Result<()> {
    let reference = match store.load(song) {
        Ok(track) => Some(Arc::new(track)),
        Err(err) => {
            log::warn!("Reference for {} unavailable: {}", song, err);
            None
        }
    };

    let audio = decode_audio(performance)?;
    let mut session = Session::new("local", Role::Leader, cfg, LogTransport)?;
    session.load_song(song, reference);
    session.start_input(audio.sample_rate)?;

    let block = cfg.live.frame_size;
    let total_blocks = audio.samples.len() / block;

    let pb = ProgressBar::new(total_blocks as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let mut scored = 0usize;
    let mut in_tune = 0usize;
    let mut precision_sum = 0.0;

    for (i, chunk) in audio.samples.chunks_exact(block).enumerate() {
        session.push_samples(chunk);
        let t = ((i + 1) * block) as f64 / audio.sample_rate as f64;
        let result = session.compare(t);
        if let Some(p) = result.precision {
            scored += 1;
            precision_sum += p;
            if p > 0.8 {
                in_tune += 1;
            }
        }
        pb.set_position(i as u64 + 1);
    }

    pb.finish_with_message("Comparison complete");

    if scored == 0 {
        println!("No frames could be scored (silence, lead-in or missing reference)");
        return Ok(());
    }
    println!(
        "Scored frames: {}/{}  mean precision: {:.3}  in tune: {:.1}%",
        scored,
        total_blocks,
        precision_sum / scored as f64,
        100.0 * in_tune as f64 / scored as f64
    );
    Ok(())
}

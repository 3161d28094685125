mod cli;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use cli::Cli;
use config::Config;
use motif::harmony::MelodyAnalysis;
use motif::playback::{self, CancelToken, PlaybackOptions, PlaybackOutcome};
use report::{Report, Settings};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    // Merge: config values apply only when CLI is at its default
    if cli.measure_length == 4.0 { cli.measure_length = cfg.rhythm.measure_length; }
    if cli.n_mfcc == 13 { cli.n_mfcc = cfg.spectral.n_mfcc; }
    if cli.port.is_none() {
        cli.port = cfg.playback.port.clone();
    }

    let settings = Settings {
        rhythm: motif::midi::RhythmOptions {
            measure_length: cli.measure_length,
            ..cfg.rhythm_options()
        },
        score: cfg.score_options(),
        spectral: cfg.spectral_config().with_n_mfcc(cli.n_mfcc),
        beat: cfg.beat_config(),
    };

    log::info!("motif - rhythm, harmony and spectral features");
    log::info!("Inputs: {}", cli.inputs.len());

    let pb = ProgressBar::new(cli.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let results: Vec<_> = cli
        .inputs
        .par_iter()
        .map(|path| {
            let result = report::analyze_path(path, &settings);
            pb.inc(1);
            (path, result)
        })
        .collect();
    pb.finish_and_clear();

    let mut reports = Vec::with_capacity(results.len());
    let mut failed = 0;
    for (path, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(err) => {
                failed += 1;
                log::error!("{}: {:#}", path.display(), err);
            }
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print!("{}", report.to_text());
        }
    }

    if cli.play {
        let options = cfg.playback_options();
        for report in &reports {
            if let Report::Midi(midi) = report {
                if let Some(melody) = &midi.melody {
                    log::info!("Playing {}", midi.path.display());
                    play_melody(melody, cli.port.as_deref(), &options)?;
                }
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} inputs failed", failed, cli.inputs.len());
    }
    Ok(())
}

#[cfg(feature = "device")]
fn play_melody(melody: &MelodyAnalysis, port: Option<&str>, options: &PlaybackOptions) -> Result<()> {
    let outcome = playback::play(
        &melody.notes,
        || playback::MidirSink::open(port),
        options,
        &CancelToken::new(),
    )
    .context("Playback failed")?;
    log_outcome(outcome);
    Ok(())
}

#[cfg(not(feature = "device"))]
fn play_melody(melody: &MelodyAnalysis, port: Option<&str>, options: &PlaybackOptions) -> Result<()> {
    if let Some(port) = port {
        log::warn!(
            "MIDI output requires the 'device' feature; ignoring port {:?}. \
             Rebuild with: cargo build --features device",
            port
        );
    }
    let outcome = playback::play(
        &melody.notes,
        || Ok(playback::LogSink),
        options,
        &CancelToken::new(),
    )
    .context("Playback failed")?;
    log_outcome(outcome);
    Ok(())
}

fn log_outcome(outcome: PlaybackOutcome) {
    match outcome {
        PlaybackOutcome::Completed { notes_played } => {
            log::info!("Playback finished: {} notes", notes_played)
        }
        PlaybackOutcome::Cancelled { notes_played } => {
            log::info!("Playback cancelled after {} notes", notes_played)
        }
    }
}

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Axis;
use serde::Serialize;

use motif::audio::{self, AudioRhythmAnalysis, BeatConfig, SpectralConfig};
use motif::harmony::{self, MelodyAnalysis, Score, ScoreOptions};
use motif::midi::{self, RhythmOptions, RhythmPattern};

/// Extractor settings shared by every input of a run.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub rhythm: RhythmOptions,
    pub score: ScoreOptions,
    pub spectral: SpectralConfig,
    pub beat: BeatConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Midi,
    Audio,
}

pub fn input_kind(path: &Path) -> InputKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mid") | Some("midi") | Some("smf") => InputKind::Midi,
        _ => InputKind::Audio,
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Report {
    Midi(MidiReport),
    Audio(AudioReport),
}

#[derive(Debug, Serialize)]
pub struct MidiReport {
    pub path: PathBuf,
    pub rhythm: RhythmPattern,
    /// `None` when the file has no pitched notes
    pub melody: Option<MelodyAnalysis>,
}

#[derive(Debug, Serialize)]
pub struct AudioReport {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub duration_seconds: f32,
    pub rhythm: AudioRhythmAnalysis,
    pub spectral: SpectralSummary,
}

#[derive(Debug, Serialize)]
pub struct SpectralSummary {
    pub frames: usize,
    pub mfcc_shape: [usize; 2],
    pub magnitude_shape: [usize; 2],
    /// Per-coefficient mean over all frames
    pub mfcc_mean: Vec<f32>,
    /// Mean dB of the magnitude matrix relative to its loudest bin
    pub magnitude_mean_db: f32,
}

pub fn analyze_path(path: &Path, settings: &Settings) -> Result<Report> {
    match input_kind(path) {
        InputKind::Midi => analyze_midi(path, settings).map(Report::Midi),
        InputKind::Audio => analyze_audio(path, settings).map(Report::Audio),
    }
}

fn analyze_midi(path: &Path, settings: &Settings) -> Result<MidiReport> {
    let timeline = midi::read_timeline(path)
        .with_context(|| format!("Failed to read MIDI file {}", path.display()))?;

    let beats = timeline.note_on_beats(!settings.rhythm.skip_silent_note_ons);
    let rhythm = midi::normalize(&beats, settings.rhythm.measure_length)?;

    let score = Score::from_timeline(&timeline, &settings.score);
    let melody = match harmony::analyze(&score) {
        Ok(melody) => Some(melody),
        Err(motif::Error::EmptyScore) => {
            log::warn!("{}: no pitched notes, skipping harmony", path.display());
            None
        }
        Err(e) => return Err(e).context("Harmonic analysis failed"),
    };

    Ok(MidiReport {
        path: path.to_path_buf(),
        rhythm,
        melody,
    })
}

fn analyze_audio(path: &Path, settings: &Settings) -> Result<AudioReport> {
    let audio_data = audio::decode_audio(path)
        .with_context(|| format!("Failed to decode audio file {}", path.display()))?;

    let (rhythm, spectral) = rayon::join(
        || audio::rhythm::analyze(&audio_data.samples, audio_data.sample_rate, &settings.beat),
        || audio::spectral::extract(&audio_data.samples, audio_data.sample_rate, &settings.spectral),
    );
    let rhythm = rhythm.context("Beat tracking failed")?;
    let spectral = spectral.context("Spectral extraction failed")?;

    let mfcc_mean = spectral
        .mfcc
        .mean_axis(Axis(1))
        .map(|m| m.to_vec())
        .unwrap_or_default();
    let magnitude_mean_db = audio::stft::amplitude_to_db(&spectral.magnitude)
        .mean()
        .unwrap_or(0.0);

    Ok(AudioReport {
        path: path.to_path_buf(),
        sample_rate: audio_data.sample_rate,
        duration_seconds: audio_data.duration(),
        rhythm,
        spectral: SpectralSummary {
            frames: spectral.n_frames(),
            mfcc_shape: [spectral.mfcc.nrows(), spectral.mfcc.ncols()],
            magnitude_shape: [spectral.magnitude.nrows(), spectral.magnitude.ncols()],
            mfcc_mean,
            magnitude_mean_db,
        },
    })
}

fn join_values<T: std::fmt::Display>(values: &[T], precision: usize) -> String {
    values
        .iter()
        .map(|v| format!("{:.*}", precision, v))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Report {
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = match self {
            Report::Midi(r) => write_midi(&mut out, r),
            Report::Audio(r) => write_audio(&mut out, r),
        };
        out
    }
}

fn write_midi(out: &mut String, r: &MidiReport) -> std::fmt::Result {
    writeln!(out, "== {} ==", r.path.display())?;
    writeln!(
        out,
        "rhythm ({} beats/measure, {} onsets): {}",
        r.rhythm.measure_length,
        r.rhythm.positions.len(),
        join_values(&r.rhythm.positions, 2)
    )?;

    let Some(melody) = &r.melody else {
        return writeln!(out, "harmony: no pitched notes");
    };
    writeln!(out, "key: {}", melody.key)?;
    writeln!(out, "notes ({}):", melody.notes.len())?;
    for n in &melody.notes {
        writeln!(
            out,
            "  {:>3} {:<3} @ {:>7.2}  dur {:.2}",
            n.pitch,
            harmony::pitch_class_name(n.pitch % 12),
            n.onset_beats,
            n.duration_beats
        )?;
    }
    writeln!(out, "chords ({}):", melody.chords.len())?;
    for c in &melody.chords {
        writeln!(out, "  @ {:>7.2}  {}", c.onset_beats, c.label)?;
    }
    Ok(())
}

fn write_audio(out: &mut String, r: &AudioReport) -> std::fmt::Result {
    writeln!(out, "== {} ==", r.path.display())?;
    writeln!(out, "duration: {:.2}s @ {} Hz", r.duration_seconds, r.sample_rate)?;
    writeln!(out, "tempo: {:.1} BPM", r.rhythm.tempo_bpm)?;
    writeln!(
        out,
        "beats ({}): {}",
        r.rhythm.beat_times.len(),
        join_values(&r.rhythm.beat_times, 2)
    )?;
    writeln!(
        out,
        "mfcc: {} x {}  magnitude: {} x {}",
        r.spectral.mfcc_shape[0],
        r.spectral.mfcc_shape[1],
        r.spectral.magnitude_shape[0],
        r.spectral.magnitude_shape[1]
    )?;
    writeln!(out, "magnitude mean: {:.1} dB re peak", r.spectral.magnitude_mean_db)?;
    writeln!(out, "mfcc mean: {}", join_values(&r.spectral.mfcc_mean, 1))
}

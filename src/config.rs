use serde::Deserialize;
use std::path::{Path, PathBuf};

use motif::audio::{BeatConfig, SpectralConfig};
use motif::harmony::ScoreOptions;
use motif::midi::RhythmOptions;
use motif::playback::PlaybackOptions;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rhythm: RhythmSection,
    #[serde(default)]
    pub harmony: HarmonySection,
    #[serde(default)]
    pub spectral: SpectralSection,
    #[serde(default)]
    pub beat: BeatSection,
    #[serde(default)]
    pub playback: PlaybackSection,
}

#[derive(Debug, Deserialize)]
pub struct RhythmSection {
    #[serde(default = "default_measure_length")]
    pub measure_length: f64,
    #[serde(default)]
    pub skip_silent_note_ons: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HarmonySection {
    /// Quantize onsets and durations to 1/n of a quarter note
    pub quantize_divisions: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SpectralSection {
    #[serde(default = "default_n_mfcc")]
    pub n_mfcc: usize,
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
}

#[derive(Debug, Deserialize)]
pub struct BeatSection {
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
    #[serde(default = "default_n_mels")]
    pub n_mels: usize,
    #[serde(default = "default_start_bpm")]
    pub start_bpm: f32,
    #[serde(default = "default_tightness")]
    pub tightness: f32,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackSection {
    #[serde(default = "default_ms_per_beat")]
    pub ms_per_beat: u64,
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    pub port: Option<String>,
}

impl Default for RhythmSection {
    fn default() -> Self {
        Self {
            measure_length: default_measure_length(),
            skip_silent_note_ons: false,
        }
    }
}

impl Default for SpectralSection {
    fn default() -> Self {
        Self {
            n_mfcc: default_n_mfcc(),
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            n_mels: default_n_mels(),
        }
    }
}

impl Default for BeatSection {
    fn default() -> Self {
        Self {
            n_fft: default_n_fft(),
            hop_length: default_hop_length(),
            n_mels: default_n_mels(),
            start_bpm: default_start_bpm(),
            tightness: default_tightness(),
        }
    }
}

impl Default for PlaybackSection {
    fn default() -> Self {
        Self {
            ms_per_beat: default_ms_per_beat(),
            velocity: default_velocity(),
            port: None,
        }
    }
}

fn default_measure_length() -> f64 { 4.0 }
fn default_n_mfcc() -> usize { 13 }
fn default_n_fft() -> usize { 2048 }
fn default_hop_length() -> usize { 512 }
fn default_n_mels() -> usize { 128 }
fn default_start_bpm() -> f32 { 120.0 }
fn default_tightness() -> f32 { 100.0 }
fn default_ms_per_beat() -> u64 { 500 }
fn default_velocity() -> u8 { 127 }

impl Config {
    pub fn rhythm_options(&self) -> RhythmOptions {
        RhythmOptions {
            measure_length: self.rhythm.measure_length,
            skip_silent_note_ons: self.rhythm.skip_silent_note_ons,
        }
    }

    pub fn score_options(&self) -> ScoreOptions {
        ScoreOptions {
            quantize_divisions: self.harmony.quantize_divisions,
        }
    }

    pub fn spectral_config(&self) -> SpectralConfig {
        SpectralConfig {
            n_fft: self.spectral.n_fft,
            hop_length: self.spectral.hop_length,
            n_mels: self.spectral.n_mels,
            ..SpectralConfig::default()
        }
        .with_n_mfcc(self.spectral.n_mfcc)
    }

    pub fn beat_config(&self) -> BeatConfig {
        BeatConfig {
            n_fft: self.beat.n_fft,
            hop_length: self.beat.hop_length,
            n_mels: self.beat.n_mels,
            start_bpm: self.beat.start_bpm,
            tightness: self.beat.tightness,
            ..BeatConfig::default()
        }
    }

    pub fn playback_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            ms_per_beat: self.playback.ms_per_beat,
            velocity: self.playback.velocity.min(127),
        }
    }
}

/// Explicit path, or auto-detect motif.toml / global config
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("motif.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("motif").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("motif").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

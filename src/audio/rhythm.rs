use super::features::AudioRhythmAnalysis;
use super::stft::{check_frame_params, mel_filterbank, power_to_db, stft_magnitude};
use crate::{Error, Result};

const MIN_BPM: f32 = 30.0;
const MAX_BPM: f32 = 320.0;

#[derive(Debug, Clone)]
pub struct BeatConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Centre of the tempo prior, and the answer for signals with no pulse
    pub start_bpm: f32,
    /// How strongly the tracker sticks to the estimated period
    pub tightness: f32,
    /// Drop weak beats at the start and end
    pub trim: bool,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            start_bpm: 120.0,
            tightness: 100.0,
            trim: true,
        }
    }
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}

fn frames_per_minute(sample_rate: u32, hop_length: usize) -> f32 {
    60.0 * sample_rate as f32 / hop_length as f32
}

/// Spectral-flux onset envelope: rectified frame-to-frame increase of the
/// log-power mel spectrogram, averaged over bands. One value per STFT frame.
pub fn onset_strength(samples: &[f32], sample_rate: u32, config: &BeatConfig) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Err(Error::EmptyAudio);
    }
    check_frame_params(config.n_fft, config.hop_length)?;

    let magnitude = stft_magnitude(samples, config.n_fft, config.hop_length)?;
    let fb = mel_filterbank(
        sample_rate,
        config.n_fft,
        config.n_mels,
        0.0,
        sample_rate as f32 / 2.0,
    );
    let mel = fb.dot(&magnitude.mapv(|m| m * m));
    let db = power_to_db(&mel, 1.0, Some(80.0));

    let (n_bands, n_frames) = db.dim();
    let mut env = vec![0.0f32; n_frames];
    if n_bands == 0 {
        return Ok(env);
    }
    for t in 1..n_frames {
        let flux: f32 = (0..n_bands)
            .map(|b| (db[(b, t)] - db[(b, t - 1)]).max(0.0))
            .sum();
        env[t] = flux / n_bands as f32;
    }

    Ok(env)
}

/// Global tempo from the onset envelope's autocorrelation.
///
/// Lags between 30 and 320 BPM are weighted by a log-normal prior centred on
/// `start_bpm` (one octave deviation); the winning lag is refined by
/// parabolic interpolation. Envelopes without periodic energy return
/// `start_bpm`.
pub fn estimate_tempo(onset_env: &[f32], sample_rate: u32, hop_length: usize, start_bpm: f32) -> f32 {
    let n = onset_env.len();
    let fpm = frames_per_minute(sample_rate, hop_length);
    let min_lag = ((fpm / MAX_BPM).ceil() as usize).max(1);
    let max_lag = ((fpm / MIN_BPM).floor() as usize).min(n.saturating_sub(2));

    if n < 3 || max_lag <= min_lag {
        return start_bpm;
    }

    // Unbiased autocorrelation, one lag beyond the search range for interpolation
    let ac: Vec<f32> = (0..=max_lag + 1)
        .map(|lag| {
            let sum: f32 = onset_env[..n - lag]
                .iter()
                .zip(&onset_env[lag..])
                .map(|(a, b)| a * b)
                .sum();
            sum / (n - lag) as f32
        })
        .collect();

    let prior = |lag: f32| {
        let octaves = (fpm / lag / start_bpm).log2();
        (-0.5 * octaves * octaves).exp()
    };

    let mut best_lag = 0;
    let mut best_score = 0.0f32;
    for lag in min_lag..=max_lag {
        let score = ac[lag] * prior(lag as f32);
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }

    if best_lag == 0 {
        return start_bpm;
    }

    let (a, b, c) = (ac[best_lag - 1], ac[best_lag], ac[best_lag + 1]);
    let curvature = a - 2.0 * b + c;
    let shift = if curvature < 0.0 {
        (0.5 * (a - c) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    let tempo = fpm / (best_lag as f32 + shift);
    log::debug!("Tempo: lag={} shift={:.3} -> {:.2} BPM", best_lag, shift, tempo);
    tempo
}

/// Dynamic-programming beat tracker over a normalized onset envelope.
///
/// Returns beat positions as frame indices, strictly increasing.
pub fn track_beats(onset_env: &[f32], tempo_bpm: f32, sample_rate: u32, config: &BeatConfig) -> Vec<usize> {
    let n = onset_env.len();
    if n < 2 || !(tempo_bpm > 0.0) {
        return Vec::new();
    }

    let mean = onset_env.iter().sum::<f32>() / n as f32;
    let var = onset_env.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
    let std = var.sqrt();
    if !(std > 0.0) {
        return Vec::new();
    }

    let period = frames_per_minute(sample_rate, config.hop_length) / tempo_bpm;
    let local = local_score(onset_env, std, period);
    let max_local = local.iter().copied().fold(0.0f32, f32::max);

    // Allowed gaps to the previous beat, with their log-deviation penalty
    let min_gap = ((period / 2.0).round() as usize).max(1);
    let max_gap = ((2.0 * period).round() as usize).max(min_gap);
    let penalty: Vec<(usize, f32)> = (min_gap..=max_gap)
        .map(|gap| {
            let dev = (gap as f32 / period).ln();
            (gap, -config.tightness * dev * dev)
        })
        .collect();

    let mut cumscore = vec![0.0f32; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];
    let mut first_beat = true;

    for i in 0..n {
        let mut best_value = f32::NEG_INFINITY;
        let mut best_prev = None;
        for &(gap, weight) in &penalty {
            let (value, prev) = match i.checked_sub(gap) {
                Some(prev) => (cumscore[prev] + weight, Some(prev)),
                None => (weight, None),
            };
            if value > best_value {
                best_value = value;
                best_prev = prev;
            }
        }

        cumscore[i] = local[i] + best_value;
        if first_beat && local[i] < 0.01 * max_local {
            backlink[i] = None;
        } else {
            backlink[i] = best_prev;
            first_beat = false;
        }
    }

    let mut beats = vec![last_beat(&cumscore)];
    while let Some(prev) = backlink[beats[beats.len() - 1]] {
        beats.push(prev);
    }
    beats.reverse();

    if config.trim {
        trim_beats(&local, &mut beats);
    }

    beats
}

/// Onset envelope scaled to unit deviation and smoothed with a Gaussian whose
/// width follows the beat period.
fn local_score(onset_env: &[f32], std: f32, period: f32) -> Vec<f32> {
    let radius = period.round().max(1.0) as isize;
    let window: Vec<f32> = (-radius..=radius)
        .map(|o| (-0.5 * (o as f32 * 32.0 / period).powi(2)).exp())
        .collect();

    let n = onset_env.len() as isize;
    (0..n)
        .map(|i| {
            window
                .iter()
                .enumerate()
                .filter_map(|(w, &weight)| {
                    let j = i + w as isize - radius;
                    (0..n).contains(&j).then(|| onset_env[j as usize] / std * weight)
                })
                .sum()
        })
        .collect()
}

/// Last cumulative-score peak that is at least half the median peak.
fn last_beat(cumscore: &[f32]) -> usize {
    let n = cumscore.len();
    let peaks: Vec<usize> = (0..n)
        .filter(|&i| {
            let left = if i == 0 { f32::NEG_INFINITY } else { cumscore[i - 1] };
            let right = if i + 1 == n { f32::NEG_INFINITY } else { cumscore[i + 1] };
            cumscore[i] > left && cumscore[i] >= right
        })
        .collect();

    if peaks.is_empty() {
        return (0..n)
            .max_by(|&a, &b| cumscore[a].total_cmp(&cumscore[b]))
            .unwrap_or(0);
    }

    let mut values: Vec<f32> = peaks.iter().map(|&i| cumscore[i]).collect();
    values.sort_by(f32::total_cmp);
    let median = if values.len() % 2 == 1 {
        values[values.len() / 2]
    } else {
        0.5 * (values[values.len() / 2 - 1] + values[values.len() / 2])
    };

    peaks
        .iter()
        .rev()
        .copied()
        .find(|&i| 2.0 * cumscore[i] > median)
        .unwrap_or(peaks[peaks.len() - 1])
}

/// Strip leading and trailing beats whose local score falls below half the
/// RMS of the smoothed beat strengths.
fn trim_beats(local: &[f32], beats: &mut Vec<usize>) {
    if beats.is_empty() {
        return;
    }

    const SMOOTH: [f32; 5] = [0.0, 0.25, 0.5, 0.25, 0.0];
    let strengths: Vec<f32> = beats.iter().map(|&b| local[b]).collect();
    let m = strengths.len() as isize;
    let smoothed: Vec<f32> = (0..m)
        .map(|i| {
            SMOOTH
                .iter()
                .enumerate()
                .filter_map(|(k, &w)| {
                    let j = i + k as isize - 2;
                    (0..m).contains(&j).then(|| strengths[j as usize] * w)
                })
                .sum()
        })
        .collect();
    let threshold =
        0.5 * (smoothed.iter().map(|v| v * v).sum::<f32>() / smoothed.len() as f32).sqrt();

    let start = strengths.iter().position(|&s| s > threshold);
    let end = strengths.iter().rposition(|&s| s > threshold);
    match (start, end) {
        (Some(start), Some(end)) => {
            beats.truncate(end + 1);
            beats.drain(..start);
        }
        _ => beats.clear(),
    }
}

/// Global tempo and beat timestamps of a mono waveform.
pub fn analyze(samples: &[f32], sample_rate: u32, config: &BeatConfig) -> Result<AudioRhythmAnalysis> {
    if samples.is_empty() {
        return Err(Error::EmptyAudio);
    }
    if sample_rate == 0 {
        return Err(Error::Domain {
            name: "sample_rate",
            value: 0.0,
            reason: "must be > 0",
        });
    }

    let env = onset_strength(samples, sample_rate, config)?;
    let tempo_bpm = estimate_tempo(&env, sample_rate, config.hop_length, config.start_bpm);
    let frames = track_beats(&env, tempo_bpm, sample_rate, config);

    let seconds_per_frame = config.hop_length as f32 / sample_rate as f32;
    let beat_times: Vec<f32> = frames
        .iter()
        .map(|&f| round2(f as f32 * seconds_per_frame))
        .collect();

    log::info!(
        "Audio rhythm: tempo={:.1} BPM, {} beats",
        tempo_bpm,
        beat_times.len()
    );

    Ok(AudioRhythmAnalysis {
        tempo_bpm,
        beat_times,
    })
}

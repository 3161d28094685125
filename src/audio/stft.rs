use ndarray::Array2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::{Error, Result};

const AMIN: f32 = 1e-10;

/// Periodic Hann window.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

pub(crate) fn check_frame_params(n_fft: usize, hop_length: usize) -> Result<()> {
    if n_fft == 0 {
        return Err(Error::Domain {
            name: "n_fft",
            value: 0.0,
            reason: "must be > 0",
        });
    }
    if hop_length == 0 {
        return Err(Error::Domain {
            name: "hop_length",
            value: 0.0,
            reason: "must be > 0",
        });
    }
    Ok(())
}

/// Number of centred frames for a signal of `len` samples.
pub fn frame_count(len: usize, hop_length: usize) -> usize {
    1 + len / hop_length
}

/// Magnitude STFT with centred, zero-padded frames.
///
/// Returns a `(1 + n_fft/2, 1 + len/hop_length)` matrix.
pub fn stft_magnitude(samples: &[f32], n_fft: usize, hop_length: usize) -> Result<Array2<f32>> {
    if samples.is_empty() {
        return Err(Error::EmptyAudio);
    }
    check_frame_params(n_fft, hop_length)?;

    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let n_frames = frame_count(samples.len(), hop_length);
    let n_freq = n_fft / 2 + 1;
    let window = hann_window(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);

    let columns: Vec<Vec<f32>> = (0..n_frames)
        .into_par_iter()
        .map(|frame| {
            let start = frame * hop_length;
            let mut buffer: Vec<Complex<f32>> = (0..n_fft)
                .map(|i| {
                    let s = padded.get(start + i).copied().unwrap_or(0.0);
                    Complex::new(s * window[i], 0.0)
                })
                .collect();
            fft.process(&mut buffer);
            buffer[..n_freq].iter().map(|c| c.norm()).collect()
        })
        .collect();

    let mut out = Array2::<f32>::zeros((n_freq, n_frames));
    for (t, column) in columns.iter().enumerate() {
        for (f, &mag) in column.iter().enumerate() {
            out[(f, t)] = mag;
        }
    }

    log::debug!("STFT: n_fft={}, hop={}, {} frames", n_fft, hop_length, n_frames);

    Ok(out)
}

/// Slaney-style mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;
    if hz < min_log_hz {
        hz / f_sp
    } else {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = 6.4f32.ln() / 27.0;
    if mel < min_log_mel {
        mel * f_sp
    } else {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    }
}

/// Triangular mel filterbank of shape `(n_mels, 1 + n_fft/2)` with Slaney
/// area normalization.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f32, fmax: f32) -> Array2<f32> {
    let n_freq = n_fft / 2 + 1;
    let mut fb = Array2::<f32>::zeros((n_mels, n_freq));
    if n_mels == 0 || n_fft == 0 {
        return fb;
    }

    let fmax = fmax.min(sample_rate as f32 / 2.0).max(fmin);
    let mel_min = hz_to_mel(fmin.max(0.0));
    let mel_max = hz_to_mel(fmax);
    let step = (mel_max - mel_min) / (n_mels + 1) as f32;
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + step * i as f32))
        .collect();

    for m in 0..n_mels {
        let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
        let rise = (center - lo).max(1e-8);
        let fall = (hi - center).max(1e-8);
        let enorm = 2.0 / (hi - lo).max(1e-8);

        for k in 0..n_freq {
            let freq = k as f32 * sample_rate as f32 / n_fft as f32;
            let w = ((freq - lo) / rise).min((hi - freq) / fall).max(0.0);
            fb[(m, k)] = w * enorm;
        }
    }

    fb
}

/// `10 * log10(S / ref)`, floored at `max - top_db` over the whole matrix.
pub fn power_to_db(power: &Array2<f32>, reference: f32, top_db: Option<f32>) -> Array2<f32> {
    let ref_db = 10.0 * reference.abs().max(AMIN).log10();
    let mut db = power.mapv(|p| 10.0 * p.max(AMIN).log10() - ref_db);

    if let Some(top_db) = top_db {
        let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - top_db;
        db.mapv_inplace(|v| v.max(floor));
    }

    db
}

/// Magnitude to dB relative to the loudest bin, floored 80 dB below it.
pub fn amplitude_to_db(magnitude: &Array2<f32>) -> Array2<f32> {
    let peak = magnitude.iter().copied().fold(0.0f32, f32::max);
    let power = magnitude.mapv(|m| m * m);
    power_to_db(&power, peak * peak, Some(80.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tone(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn amplitude_db_is_relative_to_peak() {
        let mag = ndarray::array![[1.0f32, 0.1], [1e-6, 0.0]];
        let db = amplitude_to_db(&mag);
        assert_relative_eq!(db[(0, 0)], 0.0, epsilon = 1e-4);
        assert_relative_eq!(db[(0, 1)], -20.0, epsilon = 1e-3);
        assert_relative_eq!(db[(1, 0)], -80.0, epsilon = 1e-4);
        assert_relative_eq!(db[(1, 1)], -80.0, epsilon = 1e-4);
    }

    #[test]
    fn amplitude_db_of_silence_is_finite() {
        let db = amplitude_to_db(&Array2::zeros((4, 3)));
        assert!(db.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn hann_is_periodic() {
        let w = hann_window(8);
        assert_relative_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-6);
        assert_relative_eq!(w[2], w[6], epsilon = 1e-6);
    }

    #[test]
    fn stft_shape_and_peak_bin() {
        let sr = 22050;
        let y = tone(1000.0, sr, 0.5);
        let mag = stft_magnitude(&y, 2048, 512).unwrap();
        assert_eq!(mag.shape(), &[1025, 1 + y.len() / 512]);

        let mid = mag.ncols() / 2;
        let peak_bin = (0..mag.nrows())
            .max_by(|&a, &b| mag[(a, mid)].total_cmp(&mag[(b, mid)]))
            .unwrap();
        let expected = (1000.0 * 2048.0 / sr as f32).round() as usize;
        assert!((peak_bin as isize - expected as isize).abs() <= 1);
    }

    #[test]
    fn stft_rejects_empty_and_zero_hop() {
        assert!(matches!(stft_magnitude(&[], 2048, 512), Err(Error::EmptyAudio)));
        assert!(matches!(
            stft_magnitude(&[0.0; 16], 2048, 0),
            Err(Error::Domain { name: "hop_length", .. })
        ));
    }

    #[test]
    fn mel_scale_round_trips() {
        for hz in [100.0f32, 440.0, 1000.0, 4000.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, max_relative = 1e-4);
        }
    }

    #[test]
    fn filterbank_shape_and_nonnegative() {
        let fb = mel_filterbank(22050, 2048, 128, 0.0, 11025.0);
        assert_eq!(fb.shape(), &[128, 1025]);
        assert!(fb.iter().all(|&w| w >= 0.0 && w.is_finite()));
        for m in 0..128 {
            assert!(fb.row(m).sum() > 0.0, "empty mel band {}", m);
        }
    }

    #[test]
    fn power_to_db_applies_floor() {
        let p = Array2::from_shape_vec((1, 3), vec![1.0, 1e-3, 0.0]).unwrap();
        let db = power_to_db(&p, 1.0, Some(20.0));
        assert_relative_eq!(db[(0, 0)], 0.0);
        assert_relative_eq!(db[(0, 1)], -20.0, epsilon = 1e-4);
        assert_relative_eq!(db[(0, 2)], -20.0, epsilon = 1e-4);
    }
}

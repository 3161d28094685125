use ndarray::Array2;

use super::features::SpectralFeatures;
use super::stft::{check_frame_params, mel_filterbank, power_to_db, stft_magnitude};
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct SpectralConfig {
    /// Number of cepstral coefficients per frame
    pub n_mfcc: usize,
    /// FFT window size
    pub n_fft: usize,
    /// Number of samples between frames
    pub hop_length: usize,
    /// Number of mel bands
    pub n_mels: usize,
    pub fmin: f32,
    /// Upper filterbank edge; Nyquist when `None`
    pub fmax: Option<f32>,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 13,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            fmin: 0.0,
            fmax: None,
        }
    }
}

impl SpectralConfig {
    pub fn with_n_mfcc(mut self, n_mfcc: usize) -> Self {
        self.n_mfcc = n_mfcc;
        self
    }

    fn validate(&self) -> Result<()> {
        check_frame_params(self.n_fft, self.hop_length)?;
        if self.n_mels == 0 {
            return Err(Error::Domain {
                name: "n_mels",
                value: 0.0,
                reason: "must be > 0",
            });
        }
        if self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return Err(Error::Domain {
                name: "n_mfcc",
                value: self.n_mfcc as f64,
                reason: "must be in 1..=n_mels",
            });
        }
        Ok(())
    }
}

/// Orthonormal DCT-II basis, `n_out` rows over `n_in` inputs.
fn dct_matrix(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in as f32;
    Array2::from_shape_fn((n_out, n_in), |(k, i)| {
        let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
        scale * (std::f32::consts::PI / n * (i as f32 + 0.5) * k as f32).cos()
    })
}

/// MFCCs from an STFT magnitude matrix computed with the same `n_fft`.
pub fn mfcc_from_magnitude(
    magnitude: &Array2<f32>,
    sample_rate: u32,
    config: &SpectralConfig,
) -> Result<Array2<f32>> {
    config.validate()?;

    let fmax = config.fmax.unwrap_or(sample_rate as f32 / 2.0);
    let fb = mel_filterbank(sample_rate, config.n_fft, config.n_mels, config.fmin, fmax);
    if fb.ncols() != magnitude.nrows() {
        return Err(Error::Domain {
            name: "n_fft",
            value: config.n_fft as f64,
            reason: "does not match the magnitude matrix",
        });
    }

    let power = magnitude.mapv(|m| m * m);
    let mel = fb.dot(&power);
    let log_mel = power_to_db(&mel, 1.0, Some(80.0));

    Ok(dct_matrix(config.n_mfcc, config.n_mels).dot(&log_mel))
}

/// MFCC and STFT magnitude matrices of a mono waveform.
pub fn extract(samples: &[f32], sample_rate: u32, config: &SpectralConfig) -> Result<SpectralFeatures> {
    if samples.is_empty() {
        return Err(Error::EmptyAudio);
    }
    config.validate()?;

    let magnitude = stft_magnitude(samples, config.n_fft, config.hop_length)?;
    let mfcc = mfcc_from_magnitude(&magnitude, sample_rate, config)?;

    log::info!(
        "Spectral features: mfcc {}x{}, magnitude {}x{}",
        mfcc.nrows(),
        mfcc.ncols(),
        magnitude.nrows(),
        magnitude.ncols()
    );

    Ok(SpectralFeatures { mfcc, magnitude })
}

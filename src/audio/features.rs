use ndarray::Array2;
use serde::Serialize;

/// Global tempo and beat positions of a waveform.
///
/// The tempo is a best-effort estimate with no confidence attached; treat it
/// as advisory.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioRhythmAnalysis {
    pub tempo_bpm: f32,
    /// Beat onsets in seconds, rounded to 2 decimals, strictly increasing.
    pub beat_times: Vec<f32>,
}

/// Time-frequency matrices of a waveform, frames along the second axis.
#[derive(Clone, Debug)]
pub struct SpectralFeatures {
    /// Cepstral coefficients (n_mfcc x frames)
    pub mfcc: Array2<f32>,
    /// STFT magnitude (1 + n_fft/2 x frames), linear scale
    pub magnitude: Array2<f32>,
}

impl SpectralFeatures {
    pub fn n_frames(&self) -> usize {
        self.magnitude.ncols()
    }
}

use std::fmt;

use serde::Serialize;

use super::score::Score;
use crate::{Error, Result};

/// Krumhansl-Kessler probe-tone profile for major keys, tonic first.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
/// Krumhansl-Kessler probe-tone profile for minor keys, tonic first.
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

const MAJOR_TONICS: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];
const MINOR_TONICS: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "G#", "A", "Bb", "B",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Key {
    pub tonic: u8,
    pub mode: Mode,
    /// Pearson correlation between the piece and the key profile.
    pub correlation: f64,
}

impl Key {
    pub fn tonic_name(&self) -> &'static str {
        match self.mode {
            Mode::Major => MAJOR_TONICS[self.tonic as usize % 12],
            Mode::Minor => MINOR_TONICS[self.tonic as usize % 12],
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        };
        write!(f, "{} {}", self.tonic_name(), mode)
    }
}

/// Duration-weighted pitch-class distribution of every note and chord member.
///
/// When every element has zero duration, each occurrence counts once.
pub fn pitch_class_histogram(score: &Score) -> [f64; 12] {
    let mut weighted = [0.0f64; 12];
    let mut counted = [0.0f64; 12];

    for element in score.elements() {
        for &pitch in element.pitches() {
            let pc = (pitch % 12) as usize;
            weighted[pc] += element.duration();
            counted[pc] += 1.0;
        }
    }

    if weighted.iter().sum::<f64>() > 0.0 {
        weighted
    } else {
        counted
    }
}

fn correlation(x: &[f64; 12], profile: &[f64; 12], tonic: usize) -> f64 {
    let mean_x = x.iter().sum::<f64>() / 12.0;
    let mean_y = profile.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (pc, &xv) in x.iter().enumerate() {
        let yv = profile[(pc + 12 - tonic) % 12];
        cov += (xv - mean_x) * (yv - mean_y);
        var_x += (xv - mean_x).powi(2);
        var_y += (yv - mean_y).powi(2);
    }

    let denom = (var_x * var_y).sqrt();
    if denom > 0.0 {
        cov / denom
    } else {
        0.0
    }
}

/// Krumhansl-Schmuckler key finding over a pitch-class distribution.
///
/// Candidates are scored in a fixed order (C..B major, then C..B minor) and
/// only a strictly higher correlation replaces the current best, so ties
/// resolve to major before minor, then to the lowest tonic.
pub fn estimate_key(histogram: &[f64; 12]) -> Result<Key> {
    if histogram.iter().all(|&w| w <= 0.0) {
        return Err(Error::EmptyScore);
    }

    let candidates = (0..12)
        .map(|t| (t, Mode::Major, &MAJOR_PROFILE))
        .chain((0..12).map(|t| (t, Mode::Minor, &MINOR_PROFILE)));

    let mut best: Option<Key> = None;
    for (tonic, mode, profile) in candidates {
        let r = correlation(histogram, profile, tonic);
        if best.map_or(true, |b| r > b.correlation) {
            best = Some(Key {
                tonic: tonic as u8,
                mode,
                correlation: r,
            });
        }
    }

    best.ok_or(Error::EmptyScore)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(pcs: &[(usize, f64)]) -> [f64; 12] {
        let mut h = [0.0; 12];
        for &(pc, w) in pcs {
            h[pc] += w;
        }
        h
    }

    #[test]
    fn c_major_scale() {
        let h = histogram(&[(0, 2.0), (2, 1.0), (4, 1.0), (5, 1.0), (7, 1.0), (9, 1.0), (11, 1.0)]);
        let key = estimate_key(&h).unwrap();
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn a_minor_triad_weighting() {
        let h = histogram(&[(9, 4.0), (0, 2.0), (4, 2.0), (11, 0.5), (2, 0.5), (5, 0.5), (8, 1.0)]);
        let key = estimate_key(&h).unwrap();
        assert_eq!(key.to_string(), "A minor");
    }

    #[test]
    fn transposed_profile_finds_its_own_key() {
        // The G major profile itself must correlate perfectly with G major
        let mut h = [0.0; 12];
        for pc in 0..12 {
            h[(pc + 7) % 12] = MAJOR_PROFILE[pc];
        }
        let key = estimate_key(&h).unwrap();
        assert_eq!((key.tonic, key.mode), (7, Mode::Major));
        assert!((key.correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_distribution_ties_to_c_major() {
        let key = estimate_key(&[1.0; 12]).unwrap();
        assert_eq!(key.to_string(), "C major");
    }

    #[test]
    fn empty_histogram_is_an_error() {
        assert!(matches!(estimate_key(&[0.0; 12]), Err(Error::EmptyScore)));
    }
}

use std::path::Path;

use serde::Serialize;

use super::timeline::read_timeline;
use crate::{Error, Result};

pub const DEFAULT_MEASURE_LENGTH: f64 = 4.0;

/// Beat positions folded into one measure, each in `[0, measure_length)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RhythmPattern {
    pub measure_length: f64,
    pub positions: Vec<f64>,
}

#[derive(Clone, Copy, Debug)]
pub struct RhythmOptions {
    pub measure_length: f64,
    /// Drop velocity-0 note-ons, which most files use as note-offs.
    pub skip_silent_note_ons: bool,
}

impl Default for RhythmOptions {
    fn default() -> Self {
        Self {
            measure_length: DEFAULT_MEASURE_LENGTH,
            skip_silent_note_ons: false,
        }
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Fold absolute beat times onto a measure grid of `measure_length` beats.
///
/// Each entry becomes `t mod M` rounded to two decimals. A value that rounds
/// up to `M` wraps to `0.0`.
pub fn normalize(times: &[f64], measure_length: f64) -> Result<RhythmPattern> {
    if !(measure_length.is_finite() && measure_length > 0.0) {
        return Err(Error::Domain {
            name: "measure_length",
            value: measure_length,
            reason: "must be finite and > 0",
        });
    }

    let positions = times
        .iter()
        .map(|&t| {
            if !(t.is_finite() && t >= 0.0) {
                return Err(Error::Domain {
                    name: "time",
                    value: t,
                    reason: "must be finite and >= 0",
                });
            }
            let folded = round2(t % measure_length);
            Ok(if folded >= measure_length { 0.0 } else { folded })
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(RhythmPattern {
        measure_length,
        positions,
    })
}

/// Note-on onsets of every track of a MIDI file, folded into one measure.
pub fn extract_rhythm(path: &Path, options: &RhythmOptions) -> Result<RhythmPattern> {
    let timeline = read_timeline(path)?;
    let beats = timeline.note_on_beats(!options.skip_silent_note_ons);
    let pattern = normalize(&beats, options.measure_length)?;

    log::info!(
        "Rhythm pattern: {} onsets over a {}-beat measure",
        pattern.positions.len(),
        pattern.measure_length
    );

    Ok(pattern)
}

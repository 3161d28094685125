use std::path::Path;

use serde::Serialize;

use super::chord::chord_name;
use super::key::{estimate_key, pitch_class_histogram};
use super::score::{Element, Score, ScoreOptions};
use crate::midi::read_timeline;
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub onset_beats: f64,
    pub duration_beats: f64,
}

/// A chord label, sounding until the next span or the end of the piece.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChordSpan {
    pub label: String,
    pub onset_beats: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MelodyAnalysis {
    pub key: String,
    pub notes: Vec<NoteEvent>,
    pub chords: Vec<ChordSpan>,
}

/// Estimate the key of a score and split its elements into a note contour
/// and chord labels, parts in listed order.
pub fn analyze(score: &Score) -> Result<MelodyAnalysis> {
    score.validate()?;
    if score.elements().next().is_none() {
        return Err(Error::EmptyScore);
    }

    let key = estimate_key(&pitch_class_histogram(score))?;

    let mut notes = Vec::new();
    let mut chords = Vec::new();
    for element in score.elements() {
        match element {
            Element::Note(note) => notes.push(NoteEvent {
                pitch: note.pitch,
                onset_beats: note.onset,
                duration_beats: note.duration,
            }),
            Element::Chord(chord) => chords.push(ChordSpan {
                label: chord_name(&chord.pitches),
                onset_beats: chord.onset,
            }),
        }
    }

    log::info!(
        "Melody analysis: key={} (r={:.3}), {} notes, {} chords",
        key,
        key.correlation,
        notes.len(),
        chords.len()
    );

    Ok(MelodyAnalysis {
        key: key.to_string(),
        notes,
        chords,
    })
}

/// Read a MIDI file, build its score, and analyze it.
pub fn analyze_file(path: &Path, options: &ScoreOptions) -> Result<MelodyAnalysis> {
    let timeline = read_timeline(path)?;
    let score = Score::from_timeline(&timeline, options);
    analyze(&score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harmony::score::{ChordElement, NoteElement, Part};

    fn note(pitch: u8, onset: f64, duration: f64) -> Element {
        Element::Note(NoteElement { pitch, onset, duration })
    }

    #[test]
    fn notes_and_chords_are_split() {
        let score = Score {
            parts: vec![Part {
                name: None,
                elements: vec![
                    Element::Chord(ChordElement { pitches: vec![60, 64, 67], onset: 0.0, duration: 2.0 }),
                    note(72, 2.0, 1.0),
                    Element::Chord(ChordElement { pitches: vec![55, 59, 62, 65], onset: 3.0, duration: 1.0 }),
                ],
            }],
        };
        let analysis = analyze(&score).unwrap();

        assert_eq!(analysis.notes, vec![NoteEvent { pitch: 72, onset_beats: 2.0, duration_beats: 1.0 }]);
        assert_eq!(
            analysis.chords,
            vec![
                ChordSpan { label: "C-major triad".into(), onset_beats: 0.0 },
                ChordSpan { label: "G-dominant seventh chord".into(), onset_beats: 3.0 },
            ]
        );
        assert_eq!(analysis.key, "C major");
    }

    #[test]
    fn parts_keep_listed_order() {
        let score = Score {
            parts: vec![
                Part { name: None, elements: vec![note(67, 1.0, 1.0)] },
                Part { name: None, elements: vec![note(48, 0.0, 4.0)] },
            ],
        };
        let pitches: Vec<u8> = analyze(&score).unwrap().notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![67, 48]);
    }

    #[test]
    fn empty_score_is_rejected() {
        assert!(matches!(analyze(&Score::default()), Err(Error::EmptyScore)));
        let hollow = Score { parts: vec![Part::default()] };
        assert!(matches!(analyze(&hollow), Err(Error::EmptyScore)));
    }
}

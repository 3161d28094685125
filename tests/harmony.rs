mod common;

use motif::harmony::{
    analyze, analyze_file, chord_name, ChordElement, Element, NoteElement, NoteEvent, Part, Score, ScoreOptions,
};
use motif::Error;

use common::{melody_track, note_off, note_on, smf_bytes, write_file};

fn chord_track() -> Vec<(u32, midly::TrackEventKind<'static>)> {
    vec![
        (0, note_on(60, 90)),
        (0, note_on(64, 90)),
        (0, note_on(67, 90)),
        (1920, note_off(60)),
        (0, note_off(64)),
        (0, note_off(67)),
        // First inversion, bass on E
        (0, note_on(52, 90)),
        (0, note_on(55, 90)),
        (0, note_on(60, 90)),
        (1920, note_off(52)),
        (0, note_off(55)),
        (0, note_off(60)),
    ]
}

#[test]
fn scale_over_tonic_chords_reads_c_major() {
    let dir = tempfile::tempdir().unwrap();
    let scale: Vec<(u8, u32)> = [60, 62, 64, 65, 67, 69, 71, 72].iter().map(|&p| (p, 480)).collect();
    let bytes = smf_bytes(480, vec![melody_track(&scale), chord_track()]);
    let path = write_file(dir.path(), "c_major.mid", &bytes);

    let analysis = analyze_file(&path, &ScoreOptions::default()).unwrap();

    assert_eq!(analysis.key, "C major");
    assert_eq!(analysis.notes.len(), 8);
    let onsets: Vec<f64> = analysis.notes.iter().map(|n| n.onset_beats).collect();
    assert_eq!(onsets, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    assert!(analysis.notes.iter().all(|n| n.duration_beats == 1.0));

    let labels: Vec<(&str, f64)> = analysis
        .chords
        .iter()
        .map(|c| (c.label.as_str(), c.onset_beats))
        .collect();
    assert_eq!(labels, vec![("C-major triad", 0.0), ("C-major triad", 4.0)]);
}

#[test]
fn file_without_notes_is_empty_score() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "empty.mid", &smf_bytes(480, vec![vec![]]));
    assert!(matches!(
        analyze_file(&path, &ScoreOptions::default()),
        Err(Error::EmptyScore)
    ));
}

#[test]
fn missing_file_is_not_found() {
    let result = analyze_file(std::path::Path::new("/nonexistent/tune.mid"), &ScoreOptions::default());
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[test]
fn undecodable_file_is_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "junk.mid", &[0u8; 32]);
    assert!(matches!(
        analyze_file(&path, &ScoreOptions::default()),
        Err(Error::Format(_))
    ));
}

#[test]
fn malformed_score_is_parse_error() {
    let bad_pitch = Score {
        parts: vec![Part {
            name: None,
            elements: vec![Element::Chord(ChordElement { pitches: vec![60, 200], onset: 0.0, duration: 1.0 })],
        }],
    };
    assert!(matches!(analyze(&bad_pitch), Err(Error::Parse(_))));

    let negative_onset = Score {
        parts: vec![Part {
            name: None,
            elements: vec![Element::Chord(ChordElement { pitches: vec![60, 64], onset: -1.0, duration: 1.0 })],
        }],
    };
    assert!(matches!(analyze(&negative_onset), Err(Error::Parse(_))));
}

#[test]
fn notes_only_score_comes_back_unchanged() {
    let input = [
        vec![(64, 0.0, 1.0), (62, 1.0, 0.5), (60, 1.5, 2.5)],
        vec![(48, 0.0, 4.0), (55, 4.0, 0.25)],
    ];
    let score = Score {
        parts: input
            .iter()
            .map(|notes| Part {
                name: None,
                elements: notes
                    .iter()
                    .map(|&(pitch, onset, duration)| Element::Note(NoteElement { pitch, onset, duration }))
                    .collect(),
            })
            .collect(),
    };

    let analysis = analyze(&score).unwrap();

    let expected: Vec<NoteEvent> = input
        .iter()
        .flatten()
        .map(|&(pitch, onset_beats, duration_beats)| NoteEvent { pitch, onset_beats, duration_beats })
        .collect();
    assert_eq!(analysis.notes, expected);
    assert!(analysis.chords.is_empty());
}

#[test]
fn common_chord_names() {
    assert_eq!(chord_name(&[57, 60, 64]), "A-minor triad");
    assert_eq!(chord_name(&[55, 59, 62, 65]), "G-dominant seventh chord");
    assert_eq!(chord_name(&[60, 67]), "perfect fifth above C");
    assert_eq!(chord_name(&[48, 60]), "octave above C");
}

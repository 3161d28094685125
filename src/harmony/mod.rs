pub mod analysis;
pub mod chord;
pub mod key;
pub mod score;

pub use analysis::{analyze, analyze_file, ChordSpan, MelodyAnalysis, NoteEvent};
pub use chord::chord_name;
pub use key::{estimate_key, pitch_class_histogram, Key, Mode};
pub use score::{ChordElement, Element, NoteElement, Part, Score, ScoreOptions};

const PITCH_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Display name of a pitch class.
pub fn pitch_class_name(pc: u8) -> &'static str {
    PITCH_NAMES[(pc % 12) as usize]
}

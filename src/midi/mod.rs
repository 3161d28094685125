pub mod rhythm;
pub mod timeline;

pub use rhythm::{extract_rhythm, normalize, RhythmOptions, RhythmPattern, DEFAULT_MEASURE_LENGTH};
pub use timeline::{parse_timeline, read_timeline, EventKind, TempoChange, TimedEvent, Timeline, Timing, Track};

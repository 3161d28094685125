use std::collections::HashMap;

use crate::midi::{EventKind, Timeline, Track};
use crate::{Error, Result};

/// A single pitched note. Times are in quarter notes.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteElement {
    pub pitch: u8,
    pub onset: f64,
    pub duration: f64,
}

/// Simultaneous pitches sounding as one element.
#[derive(Clone, Debug, PartialEq)]
pub struct ChordElement {
    pub pitches: Vec<u8>,
    pub onset: f64,
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Note(NoteElement),
    Chord(ChordElement),
}

impl Element {
    pub fn onset(&self) -> f64 {
        match self {
            Element::Note(n) => n.onset,
            Element::Chord(c) => c.onset,
        }
    }

    pub fn duration(&self) -> f64 {
        match self {
            Element::Note(n) => n.duration,
            Element::Chord(c) => c.duration,
        }
    }

    pub fn pitches(&self) -> &[u8] {
        match self {
            Element::Note(n) => std::slice::from_ref(&n.pitch),
            Element::Chord(c) => &c.pitches,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Part {
    pub name: Option<String>,
    pub elements: Vec<Element>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Score {
    pub parts: Vec<Part>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreOptions {
    /// Snap onsets and durations to `1/n` of a quarter note.
    pub quantize_divisions: Option<u32>,
}

/// A note-on/note-off pair in ticks.
#[derive(Clone, Copy, Debug)]
struct HeldSpan {
    pitch: u8,
    start: u64,
    end: u64,
}

impl Score {
    /// Build a score from a MIDI timeline: one part per track that sounds at
    /// least one note, notes sharing an onset tick merged into a chord.
    pub fn from_timeline(timeline: &Timeline, options: &ScoreOptions) -> Score {
        let tpb = timeline.ticks_per_beat();
        let to_beats = |ticks: u64| quantize(ticks as f64 / tpb, options.quantize_divisions);

        let parts: Vec<Part> = timeline
            .tracks
            .iter()
            .filter_map(|track| {
                let spans = pair_notes(track);
                if spans.is_empty() {
                    return None;
                }

                let mut elements = Vec::new();
                for group in spans.chunk_by(|a, b| a.start == b.start) {
                    let onset = to_beats(group[0].start);
                    let end = group.iter().map(|s| s.end).max().unwrap_or(group[0].start);
                    let duration = to_beats(end) - onset;

                    let mut pitches: Vec<u8> = group.iter().map(|s| s.pitch).collect();
                    pitches.dedup();

                    if pitches.len() == 1 {
                        elements.push(Element::Note(NoteElement {
                            pitch: pitches[0],
                            onset,
                            duration: duration.max(0.0),
                        }));
                    } else {
                        elements.push(Element::Chord(ChordElement {
                            pitches,
                            onset,
                            duration: duration.max(0.0),
                        }));
                    }
                }

                Some(Part {
                    name: track.name.clone(),
                    elements,
                })
            })
            .collect();

        log::debug!(
            "Built score: {} parts, {} elements",
            parts.len(),
            parts.iter().map(|p| p.elements.len()).sum::<usize>()
        );

        Score { parts }
    }

    /// Check the structural rules every analyzer relies on.
    pub fn validate(&self) -> Result<()> {
        for (p, part) in self.parts.iter().enumerate() {
            for (i, element) in part.elements.iter().enumerate() {
                let at = || format!("part {} element {}", p, i);

                let (onset, duration) = (element.onset(), element.duration());
                if !(onset.is_finite() && onset >= 0.0) {
                    return Err(Error::Parse(format!("{}: invalid onset {}", at(), onset)));
                }
                if !(duration.is_finite() && duration >= 0.0) {
                    return Err(Error::Parse(format!("{}: invalid duration {}", at(), duration)));
                }
                if let Some(pitch) = element.pitches().iter().find(|&&p| p > 127) {
                    return Err(Error::Parse(format!("{}: pitch {} out of range", at(), pitch)));
                }
                if let Element::Chord(chord) = element {
                    if chord.pitches.len() < 2 {
                        return Err(Error::Parse(format!(
                            "{}: chord needs at least two pitches",
                            at()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.parts.iter().flat_map(|p| p.elements.iter())
    }
}

fn quantize(beats: f64, divisions: Option<u32>) -> f64 {
    match divisions {
        Some(n) if n > 0 => (beats * n as f64).round() / n as f64,
        _ => beats,
    }
}

/// Pair note-ons with their note-offs, per (channel, pitch).
///
/// A velocity-0 note-on closes a note. A re-struck key closes the sounding
/// note first. Notes still held at the end of the track end at its last tick.
fn pair_notes(track: &Track) -> Vec<HeldSpan> {
    let mut active: HashMap<(u8, u8), u64> = HashMap::new();
    let mut spans = Vec::new();

    for event in &track.events {
        match event.kind {
            EventKind::NoteOn { channel, pitch, velocity } if velocity > 0 => {
                if let Some(start) = active.insert((channel, pitch), event.tick) {
                    spans.push(HeldSpan { pitch, start, end: event.tick });
                }
            }
            EventKind::NoteOn { channel, pitch, .. } | EventKind::NoteOff { channel, pitch, .. } => {
                match active.remove(&(channel, pitch)) {
                    Some(start) => spans.push(HeldSpan { pitch, start, end: event.tick }),
                    None => log::warn!(
                        "Unpaired note-off for pitch {} on channel {} at tick {}",
                        pitch,
                        channel,
                        event.tick
                    ),
                }
            }
            _ => {}
        }
    }

    let end = track.end_tick();
    spans.extend(
        active
            .into_iter()
            .map(|((_, pitch), start)| HeldSpan { pitch, start, end }),
    );

    spans.sort_by_key(|s| (s.start, s.pitch));
    spans
}

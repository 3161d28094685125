#![allow(dead_code)]

use std::path::Path;

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

pub fn note_on(pitch: u8, vel: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: 0.into(),
        message: MidiMessage::NoteOn { key: pitch.into(), vel: vel.into() },
    }
}

pub fn note_off(pitch: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: 0.into(),
        message: MidiMessage::NoteOff { key: pitch.into(), vel: 0.into() },
    }
}

/// Serialize tracks of `(delta, kind)` pairs into SMF bytes.
pub fn smf_bytes(ppq: u16, tracks: Vec<Vec<(u32, TrackEventKind<'static>)>>) -> Vec<u8> {
    let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(ppq.into())));
    for events in tracks {
        let mut track: Vec<TrackEvent> = events
            .into_iter()
            .map(|(delta, kind)| TrackEvent { delta: delta.into(), kind })
            .collect();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
    }
    let mut bytes = Vec::new();
    smf.write(&mut bytes).unwrap();
    bytes
}

/// A monophonic line of `(pitch, length_in_ticks)` notes, back to back.
pub fn melody_track(notes: &[(u8, u32)]) -> Vec<(u32, TrackEventKind<'static>)> {
    let mut events = Vec::new();
    for &(pitch, len) in notes {
        events.push((0, note_on(pitch, 100)));
        events.push((len, note_off(pitch)));
    }
    events
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};

use crate::{Error, Result};

/// Microseconds per beat assumed until the first tempo event (120 BPM).
pub const DEFAULT_MICROS_PER_BEAT: u32 = 500_000;

/// Time base declared in the file header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Timing {
    /// Ticks per quarter note.
    Metrical { ticks_per_beat: u16 },
    /// SMPTE timecode: ticks per second (frames/s * subframes).
    Timecode { ticks_per_second: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    ProgramChange { channel: u8, program: u8 },
    Tempo { micros_per_beat: u32 },
    TrackName(String),
    EndOfTrack,
    Other,
}

/// One event with its delta field and the absolute tick reconstructed from it.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    pub tick: u64,
    pub delta: u32,
    pub kind: EventKind,
}

#[derive(Clone, Debug, Default)]
pub struct Track {
    pub name: Option<String>,
    pub events: Vec<TimedEvent>,
}

impl Track {
    /// Absolute tick of the last event, 0 for an empty track.
    pub fn end_tick(&self) -> u64 {
        self.events.last().map_or(0, |e| e.tick)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_beat: u32,
}

/// Parsed MIDI container: resolution, per-track events, merged tempo map.
#[derive(Clone, Debug)]
pub struct Timeline {
    pub timing: Timing,
    pub tracks: Vec<Track>,
    pub tempo_map: Vec<TempoChange>,
}

/// Read and parse a MIDI file.
///
/// The file is read in a single call and closed before parsing starts.
pub fn read_timeline(path: &Path) -> Result<Timeline> {
    let data = std::fs::read(path).map_err(|e| Error::from_io(path, e))?;
    let timeline = parse_timeline(&data)?;

    log::info!(
        "Read MIDI timeline from {}: {} tracks, {} events, {:?}",
        path.display(),
        timeline.tracks.len(),
        timeline.tracks.iter().map(|t| t.events.len()).sum::<usize>(),
        timeline.timing
    );

    Ok(timeline)
}

/// Walk the chunk headers of a bare SMF: every chunk must be `MThd` or
/// `MTrk` and lie entirely inside the file.
fn check_chunks(data: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < data.len() {
        let header = data
            .get(offset..offset + 8)
            .ok_or_else(|| Error::Format(format!("truncated chunk header at byte {}", offset)))?;
        let id = &header[..4];
        if id != b"MThd" && id != b"MTrk" {
            return Err(Error::Format(format!(
                "unknown chunk {:?} at byte {}",
                String::from_utf8_lossy(id),
                offset
            )));
        }
        let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        offset = offset
            .checked_add(8 + len)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| Error::Format(format!("chunk at byte {} runs past end of file", offset)))?;
    }
    Ok(())
}

/// Parse an in-memory MIDI container.
///
/// Unknown chunks and truncated chunks are rejected. RIFF-wrapped files are
/// left to midly.
pub fn parse_timeline(data: &[u8]) -> Result<Timeline> {
    if data.starts_with(b"MThd") {
        check_chunks(data)?;
    }
    let smf = Smf::parse(data)?;

    let timing = match smf.header.timing {
        midly::Timing::Metrical(tpb) => {
            let ticks_per_beat = tpb.as_int();
            if ticks_per_beat == 0 {
                return Err(Error::Format("ticks per beat is zero".into()));
            }
            Timing::Metrical { ticks_per_beat }
        }
        midly::Timing::Timecode(fps, subframes) => {
            let ticks_per_second = fps.as_f32() as f64 * subframes as f64;
            if ticks_per_second <= 0.0 {
                return Err(Error::Format("timecode resolution is zero".into()));
            }
            Timing::Timecode { ticks_per_second }
        }
    };

    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut tempo_map: Vec<TempoChange> = Vec::new();

    for raw in &smf.tracks {
        let mut track = Track::default();
        let mut tick: u64 = 0;

        for event in raw {
            let delta = event.delta.as_int();
            tick += delta as u64;

            let kind = match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                            channel,
                            pitch: key.as_int(),
                            velocity: vel.as_int(),
                        },
                        MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
                            channel,
                            pitch: key.as_int(),
                            velocity: vel.as_int(),
                        },
                        MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
                            channel,
                            program: program.as_int(),
                        },
                        _ => EventKind::Other,
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    let micros_per_beat = t.as_int();
                    tempo_map.push(TempoChange { tick, micros_per_beat });
                    EventKind::Tempo { micros_per_beat }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    let name = String::from_utf8_lossy(name).trim().to_string();
                    if track.name.is_none() && !name.is_empty() {
                        track.name = Some(name.clone());
                    }
                    EventKind::TrackName(name)
                }
                TrackEventKind::Meta(MetaMessage::EndOfTrack) => EventKind::EndOfTrack,
                _ => EventKind::Other,
            };

            track.events.push(TimedEvent { tick, delta, kind });
        }

        tracks.push(track);
    }

    // Later tracks win when two tempo events share a tick
    tempo_map.sort_by_key(|t| t.tick);
    tempo_map.reverse();
    tempo_map.dedup_by_key(|t| t.tick);
    tempo_map.reverse();

    Ok(Timeline {
        timing,
        tracks,
        tempo_map,
    })
}

impl Timeline {
    /// Ticks per quarter note. Timecode files report the ticks that span one
    /// beat at the default tempo.
    pub fn ticks_per_beat(&self) -> f64 {
        match self.timing {
            Timing::Metrical { ticks_per_beat } => ticks_per_beat as f64,
            Timing::Timecode { ticks_per_second } => {
                ticks_per_second * DEFAULT_MICROS_PER_BEAT as f64 / 1_000_000.0
            }
        }
    }

    pub fn ticks_to_beats(&self, tick: u64) -> f64 {
        tick as f64 / self.ticks_per_beat()
    }

    /// Absolute seconds for `tick`, following the tempo map.
    pub fn ticks_to_seconds(&self, tick: u64) -> f64 {
        let tpb = match self.timing {
            Timing::Metrical { ticks_per_beat } => ticks_per_beat as f64,
            Timing::Timecode { ticks_per_second } => return tick as f64 / ticks_per_second,
        };

        let mut seconds = 0.0;
        let mut last_tick = 0u64;
        let mut micros_per_beat = DEFAULT_MICROS_PER_BEAT as f64;

        for change in &self.tempo_map {
            if change.tick >= tick {
                break;
            }
            seconds += ((change.tick - last_tick) as f64 / tpb) * (micros_per_beat / 1_000_000.0);
            last_tick = change.tick;
            micros_per_beat = change.micros_per_beat as f64;
        }

        seconds + ((tick - last_tick) as f64 / tpb) * (micros_per_beat / 1_000_000.0)
    }

    /// Onsets in beats of every note-on event, track by track.
    pub fn note_on_beats(&self, include_silent: bool) -> Vec<f64> {
        self.tracks
            .iter()
            .flat_map(|track| track.events.iter())
            .filter(|e| match e.kind {
                EventKind::NoteOn { velocity, .. } => include_silent || velocity > 0,
                _ => false,
            })
            .map(|e| self.ticks_to_beats(e.tick))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use midly::{Format, Header, TrackEvent};

    fn smf_bytes(ppq: u16, tracks: Vec<Vec<(u32, TrackEventKind<'static>)>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::Parallel, midly::Timing::Metrical(ppq.into())));
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

    fn note_on(pitch: u8, vel: u8) -> TrackEventKind<'static> {
        TrackEventKind::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn { key: pitch.into(), vel: vel.into() },
        }
    }

    #[test]
    fn accumulates_delta_times() {
        let bytes = smf_bytes(480, vec![vec![(0, note_on(60, 90)), (480, note_on(60, 0)), (240, note_on(62, 90))]]);
        let timeline = parse_timeline(&bytes).unwrap();

        let ticks: Vec<u64> = timeline.tracks[0].events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 480, 720, 720]);
        assert_eq!(timeline.timing, Timing::Metrical { ticks_per_beat: 480 });
    }

    #[test]
    fn tempo_map_drives_seconds() {
        let tempo = TrackEventKind::Meta(MetaMessage::Tempo(250_000.into()));
        let bytes = smf_bytes(480, vec![vec![(960, tempo), (0, note_on(60, 90))]]);
        let timeline = parse_timeline(&bytes).unwrap();

        // 2 beats at 120 BPM, then 1 beat at 240 BPM
        assert_relative_eq!(timeline.ticks_to_seconds(960), 1.0, epsilon = 1e-9);
        assert_relative_eq!(timeline.ticks_to_seconds(1440), 1.25, epsilon = 1e-9);
        assert_relative_eq!(timeline.ticks_to_beats(1440), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn default_tempo_without_tempo_events() {
        let bytes = smf_bytes(480, vec![vec![(0, note_on(60, 90))]]);
        let timeline = parse_timeline(&bytes).unwrap();
        assert!(timeline.tempo_map.is_empty());
        assert_relative_eq!(timeline.ticks_to_seconds(480), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn keeps_track_names() {
        let name = TrackEventKind::Meta(MetaMessage::TrackName(b"Lead"));
        let bytes = smf_bytes(96, vec![vec![(0, name), (0, note_on(64, 80))]]);
        let timeline = parse_timeline(&bytes).unwrap();
        assert_eq!(timeline.tracks[0].name.as_deref(), Some("Lead"));
    }

    #[test]
    fn note_on_beats_optionally_skips_silent() {
        let bytes = smf_bytes(480, vec![vec![(0, note_on(60, 90)), (480, note_on(60, 0)), (0, note_on(62, 90))]]);
        let timeline = parse_timeline(&bytes).unwrap();
        assert_eq!(timeline.note_on_beats(true), vec![0.0, 1.0, 1.0]);
        assert_eq!(timeline.note_on_beats(false), vec![0.0, 1.0]);
    }

    #[test]
    fn timecode_files_count_ticks_per_second() {
        // 25 fps x 40 subframes = 1000 ticks per second
        let mut smf = Smf::new(Header::new(Format::SingleTrack, midly::Timing::Timecode(midly::Fps::Fps25, 40)));
        smf.tracks.push(vec![
            TrackEvent { delta: 0.into(), kind: note_on(60, 90) },
            TrackEvent { delta: 1000.into(), kind: note_on(62, 90) },
            TrackEvent { delta: 0.into(), kind: TrackEventKind::Meta(MetaMessage::EndOfTrack) },
        ]);
        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();

        let timeline = parse_timeline(&bytes).unwrap();
        assert_eq!(timeline.timing, Timing::Timecode { ticks_per_second: 1000.0 });
        assert_relative_eq!(timeline.ticks_per_beat(), 500.0, epsilon = 1e-9);
        assert_relative_eq!(timeline.ticks_to_seconds(1000), 1.0, epsilon = 1e-9);
        assert_relative_eq!(timeline.ticks_to_seconds(250), 0.25, epsilon = 1e-9);
        assert_eq!(timeline.note_on_beats(true), vec![0.0, 2.0]);
    }

    #[test]
    fn chunk_walk_rejects_unknown_ids() {
        let mut bytes = smf_bytes(96, vec![vec![(0, note_on(60, 90))]]);
        assert!(check_chunks(&bytes).is_ok());
        bytes.extend_from_slice(b"XFIH\0\0\0\x02ab");
        assert!(matches!(check_chunks(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_timeline(b"definitely not a midi file").unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}

//! Sequential note playback through a [`NoteSink`].
//!
//! The sink is opened inside [`play`] and dropped when it returns. Every note
//! on is matched by a note off, including when a sink call fails or playback
//! is cancelled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::harmony::NoteEvent;
use crate::Result;

/// Something that can sound notes.
pub trait NoteSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<()>;
    fn note_off(&mut self, pitch: u8, velocity: u8) -> Result<()>;
    /// Block for `duration` while the current note sounds.
    fn wait(&mut self, duration: Duration);
}

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub ms_per_beat: u64,
    pub velocity: u8,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            ms_per_beat: 500,
            velocity: 127,
        }
    }
}

/// Shared stop flag, checked between notes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed { notes_played: usize },
    Cancelled { notes_played: usize },
}

/// Releases its note when dropped unless [`HeldNote::release`] already did.
struct HeldNote<'a, S: NoteSink> {
    sink: &'a mut S,
    pitch: u8,
    velocity: u8,
    released: bool,
}

impl<'a, S: NoteSink> HeldNote<'a, S> {
    fn release(mut self) -> Result<()> {
        self.released = true;
        self.sink.note_off(self.pitch, self.velocity)
    }
}

impl<S: NoteSink> Drop for HeldNote<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.sink.note_off(self.pitch, self.velocity) {
                log::warn!("Failed to release note {}: {}", self.pitch, e);
            }
        }
    }
}

fn note_length(duration_beats: f64, ms_per_beat: u64) -> Duration {
    let ms = duration_beats.max(0.0) * ms_per_beat as f64;
    if ms.is_finite() {
        Duration::from_secs_f64(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Play `notes` in onset order on a sink produced by `open`.
///
/// An empty list returns at once without calling `open`.
pub fn play<S, F>(
    notes: &[NoteEvent],
    open: F,
    options: &PlaybackOptions,
    cancel: &CancelToken,
) -> Result<PlaybackOutcome>
where
    S: NoteSink,
    F: FnOnce() -> Result<S>,
{
    if notes.is_empty() {
        return Ok(PlaybackOutcome::Completed { notes_played: 0 });
    }

    let mut ordered: Vec<&NoteEvent> = notes.iter().collect();
    ordered.sort_by(|a, b| a.onset_beats.total_cmp(&b.onset_beats));

    let mut sink = open()?;
    log::info!("Playing {} notes", ordered.len());

    let mut played = 0;
    for note in ordered {
        let velocity = options.velocity;
        if let Err(e) = sink.note_on(note.pitch, velocity) {
            // Release even when the note-on failed
            if let Err(off) = sink.note_off(note.pitch, velocity) {
                log::warn!("Failed to release note {}: {}", note.pitch, off);
            }
            return Err(e);
        }

        let mut held = HeldNote {
            sink: &mut sink,
            pitch: note.pitch,
            velocity,
            released: false,
        };
        held.sink.wait(note_length(note.duration_beats, options.ms_per_beat));
        held.release()?;
        played += 1;

        if cancel.is_cancelled() {
            log::info!("Playback cancelled after {} notes", played);
            return Ok(PlaybackOutcome::Cancelled { notes_played: played });
        }
    }

    Ok(PlaybackOutcome::Completed { notes_played: played })
}

/// Sink that only logs, for machines without a MIDI output.
#[derive(Debug, Default)]
pub struct LogSink;

impl NoteSink for LogSink {
    fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<()> {
        log::info!("note on  {:>3} vel {}", pitch, velocity);
        Ok(())
    }

    fn note_off(&mut self, pitch: u8, _velocity: u8) -> Result<()> {
        log::debug!("note off {:>3}", pitch);
        Ok(())
    }

    fn wait(&mut self, _duration: Duration) {}
}

#[cfg(feature = "device")]
pub use device::MidirSink;

#[cfg(feature = "device")]
mod device {
    use std::time::Duration;

    use midir::{MidiOutput, MidiOutputConnection};

    use super::NoteSink;
    use crate::{Error, Result};

    const NOTE_ON: u8 = 0x90;
    const NOTE_OFF: u8 = 0x80;
    const PROGRAM_CHANGE: u8 = 0xC0;

    /// MIDI output port on channel 1, set to program 0.
    pub struct MidirSink {
        conn: Option<MidiOutputConnection>,
    }

    impl MidirSink {
        /// Connect to the first output port whose name contains `port`, or the
        /// first port when `port` is `None`.
        pub fn open(port: Option<&str>) -> Result<Self> {
            let output = MidiOutput::new("motif").map_err(|e| Error::Device(e.to_string()))?;
            let ports = output.ports();
            let chosen = ports
                .iter()
                .find(|p| match port {
                    Some(wanted) => output.port_name(p).map(|n| n.contains(wanted)).unwrap_or(false),
                    None => true,
                })
                .ok_or_else(|| Error::Device(format!("no MIDI output port matching {:?}", port)))?;

            let name = output.port_name(chosen).unwrap_or_default();
            let mut conn = output
                .connect(chosen, "motif-playback")
                .map_err(|e| Error::Device(e.to_string()))?;
            conn.send(&[PROGRAM_CHANGE, 0])
                .map_err(|e| Error::Device(e.to_string()))?;
            log::info!("Opened MIDI output: {}", name);

            Ok(Self { conn: Some(conn) })
        }

        fn send(&mut self, message: &[u8]) -> Result<()> {
            match self.conn.as_mut() {
                Some(conn) => conn.send(message).map_err(|e| Error::Device(e.to_string())),
                None => Err(Error::Device("output closed".into())),
            }
        }
    }

    impl NoteSink for MidirSink {
        fn note_on(&mut self, pitch: u8, velocity: u8) -> Result<()> {
            self.send(&[NOTE_ON, pitch & 0x7F, velocity & 0x7F])
        }

        fn note_off(&mut self, pitch: u8, velocity: u8) -> Result<()> {
            self.send(&[NOTE_OFF, pitch & 0x7F, velocity & 0x7F])
        }

        fn wait(&mut self, duration: Duration) {
            std::thread::sleep(duration);
        }
    }

    impl Drop for MidirSink {
        fn drop(&mut self) {
            if let Some(conn) = self.conn.take() {
                conn.close();
                log::debug!("Closed MIDI output");
            }
        }
    }
}

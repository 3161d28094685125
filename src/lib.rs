//! Rhythm, harmony and spectral feature extraction for MIDI and audio files.
//!
//! Every extractor is a pure function from plain input data to a plain
//! descriptor record:
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`midi::timeline`] | MIDI bytes or path | [`midi::Timeline`] |
//! | [`midi::rhythm`] | onset times in beats | [`midi::RhythmPattern`] |
//! | [`harmony`] | [`harmony::Score`] or MIDI path | [`harmony::MelodyAnalysis`] |
//! | [`audio::rhythm`] | mono samples | [`audio::AudioRhythmAnalysis`] |
//! | [`audio::spectral`] | mono samples | [`audio::SpectralFeatures`] |
//!
//! [`playback`] drives a [`playback::NoteSink`] from a note list.

#![forbid(unsafe_code)]

pub mod error;
pub use error::{Error, Result};

pub mod audio;
pub mod harmony;
pub mod midi;
pub mod playback;

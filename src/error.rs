use std::path::PathBuf;

/// Errors surfaced by the extraction pipeline and the playback adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input path does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// MIDI container could not be parsed.
    #[error("malformed MIDI container: {0}")]
    Format(String),

    /// Score content is malformed.
    #[error("malformed score: {0}")]
    Parse(String),

    /// Score has no pitched elements, so no key can be estimated.
    #[error("score contains no pitched elements")]
    EmptyScore,

    /// Audio data is empty when a non-empty signal was required.
    #[error("audio data is empty")]
    EmptyAudio,

    /// Numeric input outside the operation's domain.
    #[error("invalid value for `{name}`: {value} ({reason})")]
    Domain {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Audio container or codec errors.
    #[error("failed to decode audio: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// Playback device errors.
    #[error("playback device error: {0}")]
    Device(String),

    /// File I/O errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::Format(e.to_string())
    }
}

impl Error {
    /// Map an I/O error on `path`, turning a missing file into [`Error::NotFound`].
    pub(crate) fn from_io(path: &std::path::Path, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    }
}

/// Convenience Result type for motif operations.
pub type Result<T> = std::result::Result<T, Error>;

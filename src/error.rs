//! Error types for shared-radio.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File missing or unreadable.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Audio that could not be decoded (unsupported or corrupt WAV, empty bed).
    #[error("format: {0}")]
    Format(String),

    /// Invalid station configuration.
    #[error("config: {0}")]
    Config(String),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected failure inside the producer loop. Ends the broadcast.
    #[error("producer: {0}")]
    ProducerFatal(String),
}

impl Error {
    /// Whether the producer may drop the current unit and carry on.
    ///
    /// Load failures (`Io`, `Format`) only cost one unit of playback;
    /// anything else terminates the broadcast.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Format(_))
    }
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        match error {
            hound::Error::IoError(io) => Error::Io(io),
            other => Error::Format(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_failures_are_skippable() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io.is_skippable());
        assert!(Error::Format("bad header".into()).is_skippable());
        assert!(!Error::ProducerFatal("render task panicked".into()).is_skippable());
        assert!(!Error::Config("chunk_samples".into()).is_skippable());
    }

    #[test]
    fn hound_io_errors_stay_io() {
        let err: Error =
            hound::Error::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "x")).into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = hound::Error::FormatError("no RIFF tag found").into();
        assert!(matches!(err, Error::Format(_)));
    }
}

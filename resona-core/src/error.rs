use thiserror::Error;

/// All errors produced by resona-core.
#[derive(Debug, Error)]
pub enum ResonaError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no output device found")]
    NoOutputDevice,

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("raw-audio tap error: {0}")]
    Tap(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ResonaError>;

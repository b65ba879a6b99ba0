//! Error types for the playback engine.
//!
//! - `PlaybackError` is what session and transport commands return.
//! - `ProviderError` is produced by a [`ScoreProvider`](crate::ScoreProvider)
//!   when an item cannot be resolved into a score.
//! - `ScoreError` rejects note data outside the score data model; a provider
//!   reports it as a malformed source.
//! - `RendererError` is produced when sound output cannot be acquired.
//!
//! Load and renderer failures are recoverable: the session stays usable and
//! reports them to its observer as well. `InvalidState` means a command was
//! issued to a disposed session and is always returned to the caller.

use crate::score::ItemId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("'{operation}' is not valid after the session was disposed")]
    InvalidState { operation: &'static str },

    #[error("failed to load score: {0}")]
    LoadFailure(#[from] ProviderError),

    #[error("sound output unavailable: {0}")]
    RendererUnavailable(#[from] RendererError),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("item '{0}' not found")]
    NotFound(ItemId),

    #[error("item '{item}' is malformed: {message}")]
    MalformedSource { item: ItemId, message: String },

    #[error("failed to read item '{item}': {source}")]
    Io {
        item: ItemId,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreError {
    #[error("note start time {0} must be finite and not negative")]
    StartTime(f64),

    #[error("note duration {0} must be finite and positive")]
    Duration(f64),

    #[error("note velocity {0} must be within [0, 1]")]
    Velocity(f32),

    #[error("total duration {0} must be finite and not negative")]
    TotalDuration(f64),
}

#[derive(Error, Debug, Clone)]
pub enum RendererError {
    #[error("no output device")]
    NoOutputDevice,

    #[error("output stream error: {0}")]
    Stream(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("failed to write config: {0}")]
    Serialize(#[from] ron::Error),
}

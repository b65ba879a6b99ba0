//! Timed playback of note scores.
//!
//! A [`PlaybackSession`] owns a [`Transport`] (the playback clock and its
//! play/pause/seek state machine), the schedule of note triggers placed on
//! that clock, a [`SoundRenderer`] that sounds the triggers, and a progress
//! reporter that publishes [`PlaybackUpdate`]s for a UI.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod progress;
pub mod score;
pub mod session;
pub mod timing;

pub use audio::{
    CaptureBackend, NullBackend, RendererBackend, SoundRenderer, Trigger, Volume,
};
pub use catalog::{
    CatalogBrowser, CatalogEntry, ItemMetadata, NowPlaying, Selection, StaticCatalog, format_clock,
};
pub use config::SessionConfig;
pub use error::{ConfigError, PlaybackError, ProviderError, RendererError, ScoreError};
pub use events::{ErrorStatus, PlaybackUpdate};
pub use progress::{ProgressReporter, ProgressSnapshot};
pub use score::{DirectoryProvider, ItemId, NoteEvent, Pitch, Score, ScoreProvider, Track};
pub use session::{LoadTicket, PROGRESS_BACKLOG, PlaybackSession, SessionBuilder, SessionStatus};
pub use timing::{Clock, ManualClock, SystemClock, Transport, TransportState};

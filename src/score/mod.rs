mod note;
mod provider;

pub use note::{NoteEvent, ParsePitchError, Pitch};
pub use provider::{DirectoryProvider, ItemId, ScoreProvider};

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};

/// Notes of one instrument line. Order is not significant: scheduling works
/// from each note's absolute start time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    pub notes: Vec<NoteEvent>,
}

impl Track {
    pub fn new(notes: Vec<NoteEvent>) -> Self {
        Self { name: None, notes }
    }

    pub fn named(name: impl Into<String>, notes: Vec<NoteEvent>) -> Self {
        Self {
            name: Some(name.into()),
            notes,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(NoteEvent::end_time).fold(0.0, f64::max)
    }
}

/// A decoded, playable item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScore")]
pub struct Score {
    tracks: Vec<Track>,
    total_duration: f64,
}

#[derive(Deserialize)]
struct RawScore {
    tracks: Vec<Track>,
    #[serde(default)]
    total_duration: f64,
}

impl TryFrom<RawScore> for Score {
    type Error = ScoreError;

    /// A stored duration that ends before the last note is extended.
    fn try_from(raw: RawScore) -> Result<Self, Self::Error> {
        if !(raw.total_duration.is_finite() && raw.total_duration >= 0.0) {
            return Err(ScoreError::TotalDuration(raw.total_duration));
        }
        Ok(Score::with_duration(raw.tracks, raw.total_duration))
    }
}

impl Score {
    /// Builds a score whose total duration is the end of its last note.
    pub fn new(tracks: Vec<Track>) -> Self {
        let total_duration = tracks.iter().map(Track::end_time).fold(0.0, f64::max);
        Self {
            tracks,
            total_duration,
        }
    }

    /// Builds a score with an explicit total duration, e.g. one that ends with
    /// trailing silence. Durations shorter than the last note are extended.
    pub fn with_duration(tracks: Vec<Track>, total_duration: f64) -> Self {
        let mut score = Self::new(tracks);
        if total_duration.is_finite() && total_duration > score.total_duration {
            score.total_duration = total_duration;
        }
        score
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn notes(&self) -> impl Iterator<Item = &NoteEvent> {
        self.tracks.iter().flat_map(|t| t.notes.iter())
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.note_count() == 0
    }
}

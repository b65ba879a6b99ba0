use crate::catalog::NowPlaying;
use crate::progress::ProgressSnapshot;
use crate::score::ItemId;
use crate::timing::TransportState;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorStatus {
    LoadFailed {
        item: Option<ItemId>,
        message: String,
    },
    RendererUnavailable {
        message: String,
    },
}

/// Everything a session reports to its observer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    Loaded {
        now_playing: Option<NowPlaying>,
        total_duration: f64,
    },
    State {
        state: TransportState,
    },
    Progress(ProgressSnapshot),
    /// Playback reached the end of the score.
    Finished,
    /// A resolved item arrived after a newer load and was discarded.
    LoadSuperseded {
        item: ItemId,
    },
    Error(ErrorStatus),
}

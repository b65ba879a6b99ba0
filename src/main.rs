use scoreplay::{
    DirectoryProvider, PlaybackSession, PlaybackUpdate, RendererBackend, Selection, SessionConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(dir), Some(item)) = (args.next(), args.next()) else {
        eprintln!("usage: scoreplay <score-dir> <item> [config.ron]");
        std::process::exit(2);
    };

    let config = match args.next().map(PathBuf::from) {
        Some(path) => match SessionConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => SessionConfig::default(),
    };

    let session = PlaybackSession::builder(Arc::new(DirectoryProvider::new(dir)))
        .backend(output_backend())
        .config(config)
        .spawn();
    let updates = session.updates();

    if let Err(e) = session.load_and_play(Selection::new(item.as_str(), 0)) {
        error!("{}", e);
        std::process::exit(1);
    }

    for update in updates.iter() {
        match update {
            PlaybackUpdate::Loaded { now_playing, total_duration } => {
                let title = now_playing.map(|np| np.title).unwrap_or_default();
                info!("{} ({})", title, scoreplay::format_clock(total_duration));
            }
            PlaybackUpdate::Progress(snapshot) if snapshot.is_playing => {
                info!("{}", snapshot.label());
            }
            PlaybackUpdate::Error(status) => {
                error!("{:?}", status);
                if matches!(status, scoreplay::ErrorStatus::LoadFailed { .. }) {
                    break;
                }
            }
            PlaybackUpdate::Finished => break,
            _ => {}
        }
    }

    session.dispose();
}

#[cfg(feature = "cpal-output")]
fn output_backend() -> Arc<dyn RendererBackend> {
    Arc::new(scoreplay::audio::SynthBackend::new())
}

#[cfg(not(feature = "cpal-output"))]
fn output_backend() -> Arc<dyn RendererBackend> {
    tracing::warn!("built without `cpal-output`, playing silently");
    Arc::new(scoreplay::NullBackend)
}

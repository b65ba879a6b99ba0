//! The playback session: one transport, its schedule, its sound output and
//! its progress reporter behind a single command surface.
//!
//! All state lives on an engine thread. Commands are serialized through one
//! channel and answered synchronously, so the caller observes them in the
//! order issued. Score resolution runs on worker threads; its results come
//! back through a second channel and are applied only if no newer load was
//! issued in the meantime.

use crate::audio::{NullBackend, RendererBackend};
use crate::catalog::{CatalogBrowser, NowPlaying, Selection, StaticCatalog};
use crate::config::SessionConfig;
use crate::error::{PlaybackError, ProviderError};
use crate::events::{ErrorStatus, PlaybackUpdate};
use crate::progress::{ProgressReporter, ProgressSnapshot};
use crate::score::{ItemId, Score, ScoreProvider};
use crate::timing::{Clock, PumpOutcome, SystemClock, Ticker, Transport, TransportState};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

type Reply<T> = Sender<Result<T, PlaybackError>>;

/// Progress samples are skipped while this many updates are still unread.
/// Other updates are always delivered.
pub const PROGRESS_BACKLOG: usize = 64;

enum Command {
    Load {
        score: Score,
        reply: Reply<()>,
    },
    LoadItem {
        selection: Selection,
        autoplay: bool,
        reply: Reply<LoadTicket>,
    },
    Activate {
        selection: Selection,
        reply: Reply<()>,
    },
    Play(Reply<()>),
    Pause(Reply<()>),
    TogglePlayPause(Reply<()>),
    Seek {
        fraction: f64,
        reply: Reply<()>,
    },
    SetVolume {
        level: f32,
        reply: Reply<()>,
    },
    Pump(Reply<PumpOutcome>),
    Status(Reply<SessionStatus>),
    Dispose(Sender<()>),
}

/// Identifies one item load. Only the most recent ticket's score is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub item: ItemId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: TransportState,
    pub position: f64,
    pub total_duration: f64,
    pub progress: f64,
    pub volume: f32,
    pub now_playing: Option<NowPlaying>,
    /// Item whose score is still being resolved.
    pub loading: Option<ItemId>,
    pub has_output: bool,
}

pub struct SessionBuilder {
    provider: Arc<dyn ScoreProvider>,
    catalog: Arc<dyn CatalogBrowser>,
    backend: Arc<dyn RendererBackend>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionBuilder {
    pub fn catalog(mut self, catalog: Arc<dyn CatalogBrowser>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn RendererBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn spawn(self) -> PlaybackSession {
        let (command_tx, command_rx) = channel::unbounded();
        let (update_tx, update_rx) = channel::unbounded();
        let live_timers = Arc::new(AtomicUsize::new(0));
        let engine_timers = live_timers.clone();

        let thread = thread::spawn(move || {
            let (resolved_tx, resolved_rx) = channel::unbounded();
            let mut transport = Transport::new(self.clock, self.backend);
            transport.set_finish_at_end(self.config.finish_at_end);
            // a fresh transport accepts every command
            let _ = transport.set_volume(self.config.volume);

            let engine = Engine {
                transport,
                reporter: ProgressReporter::with_live_counter(
                    self.config.progress_interval(),
                    engine_timers.clone(),
                ),
                driver: None,
                config: self.config,
                live_timers: engine_timers,
                provider: self.provider,
                catalog: self.catalog,
                update_tx,
                resolved_tx,
                generation: 0,
                pending: None,
                now_playing: None,
            };
            engine.run(command_rx, resolved_rx);
        });

        PlaybackSession {
            command_tx,
            update_rx,
            thread: Mutex::new(Some(thread)),
            live_timers,
        }
    }
}

/// Handle to a running session. Commands may be issued from any thread; they
/// are applied one at a time in the order they arrive.
pub struct PlaybackSession {
    command_tx: Sender<Command>,
    update_rx: Receiver<PlaybackUpdate>,
    thread: Mutex<Option<JoinHandle<()>>>,
    live_timers: Arc<AtomicUsize>,
}

impl PlaybackSession {
    pub fn builder(provider: Arc<dyn ScoreProvider>) -> SessionBuilder {
        SessionBuilder {
            provider,
            catalog: Arc::new(StaticCatalog::empty()),
            backend: Arc::new(NullBackend),
            clock: Arc::new(SystemClock::new()),
            config: SessionConfig::default(),
        }
    }

    /// Updates for the observer. Clones share one queue, so a session should
    /// have a single consumer. An observer that falls behind by
    /// [`PROGRESS_BACKLOG`] updates stops receiving progress samples until it
    /// catches up; the queue does not grow without bound while playing.
    pub fn updates(&self) -> Receiver<PlaybackUpdate> {
        self.update_rx.clone()
    }

    /// Makes an already decoded score active, replacing whatever was loaded
    /// or loading before. Playback does not start.
    pub fn load(&self, score: Score) -> Result<(), PlaybackError> {
        self.request("load", |reply| Command::Load { score, reply })
    }

    /// Starts resolving `selection` through the score provider and returns at
    /// once. The score is applied when it arrives unless another load was
    /// issued first.
    pub fn load_item(&self, selection: Selection) -> Result<LoadTicket, PlaybackError> {
        self.request("load_item", |reply| Command::LoadItem {
            selection,
            autoplay: false,
            reply,
        })
    }

    /// Like [`load_item`](Self::load_item), but starts playback once the score is applied.
    pub fn load_and_play(&self, selection: Selection) -> Result<LoadTicket, PlaybackError> {
        self.request("load_and_play", |reply| Command::LoadItem {
            selection,
            autoplay: true,
            reply,
        })
    }

    /// Acts on a click on a catalog item: toggles playback of the current
    /// item, or loads and plays any other.
    pub fn activate(&self, selection: Selection) -> Result<(), PlaybackError> {
        self.request("activate", |reply| Command::Activate { selection, reply })
    }

    pub fn play(&self) -> Result<(), PlaybackError> {
        self.request("play", Command::Play)
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.request("pause", Command::Pause)
    }

    pub fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        self.request("toggle_play_pause", Command::TogglePlayPause)
    }

    /// Moves to `fraction` of the score, clamped to `[0, 1]`.
    pub fn seek(&self, fraction: f64) -> Result<(), PlaybackError> {
        self.request("seek", |reply| Command::Seek { fraction, reply })
    }

    /// Sets the master volume, clamped to `[0, 1]`. Only notes started
    /// afterwards are affected. The volume is kept across loads.
    pub fn set_volume(&self, level: f32) -> Result<(), PlaybackError> {
        self.request("set_volume", |reply| Command::SetVolume { level, reply })
    }

    /// Fires every trigger that is due now and returns once done. The
    /// session does this on its own while playing; hosts that drive a manual
    /// clock call it after moving time.
    pub fn pump(&self) -> Result<PumpOutcome, PlaybackError> {
        self.request("pump", Command::Pump)
    }

    pub fn status(&self) -> Result<SessionStatus, PlaybackError> {
        self.request("status", Command::Status)
    }

    /// Number of periodic timers (renderer driver and progress sampler) alive.
    pub fn live_timers(&self) -> usize {
        self.live_timers.load(Ordering::SeqCst)
    }

    /// Stops playback, releases the sound output and shuts the engine down.
    /// Later calls do nothing; every other command then fails with `InvalidState`.
    pub fn dispose(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        let (ack_tx, ack_rx) = channel::bounded(1);
        if self.command_tx.send(Command::Dispose(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
        if thread.join().is_err() {
            warn!("playback engine panicked");
        }
    }

    fn request<T>(
        &self,
        operation: &'static str,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, PlaybackError> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.command_tx
            .send(command(reply_tx))
            .map_err(|_| PlaybackError::InvalidState { operation })?;
        reply_rx
            .recv()
            .map_err(|_| PlaybackError::InvalidState { operation })?
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct PendingLoad {
    generation: u64,
    selection: Selection,
    autoplay: bool,
}

struct Resolved {
    generation: u64,
    selection: Selection,
    result: Result<Score, ProviderError>,
}

enum LoopAction {
    Continue,
    Shutdown,
}

struct Engine {
    transport: Transport,
    reporter: ProgressReporter,
    driver: Option<Ticker>,
    config: SessionConfig,
    live_timers: Arc<AtomicUsize>,
    provider: Arc<dyn ScoreProvider>,
    catalog: Arc<dyn CatalogBrowser>,
    update_tx: Sender<PlaybackUpdate>,
    resolved_tx: Sender<Resolved>,
    generation: u64,
    pending: Option<PendingLoad>,
    now_playing: Option<NowPlaying>,
}

impl Engine {
    fn run(mut self, command_rx: Receiver<Command>, resolved_rx: Receiver<Resolved>) {
        loop {
            let driver_rx = self
                .driver
                .as_ref()
                .map(|t| t.receiver().clone())
                .unwrap_or_else(channel::never);
            let progress_rx = self
                .reporter
                .ticks()
                .cloned()
                .unwrap_or_else(channel::never);

            crossbeam::select! {
                recv(command_rx) -> command => match command {
                    Ok(command) => {
                        if let LoopAction::Shutdown = self.handle_command(command) {
                            break;
                        }
                    }
                    // every session handle is gone
                    Err(_) => {
                        self.dispose();
                        break;
                    }
                },
                recv(resolved_rx) -> resolved => {
                    if let Ok(resolved) = resolved {
                        self.apply_resolved(resolved);
                    }
                },
                recv(driver_rx) -> _ => {
                    self.pump();
                },
                recv(progress_rx) -> _ => self.sample(),
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> LoopAction {
        match command {
            Command::Load { score, reply } => {
                self.generation += 1;
                if let Some(pending) = self.pending.take() {
                    debug!(item = %pending.selection.item, "pending load superseded");
                }
                let result = self.apply_score(score, None);
                let _ = reply.send(result);
            }
            Command::LoadItem {
                selection,
                autoplay,
                reply,
            } => {
                let _ = reply.send(self.load_item(selection, autoplay));
            }
            Command::Activate { selection, reply } => {
                let _ = reply.send(self.activate(selection));
            }
            Command::Play(reply) => {
                let result = self.transport.play();
                self.after_transport_command();
                let _ = reply.send(result);
            }
            Command::Pause(reply) => {
                let result = self.transport.pause();
                self.after_transport_command();
                let _ = reply.send(result);
            }
            Command::TogglePlayPause(reply) => {
                let result = self.transport.toggle_play_pause();
                self.after_transport_command();
                let _ = reply.send(result);
            }
            Command::Seek { fraction, reply } => {
                let result = self.transport.seek(fraction);
                self.after_transport_command();
                let _ = reply.send(result);
            }
            Command::SetVolume { level, reply } => {
                let _ = reply.send(self.transport.set_volume(level));
            }
            Command::Pump(reply) => {
                let _ = reply.send(Ok(self.pump()));
            }
            Command::Status(reply) => {
                let _ = reply.send(Ok(self.status()));
            }
            Command::Dispose(ack) => {
                self.dispose();
                let _ = ack.send(());
                return LoopAction::Shutdown;
            }
        }
        LoopAction::Continue
    }

    fn load_item(&mut self, selection: Selection, autoplay: bool) -> Result<LoadTicket, PlaybackError> {
        self.generation += 1;
        let generation = self.generation;
        let ticket = LoadTicket {
            generation,
            item: selection.item.clone(),
        };

        let provider = self.provider.clone();
        let resolved_tx = self.resolved_tx.clone();
        let request = selection.clone();
        let spawned = thread::Builder::new()
            .name("score-resolve".into())
            .spawn(move || {
                let result = provider.resolve(&request.item);
                // the engine may be gone; the score is dropped with the message
                let _ = resolved_tx.send(Resolved {
                    generation,
                    selection: request,
                    result,
                });
            });

        if let Err(source) = spawned {
            self.pending = None;
            let error = ProviderError::Io {
                item: selection.item.clone(),
                source,
            };
            self.report_load_failure(Some(selection.item), &error);
            return Err(error.into());
        }

        debug!(item = %selection.item, generation, "resolving item");
        self.pending = Some(PendingLoad {
            generation,
            selection,
            autoplay,
        });
        Ok(ticket)
    }

    fn activate(&mut self, selection: Selection) -> Result<(), PlaybackError> {
        let is_current = self
            .now_playing
            .as_ref()
            .is_some_and(|np| np.selection.item == selection.item);
        let is_loading = self
            .pending
            .as_ref()
            .is_some_and(|p| p.selection.item == selection.item);

        if is_loading {
            return Ok(());
        }
        if is_current && self.pending.is_none() {
            let result = self.transport.toggle_play_pause();
            self.after_transport_command();
            return result;
        }
        self.load_item(selection, true).map(|_| ())
    }

    fn apply_resolved(&mut self, resolved: Resolved) {
        let Resolved {
            generation,
            selection,
            result,
        } = resolved;

        let Some(pending) = self.pending.take_if(|p| p.generation == generation) else {
            debug!(item = %selection.item, generation, "discarding superseded load");
            drop(result);
            self.publish(PlaybackUpdate::LoadSuperseded {
                item: selection.item,
            });
            return;
        };

        match result {
            Ok(score) => {
                if self.apply_score(score, Some(selection)).is_ok() && pending.autoplay {
                    let _ = self.transport.play();
                    self.after_transport_command();
                }
            }
            Err(error) => self.report_load_failure(Some(selection.item), &error),
        }
    }

    /// Tears down the old score's schedule and timers, then activates `score`.
    fn apply_score(&mut self, score: Score, selection: Option<Selection>) -> Result<(), PlaybackError> {
        self.stop_tasks();

        if let Err(error) = self.transport.acquire_output() {
            warn!("{error}; continuing without sound");
            self.publish(PlaybackUpdate::Error(ErrorStatus::RendererUnavailable {
                message: error.to_string(),
            }));
        }

        self.transport.load(Arc::new(score))?;
        self.now_playing = selection.map(|s| NowPlaying::resolve(s, self.catalog.as_ref()));
        if let Some(now_playing) = &self.now_playing {
            info!(title = %now_playing.title, "now playing");
        }

        self.publish(PlaybackUpdate::Loaded {
            now_playing: self.now_playing.clone(),
            total_duration: self.transport.total_duration(),
        });
        self.publish_state();
        Ok(())
    }

    fn report_load_failure(&self, item: Option<ItemId>, error: &ProviderError) {
        warn!("load failed: {error}");
        self.publish(PlaybackUpdate::Error(ErrorStatus::LoadFailed {
            item,
            message: error.to_string(),
        }));
    }

    /// Brings the periodic tasks in line with the transport and tells the
    /// observer where playback stands.
    fn after_transport_command(&mut self) {
        if self.transport.is_playing() {
            self.start_tasks();
            // notes due right now should not wait for the first tick
            self.pump();
        } else {
            self.stop_tasks();
        }
        self.publish_state();
    }

    fn start_tasks(&mut self) {
        if self.driver.is_none() {
            self.driver = Some(Ticker::start(
                self.config.trigger_interval(),
                &self.live_timers,
            ));
        }
        self.reporter.start();
    }

    fn stop_tasks(&mut self) {
        self.driver = None;
        self.reporter.stop();
    }

    fn pump(&mut self) -> PumpOutcome {
        let outcome = self.transport.pump();
        if outcome.finished {
            info!("reached end of score");
            self.stop_tasks();
            self.publish(PlaybackUpdate::Finished);
            self.publish_state();
        }
        outcome
    }

    fn sample(&mut self) {
        if self.update_tx.len() >= PROGRESS_BACKLOG {
            return;
        }
        if let Some(snapshot) = self.reporter.sample(&self.transport) {
            self.publish(PlaybackUpdate::Progress(snapshot));
        }
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.transport.state(),
            position: self.transport.position(),
            total_duration: self.transport.total_duration(),
            progress: self.transport.progress(),
            volume: self.transport.volume().level(),
            now_playing: self.now_playing.clone(),
            loading: self.pending.as_ref().map(|p| p.selection.item.clone()),
            has_output: self.transport.has_output(),
        }
    }

    fn dispose(&mut self) {
        self.stop_tasks();
        self.pending = None;
        self.transport.dispose();
        self.publish_state();
    }

    fn publish_state(&self) {
        self.publish(PlaybackUpdate::State {
            state: self.transport.state(),
        });
        if self.transport.state() != TransportState::Disposed {
            self.publish(PlaybackUpdate::Progress(ProgressSnapshot::of(&self.transport)));
        }
    }

    fn publish(&self, update: PlaybackUpdate) {
        // nobody listening is fine
        let _ = self.update_tx.send(update);
    }
}

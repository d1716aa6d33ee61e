//! # Player Store
//!
//! The in-process owner of [`PlayerState`] and of the single live platform
//! audio handle.
//!
//! ## Overview
//!
//! UI layers hold a cloned [`PlayerStore`], render from [`PlayerStore::subscribe`]
//! and call its mutators. Each mutator performs the platform call first and
//! then dispatches a [`PlayerAction`] through the pure reducer, so state only
//! changes after the platform accepted the command.
//!
//! ## Concurrency
//!
//! Mutators are serialized by a per-store operation lock: a second call waits
//! until the first one finished. `play(a)` racing `play(b)` therefore ends with
//! `b` current and exactly one live handle.
//!
//! Status reports arrive on a task spawned per handle. The task is spawned
//! while the handle is being installed and aborted when the handle is
//! released. Reports from a handle that is no longer current are dropped.
//!
//! ## Failures
//!
//! Platform failures are logged, emitted as [`PlaybackEvent::Error`] and
//! returned. State is left as it was, except that a failed track load resets
//! the store to idle so the UI never shows a track without a backing handle.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{PlayerStore, Track};
//!
//! let store = PlayerStore::from_config(&config, event_bus);
//! store.restore().await?;
//! store.start_persistence();
//!
//! store.play(Track::new("1", "Title", "Artist", "https://cdn/1.mp3")).await?;
//! store.skip_forward().await?;
//! ```

use crate::error::{PlaybackError, Result};
use crate::persistence::{PersistenceWriter, StatePersistence};
use crate::state::{reduce, truncate_ms, PlayerAction, PlayerState};
use crate::track::Track;
use bridge_traits::{
    AudioEngine, AudioHandle, HandleId, HandleStatus, LoadOptions, LoadRequest,
};
use core_runtime::config::{CoreConfig, PlaybackSettings};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, StorageEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Handle of the observable player state.
#[derive(Clone)]
pub struct PlayerStore {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Arc<dyn AudioEngine>,
    settings: PlaybackSettings,
    event_bus: EventBus,
    state: watch::Sender<PlayerState>,
    /// Serializes mutators.
    op_lock: Mutex<()>,
    active: parking_lot::Mutex<Option<ActiveHandle>>,
    persistence: Option<StatePersistence>,
    writer: parking_lot::Mutex<Option<PersistenceWriter>>,
    shut_down: AtomicBool,
}

struct ActiveHandle {
    handle: Arc<dyn AudioHandle>,
    track_id: String,
    status_task: JoinHandle<()>,
}

impl ActiveHandle {
    fn id(&self) -> HandleId {
        self.handle.id()
    }
}

impl PlayerStore {
    /// Creates an idle store.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        settings: PlaybackSettings,
        event_bus: EventBus,
        persistence: Option<StatePersistence>,
    ) -> Self {
        let (state, _) = watch::channel(PlayerState::default());
        Self {
            inner: Arc::new(Inner {
                engine,
                settings,
                event_bus,
                state,
                op_lock: Mutex::new(()),
                active: parking_lot::Mutex::new(None),
                persistence,
                writer: parking_lot::Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Creates an idle store wired to the configured engine and settings store.
    pub fn from_config(config: &CoreConfig, event_bus: EventBus) -> Self {
        let persistence = match (&config.settings_store, config.persistence_active()) {
            (Some(settings), true) => Some(StatePersistence::new(
                settings.clone(),
                config.persistence.storage_key.clone(),
            )),
            _ => None,
        };

        Self::new(
            config.audio_engine.clone(),
            config.playback,
            event_bus,
            persistence,
        )
    }

    /// Current state snapshot.
    pub fn state(&self) -> PlayerState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.inner.state.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Whether a platform handle is currently live.
    pub fn has_handle(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Plays `track`.
    ///
    /// If `track` is already loaded, playback resumes on the existing handle.
    /// Otherwise the previous handle is released and a new one is loaded with
    /// autoplay at the current playback rate. A failed load resets the store
    /// to idle.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play(&self, track: Track) -> Result<()> {
        let _op = self.begin().await?;

        if let Some(handle) = self.inner.handle_for(&track.id) {
            if let Err(e) = handle.play().await {
                return Err(self
                    .inner
                    .report(Some(&track.id), PlaybackError::platform("play", e)));
            }
            self.inner.dispatch(PlayerAction::SetPlaying(true));
            debug!("Resumed current track");
            self.inner.emit(PlaybackEvent::Resumed {
                track_id: track.id.clone(),
                position_ms: self.state().progress,
            });
            return Ok(());
        }

        self.inner.release_handle().await;

        let rate = self.state().playback_rate;
        let options = self.inner.load_options(true, rate, Duration::ZERO);
        let (handle, status) = match self.inner.acquire(&track, options).await {
            Ok(acquired) => acquired,
            Err(e) => {
                self.inner.dispatch(PlayerAction::Reset);
                return Err(self.inner.report(Some(&track.id), e));
            }
        };

        let mut actions = vec![
            PlayerAction::LoadTrack(track.clone()),
            PlayerAction::SetPlaying(true),
        ];
        if let Some(duration) = status.known_duration_ms() {
            actions.push(PlayerAction::SetDuration(duration));
        }
        self.inner.dispatch_all(actions);
        self.inner.install(handle, &track.id);

        info!(title = %track.title, "Track started");
        self.inner.emit(PlaybackEvent::Started {
            track_id: track.id,
            title: track.title,
        });
        Ok(())
    }

    /// Pauses playback. No-op without a handle.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let _op = self.begin().await?;

        let Some((handle, track_id)) = self.inner.current_handle() else {
            debug!("Pause ignored, nothing loaded");
            return Ok(());
        };

        if let Err(e) = handle.pause().await {
            return Err(self
                .inner
                .report(Some(&track_id), PlaybackError::platform("pause", e)));
        }

        self.inner.dispatch(PlayerAction::SetPlaying(false));
        self.inner.emit(PlaybackEvent::Paused {
            track_id,
            position_ms: self.state().progress,
        });
        Ok(())
    }

    /// Stops playback, releases the handle and resets to idle. No-op without
    /// a handle.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let _op = self.begin().await?;

        let Some((handle, track_id)) = self.inner.current_handle() else {
            debug!("Stop ignored, nothing loaded");
            return Ok(());
        };

        if let Err(e) = handle.stop().await {
            return Err(self
                .inner
                .report(Some(&track_id), PlaybackError::platform("stop", e)));
        }

        self.inner.release_handle().await;
        self.inner.dispatch(PlayerAction::Reset);
        info!(track_id = %track_id, "Playback stopped");
        self.inner.emit(PlaybackEvent::Stopped { track_id });
        Ok(())
    }

    /// Moves to `position_ms`, truncated to whole milliseconds with negatives
    /// floored to 0.
    ///
    /// The truncated value goes to the platform and into `progress` as is;
    /// range clamping is left to the platform. No-op without a handle.
    #[instrument(skip(self))]
    pub async fn seek(&self, position_ms: f64) -> Result<()> {
        let _op = self.begin().await?;
        self.seek_locked(position_ms).await
    }

    /// Jumps ahead by the skip interval, stopping at the end of the track.
    /// No-op without a handle or while the duration is unknown.
    #[instrument(skip(self))]
    pub async fn skip_forward(&self) -> Result<()> {
        let _op = self.begin().await?;

        let Some((position, duration)) = self.skip_bounds().await? else {
            return Ok(());
        };
        let target = (position + self.skip_ms()).min(duration);
        self.seek_locked(target).await
    }

    /// Jumps back by the skip interval, stopping at the start of the track.
    /// No-op without a handle or while the duration is unknown.
    #[instrument(skip(self))]
    pub async fn skip_backward(&self) -> Result<()> {
        let _op = self.begin().await?;

        let Some((position, _)) = self.skip_bounds().await? else {
            return Ok(());
        };
        let target = (position - self.skip_ms()).max(0.0);
        self.seek_locked(target).await
    }

    /// Changes playback speed. No-op without a handle.
    #[instrument(skip(self))]
    pub async fn set_playback_rate(&self, rate: f64) -> Result<()> {
        let _op = self.begin().await?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(PlaybackError::InvalidPlaybackRate(rate));
        }

        let Some((handle, track_id)) = self.inner.current_handle() else {
            debug!("Rate change ignored, nothing loaded");
            return Ok(());
        };

        if let Err(e) = handle
            .set_rate(rate, self.inner.settings.preserve_pitch)
            .await
        {
            return Err(self
                .inner
                .report(Some(&track_id), PlaybackError::platform("set_rate", e)));
        }

        self.inner.dispatch(PlayerAction::SetPlaybackRate(rate));
        self.inner
            .emit(PlaybackEvent::RateChanged { track_id, rate });
        Ok(())
    }

    /// Restores the saved snapshot.
    ///
    /// A snapshot with a current track gets a fresh handle, paused at the saved
    /// position and rate. If that handle cannot be loaded the store resets to
    /// idle. An unreadable snapshot is reported as [`StorageEvent::LoadFailed`]
    /// and skipped. Without persistence or a snapshot this does nothing.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<()> {
        let _op = self.begin().await?;

        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };
        let snapshot = match persistence.try_load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(error = %e, "Saved player state is unusable, starting idle");
                self.inner.emit_storage(StorageEvent::LoadFailed {
                    message: e.to_string(),
                });
                return Ok(());
            }
        };

        self.inner.release_handle().await;
        self.inner.dispatch(PlayerAction::Restore(snapshot));

        let state = self.state();
        let Some(track) = state.current_track.clone() else {
            self.inner.emit_storage(StorageEvent::Restored {
                track_id: None,
                position_ms: 0,
            });
            return Ok(());
        };

        let options = self.inner.load_options(
            false,
            state.playback_rate,
            Duration::from_millis(state.progress),
        );
        match self.inner.acquire(&track, options).await {
            Ok((handle, status)) => {
                if let Some(duration) = status.known_duration_ms() {
                    self.inner.dispatch(PlayerAction::SetDuration(duration));
                }
                self.inner.install(handle, &track.id);
                info!(
                    track_id = %track.id,
                    progress = state.progress,
                    "Restored player state"
                );
                self.inner.emit_storage(StorageEvent::Restored {
                    track_id: Some(track.id),
                    position_ms: state.progress,
                });
                Ok(())
            }
            Err(e) => {
                self.inner.dispatch(PlayerAction::Reset);
                Err(self.inner.report(Some(&track.id), e))
            }
        }
    }

    /// Starts writing every state change to the settings store. Idempotent.
    pub fn start_persistence(&self) {
        let Some(persistence) = &self.inner.persistence else {
            return;
        };

        let mut writer = self.inner.writer.lock();
        if writer.is_none() {
            *writer = Some(persistence.spawn_writer(self.subscribe(), self.inner.event_bus.clone()));
            debug!(key = persistence.key(), "Persistence writer started");
        }
    }

    /// Releases the live handle and flushes the last state. The state itself
    /// is kept so it can be restored on the next launch. Later mutators fail
    /// with [`PlaybackError::ShutDown`].
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let _op = self.inner.op_lock.lock().await;
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.inner.release_handle().await;

        let writer = self.inner.writer.lock().take();
        if let Some(writer) = writer {
            writer.shutdown().await;
        }
        info!("Player store shut down");
    }

    async fn begin(&self) -> Result<tokio::sync::MutexGuard<'_, ()>> {
        let guard = self.inner.op_lock.lock().await;
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return Err(PlaybackError::ShutDown);
        }
        Ok(guard)
    }

    fn skip_ms(&self) -> f64 {
        self.inner.settings.skip_interval.as_millis() as f64
    }

    /// Position and duration of the live handle, if a skip can be computed.
    async fn skip_bounds(&self) -> Result<Option<(f64, f64)>> {
        let Some((handle, track_id)) = self.inner.current_handle() else {
            return Ok(None);
        };

        let status = match handle.status().await {
            Ok(status) => status,
            Err(e) => {
                return Err(self
                    .inner
                    .report(Some(&track_id), PlaybackError::platform("status", e)))
            }
        };

        if !status.loaded {
            debug!("Skip ignored, handle not loaded");
            return Ok(None);
        }
        let Some(duration) = status.known_duration_ms() else {
            debug!("Skip ignored, duration unknown");
            return Ok(None);
        };

        Ok(Some((status.position_ms.max(0.0), duration)))
    }

    async fn seek_locked(&self, position_ms: f64) -> Result<()> {
        let Some(target) = truncate_ms(position_ms) else {
            return Err(PlaybackError::InvalidPosition(position_ms));
        };

        let Some((handle, track_id)) = self.inner.current_handle() else {
            debug!("Seek ignored, nothing loaded");
            return Ok(());
        };

        if let Err(e) = handle.set_position(Duration::from_millis(target)).await {
            return Err(self
                .inner
                .report(Some(&track_id), PlaybackError::platform("seek", e)));
        }

        self.inner.dispatch(PlayerAction::SetProgress(target as f64));
        self.inner.emit(PlaybackEvent::PositionChanged {
            track_id,
            position_ms: target,
            duration_ms: self.state().duration,
        });
        Ok(())
    }
}

impl Inner {
    fn dispatch(&self, action: PlayerAction) {
        self.dispatch_all(std::iter::once(action));
    }

    /// Applies `actions` as one state change.
    fn dispatch_all(&self, actions: impl IntoIterator<Item = PlayerAction>) {
        self.state.send_if_modified(|state| {
            let next = actions
                .into_iter()
                .fold(state.clone(), |acc, action| reduce(&acc, action));
            if next == *state {
                return false;
            }
            *state = next;
            true
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }

    fn emit_storage(&self, event: StorageEvent) {
        let _ = self.event_bus.emit(CoreEvent::Storage(event));
    }

    /// Logs `err`, publishes it and hands it back for returning.
    fn report(&self, track_id: Option<&str>, err: PlaybackError) -> PlaybackError {
        error!(
            track_id = track_id,
            kind = ?err.kind(),
            error = %err,
            "Playback operation failed"
        );
        self.emit(PlaybackEvent::Error {
            track_id: track_id.map(str::to_string),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        });
        err
    }

    fn current_handle(&self) -> Option<(Arc<dyn AudioHandle>, String)> {
        self.active
            .lock()
            .as_ref()
            .map(|active| (active.handle.clone(), active.track_id.clone()))
    }

    fn handle_for(&self, track_id: &str) -> Option<Arc<dyn AudioHandle>> {
        self.active
            .lock()
            .as_ref()
            .filter(|active| active.track_id == track_id)
            .map(|active| active.handle.clone())
    }

    fn load_options(&self, autoplay: bool, rate: f64, start_position: Duration) -> LoadOptions {
        LoadOptions {
            autoplay,
            rate,
            start_position,
            volume: self.settings.initial_volume,
            muted: false,
            progress_update_interval: self.settings.status_update_interval,
        }
    }

    /// Loads a handle for `track` and checks that it reports itself loaded.
    async fn acquire(
        &self,
        track: &Track,
        options: LoadOptions,
    ) -> Result<(Arc<dyn AudioHandle>, HandleStatus)> {
        let request = LoadRequest::new(track.source())
            .with_options(options)
            .with_metadata(track.metadata());

        debug!(
            track_id = %track.id,
            url = %core_runtime::logging::redact_url(&track.url),
            autoplay = options.autoplay,
            "Loading track"
        );

        let handle = self
            .engine
            .load(request)
            .await
            .map_err(|source| PlaybackError::LoadFailed {
                track_id: track.id.clone(),
                source,
            })?;

        let loaded = match handle.status().await {
            Ok(status) if status.loaded => Ok(status),
            Ok(_) => Err(PlaybackError::NotLoaded(track.id.clone())),
            Err(source) => Err(PlaybackError::LoadFailed {
                track_id: track.id.clone(),
                source,
            }),
        };

        match loaded {
            Ok(status) => Ok((handle, status)),
            Err(e) => {
                if let Err(unload) = handle.unload().await {
                    warn!(track_id = %track.id, error = %unload, "Failed to unload broken handle");
                }
                Err(e)
            }
        }
    }

    /// Makes `handle` the live handle and starts following its status.
    ///
    /// The status task is spawned under the `active` lock, so its first report
    /// already sees `handle` as current.
    fn install(self: &Arc<Self>, handle: Arc<dyn AudioHandle>, track_id: &str) {
        let previous = {
            let mut active = self.active.lock();
            let status_task = spawn_status_task(
                Arc::downgrade(self),
                handle.id(),
                track_id.to_string(),
                handle.status_updates(),
            );
            active.replace(ActiveHandle {
                handle,
                track_id: track_id.to_string(),
                status_task,
            })
        };
        if let Some(previous) = previous {
            // Callers release first; this only guards the invariant.
            previous.status_task.abort();
            warn!(track_id = %previous.track_id, "Replaced a live handle without releasing it");
        }
    }

    /// Unloads the live handle, if any. Unload failures are logged.
    async fn release_handle(&self) {
        let active = self.active.lock().take();
        let Some(active) = active else {
            return;
        };

        active.status_task.abort();
        if let Err(e) = active.handle.unload().await {
            warn!(track_id = %active.track_id, error = %e, "Failed to unload handle");
        } else {
            debug!(track_id = %active.track_id, "Released handle");
        }
    }

    /// Applies a status report if it comes from the live handle.
    fn apply_status(&self, id: HandleId, track_id: &str, status: HandleStatus) -> bool {
        let current = self.active.lock().as_ref().map(ActiveHandle::id);
        if current != Some(id) {
            return false;
        }

        self.dispatch(PlayerAction::ApplyStatus(status));

        if status.did_just_finish {
            info!(track_id = %track_id, "Track completed");
            self.emit(PlaybackEvent::Completed {
                track_id: track_id.to_string(),
            });
        }
        true
    }
}

fn spawn_status_task(
    inner: Weak<Inner>,
    id: HandleId,
    track_id: String,
    mut updates: watch::Receiver<HandleStatus>,
) -> JoinHandle<()> {
    // Ends when the handle is released (abort), dropped (channel closed) or
    // the store is gone.
    tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = *updates.borrow_and_update();
            let Some(inner) = inner.upgrade() else {
                break;
            };
            if !inner.apply_status(id, &track_id, status) {
                debug!(track_id = %track_id, "Dropping report from superseded handle");
            }
        }
    })
}

impl std::fmt::Debug for PlayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        let has_handle = self.has_handle();
        f.debug_struct("PlayerStore")
            .field("state", &state)
            .field("has_handle", &has_handle)
            .field("persistence", &self.inner.persistence)
            .finish()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.status_task.abort();
        }
    }
}

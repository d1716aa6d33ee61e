//! # State Persistence
//!
//! Saves the last-known [`PlayerState`] to the host key/value store and reads
//! it back at startup.
//!
//! Reads never fail: a missing, unreadable or corrupt snapshot is treated as
//! "nothing saved" so a bad record cannot keep the player from starting.
//! Writes are save-through: [`StatePersistence::spawn_writer`] follows the
//! store's state channel and writes every change in the background, so
//! mutators never wait on storage. Intermediate states may be skipped; the
//! latest one always wins.

use crate::error::Result;
use crate::state::PlayerState;
use bridge_traits::SettingsStore;
use core_runtime::config::DEFAULT_STORAGE_KEY;
use core_runtime::events::{CoreEvent, EventBus, StorageEvent};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reads and writes the player snapshot under a single key.
#[derive(Clone)]
pub struct StatePersistence {
    settings: Arc<dyn SettingsStore>,
    key: String,
}

impl StatePersistence {
    pub fn new(settings: Arc<dyn SettingsStore>, key: impl Into<String>) -> Self {
        Self {
            settings,
            key: key.into(),
        }
    }

    /// Persistence under `@audio_player_state`.
    pub fn with_default_key(settings: Arc<dyn SettingsStore>) -> Self {
        Self::new(settings, DEFAULT_STORAGE_KEY)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the saved snapshot, or `None` if there is no usable one.
    pub async fn load(&self) -> Option<PlayerState> {
        match self.try_load().await {
            Ok(state) => state,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Ignoring unusable player state");
                None
            }
        }
    }

    /// Like [`load`](Self::load), but reports read and parse failures.
    pub async fn try_load(&self) -> Result<Option<PlayerState>> {
        let Some(raw) = self.settings.get_string(&self.key).await? else {
            debug!(key = %self.key, "No saved player state");
            return Ok(None);
        };

        let state: PlayerState = serde_json::from_str(&raw)?;
        debug!(
            key = %self.key,
            track_id = state.current_track_id(),
            progress = state.progress,
            "Loaded player state"
        );
        Ok(Some(state))
    }

    /// Writes `state` as the current snapshot.
    pub async fn save(&self, state: &PlayerState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.settings.set_string(&self.key, &json).await?;
        debug!(key = %self.key, bytes = json.len(), "Saved player state");
        Ok(())
    }

    /// Removes the snapshot.
    pub async fn clear(&self) -> Result<()> {
        self.settings.delete(&self.key).await?;
        info!(key = %self.key, "Cleared player state");
        Ok(())
    }

    /// Starts the background writer.
    ///
    /// The state current at subscription time is treated as already saved.
    /// Failures are logged and emitted as [`StorageEvent::SaveFailed`]; the
    /// writer keeps running.
    pub fn spawn_writer(
        &self,
        mut states: watch::Receiver<PlayerState>,
        event_bus: EventBus,
    ) -> PersistenceWriter {
        let persistence = self.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let mut last_saved = states.borrow_and_update().clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = states.borrow_and_update().clone();
                        persistence.write(&state, &mut last_saved, &event_bus).await;
                    }
                    _ = &mut stop_rx => break,
                }
            }

            let state = states.borrow().clone();
            persistence.write(&state, &mut last_saved, &event_bus).await;
            debug!(key = %persistence.key, "Persistence writer stopped");
        });

        PersistenceWriter {
            stop: Some(stop_tx),
            task,
        }
    }

    async fn write(&self, state: &PlayerState, last_saved: &mut PlayerState, event_bus: &EventBus) {
        if state == last_saved {
            return;
        }

        match self.save(state).await {
            Ok(()) => *last_saved = state.clone(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to save player state");
                let _ = event_bus.emit(CoreEvent::Storage(StorageEvent::SaveFailed {
                    message: e.to_string(),
                }));
            }
        }
    }
}

impl std::fmt::Debug for StatePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePersistence")
            .field("settings", &"SettingsStore { ... }")
            .field("key", &self.key)
            .finish()
    }
}

/// Handle to the background writer started by [`StatePersistence::spawn_writer`].
#[derive(Debug)]
pub struct PersistenceWriter {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PersistenceWriter {
    /// Flushes the latest state and waits for the writer to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Persistence writer task failed");
        }
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}

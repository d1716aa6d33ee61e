//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core library.
//! It enforces fail-fast validation to ensure all required bridges are provided
//! before initialization.
//!
//! ## Required Dependencies
//!
//! - `AudioEngine` - Creates the platform stream handles the store drives
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `SettingsStore` - Persists the player snapshot between launches. Without
//!   one, state persistence is disabled.
//!
//! When the `desktop-shims` feature is enabled, a SQLite-backed
//! `SettingsStore` is injected automatically if none is provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .audio_engine(Arc::new(MyEngine))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .skip_interval(Duration::from_secs(30))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing:
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // This will panic with an actionable error message
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing audio engine");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioEngine, AudioSessionConfig, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Settings-store key the player snapshot is written under.
pub const DEFAULT_STORAGE_KEY: &str = "@audio_player_state";

/// Default distance covered by skip forward/backward.
pub const DEFAULT_SKIP_INTERVAL: Duration = Duration::from_secs(15);

/// Default interval between platform status reports.
pub const DEFAULT_STATUS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

const MAX_STATUS_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// Core configuration for the player core.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Host audio engine (required)
    pub audio_engine: Arc<dyn AudioEngine>,

    /// Key-value store for the player snapshot (optional)
    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// Playback tuning
    pub playback: PlaybackSettings,

    /// Snapshot persistence
    pub persistence: PersistenceSettings,

    /// Audio session applied once at startup
    pub audio_session: AudioSessionConfig,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("audio_engine", &"AudioEngine { ... }")
            .field(
                "settings_store",
                &self
                    .settings_store
                    .as_ref()
                    .map(|_| "SettingsStore { ... }"),
            )
            .field("playback", &self.playback)
            .field("persistence", &self.persistence)
            .field("audio_session", &self.audio_session)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

/// Tunables for the playback store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    /// Distance covered by skip forward/backward.
    pub skip_interval: Duration,

    /// Volume handed to every new handle (0.0..=1.0).
    pub initial_volume: f32,

    /// Requested interval between platform status reports.
    pub status_update_interval: Duration,

    /// Keep pitch constant when the playback rate changes.
    pub preserve_pitch: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            skip_interval: DEFAULT_SKIP_INTERVAL,
            initial_volume: 1.0,
            status_update_interval: DEFAULT_STATUS_UPDATE_INTERVAL,
            preserve_pitch: true,
        }
    }
}

impl PlaybackSettings {
    /// Validates the playback settings.
    pub fn validate(&self) -> Result<()> {
        if self.skip_interval.is_zero() {
            return Err(Error::Config(
                "Skip interval must be greater than 0".to_string(),
            ));
        }

        if !self.initial_volume.is_finite() || !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "Initial volume must be between 0.0 and 1.0, got {}",
                self.initial_volume
            )));
        }

        if self.status_update_interval.is_zero() {
            return Err(Error::Config(
                "Status update interval must be greater than 0".to_string(),
            ));
        }

        if self.status_update_interval > MAX_STATUS_UPDATE_INTERVAL {
            return Err(Error::Config(
                "Status update interval exceeds maximum of 10 seconds".to_string(),
            ));
        }

        Ok(())
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceSettings {
    /// Write every state change to the settings store.
    pub enabled: bool,

    /// Key the snapshot is stored under.
    pub storage_key: String,

    /// Load the saved snapshot when the service starts.
    pub restore_on_startup: bool,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            restore_on_startup: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Playback tunables are in range
    /// - Storage key is not empty
    /// - Event buffer is non-zero
    /// - Persistence is only enabled with a settings store
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;

        if self.persistence.storage_key.trim().is_empty() {
            return Err(Error::Config("Storage key cannot be empty".to_string()));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.persistence.enabled && self.settings_store.is_none() {
            return Err(settings_store_missing_error());
        }

        Ok(())
    }

    /// Whether state snapshots are read and written.
    pub fn persistence_active(&self) -> bool {
        self.persistence.enabled && self.settings_store.is_some()
    }
}

fn audio_engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AudioEngine".to_string(),
        message: "AudioEngine implementation is required for playback. \
                 iOS: inject an AVPlayer-backed engine. \
                 Android: inject an ExoPlayer/MediaPlayer-backed engine. \
                 Tests: inject an in-memory fake engine."
            .to_string(),
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for state persistence. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/AsyncStorage/DataStore). \
                 Or disable persistence with .enable_persistence(false)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(path: Option<PathBuf>) -> Result<Option<Arc<dyn SettingsStore>>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let Some(candidate) = path.or_else(SqliteSettingsStore::default_path) else {
        return Ok(None);
    };

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        Ok(runtime.block_on(SqliteSettingsStore::new(path))?)
    };

    // block_on cannot run inside an active runtime, so hop to a plain thread.
    let store = match Handle::try_current() {
        Ok(_) => {
            let path = candidate.clone();
            thread::spawn(move || init_store(path))
                .join()
                .map_err(|_| {
                    Error::Internal(
                        "Worker thread panicked while creating default SettingsStore".to_string(),
                    )
                })??
        }
        Err(_) => init_store(candidate.clone())?,
    };

    tracing::debug!(path = ?candidate, "Using default SQLite settings store");
    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(Some(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(
    _path: Option<PathBuf>,
) -> Result<Option<Arc<dyn SettingsStore>>> {
    Ok(None)
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    audio_engine: Option<Arc<dyn AudioEngine>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_db_path: Option<PathBuf>,
    playback: PlaybackSettings,
    persistence_enabled: Option<bool>,
    storage_key: Option<String>,
    restore_on_startup: Option<bool>,
    audio_session: AudioSessionConfig,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the audio engine implementation (required).
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use core_runtime::config::CoreConfig;
    /// use std::sync::Arc;
    ///
    /// let builder = CoreConfig::builder()
    ///     .audio_engine(Arc::new(MyEngine));
    /// ```
    pub fn audio_engine(mut self, engine: Arc<dyn AudioEngine>) -> Self {
        self.audio_engine = Some(engine);
        self
    }

    /// Sets the settings store used for the player snapshot.
    ///
    /// If not provided, the desktop default (SQLite) is used when the
    /// `desktop-shims` feature is enabled. Otherwise persistence is disabled.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the database file of the desktop default settings store.
    ///
    /// Ignored unless the `desktop-shims` feature is enabled and no explicit
    /// settings store was provided.
    pub fn settings_db_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_db_path = Some(path.into());
        self
    }

    /// Sets the skip forward/backward distance.
    ///
    /// Default: 15 seconds
    pub fn skip_interval(mut self, interval: Duration) -> Self {
        self.playback.skip_interval = interval;
        self
    }

    /// Sets the volume of new handles (0.0..=1.0).
    ///
    /// Default: 1.0
    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.playback.initial_volume = volume;
        self
    }

    /// Sets the requested interval between platform status reports.
    ///
    /// Default: 500 ms
    pub fn status_update_interval(mut self, interval: Duration) -> Self {
        self.playback.status_update_interval = interval;
        self
    }

    /// Keep pitch constant when the playback rate changes.
    ///
    /// Default: true
    pub fn preserve_pitch(mut self, preserve: bool) -> Self {
        self.playback.preserve_pitch = preserve;
        self
    }

    /// Enables or disables snapshot persistence.
    ///
    /// Default: enabled whenever a settings store is available. Enabling it
    /// explicitly without a store fails the build.
    pub fn enable_persistence(mut self, enabled: bool) -> Self {
        self.persistence_enabled = Some(enabled);
        self
    }

    /// Sets the key the snapshot is stored under.
    ///
    /// Default: `@audio_player_state`
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Restore the saved snapshot when the service starts.
    ///
    /// Default: true
    pub fn restore_on_startup(mut self, restore: bool) -> Self {
        self.restore_on_startup = Some(restore);
        self
    }

    /// Sets the audio session applied at startup.
    pub fn audio_session(mut self, session: AudioSessionConfig) -> Self {
        self.audio_session = session;
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The audio engine is missing
    /// - Persistence was explicitly enabled without a settings store
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let audio_engine = self.audio_engine.ok_or_else(audio_engine_missing_error)?;

        let settings_store = match self.settings_store {
            Some(store) => Some(store),
            None if self.persistence_enabled != Some(false) => {
                provide_default_settings_store(self.settings_db_path)?
            }
            None => None,
        };

        let enabled = self
            .persistence_enabled
            .unwrap_or(settings_store.is_some());

        let config = CoreConfig {
            audio_engine,
            settings_store,
            playback: self.playback,
            persistence: PersistenceSettings {
                enabled,
                storage_key: self
                    .storage_key
                    .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
                restore_on_startup: self.restore_on_startup.unwrap_or(true),
            },
            audio_session: self.audio_session,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

//! Core service façade and bootstrap helpers.
//!
//! This crate builds the one [`PlayerStore`] a host application uses, wiring
//! the host-provided bridge implementations (audio engine, settings store)
//! from a [`CoreConfig`]. Desktop apps typically enable the `desktop-shims`
//! feature, which lets the configuration fall back to the SQLite settings
//! store from `bridge-desktop`.
//!
//! Startup order:
//! 1. apply the audio session
//! 2. build the store
//! 3. restore the saved snapshot (paused at the saved position)
//! 4. start writing state changes back to the settings store

pub mod error;

pub use error::{CoreError, Result};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::SqliteSettingsStore;

use std::sync::Arc;

use bridge_traits::AudioEngine;
use core_playback::PlayerStore;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::{info, instrument, warn};

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    store: PlayerStore,
    event_bus: EventBus,
    config: Arc<CoreConfig>,
}

impl CoreService {
    /// Bootstraps the service from `config`.
    ///
    /// Must be called inside a Tokio runtime. A failing audio session or a
    /// snapshot that cannot be restored is logged and does not abort startup;
    /// the player then starts idle.
    #[instrument(skip(config))]
    pub async fn new(config: CoreConfig) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CoreError::InitializationFailed(
                "CoreService must be created inside a Tokio runtime".to_string(),
            ));
        }
        config.validate()?;

        if let Err(e) = config
            .audio_engine
            .configure_session(config.audio_session)
            .await
        {
            warn!(error = %e, "Failed to configure audio session");
        }

        let event_bus = EventBus::new(config.event_buffer_size);
        let store = PlayerStore::from_config(&config, event_bus.clone());

        if config.persistence_active() && config.persistence.restore_on_startup {
            if let Err(e) = store.restore().await {
                warn!(error = %e, "Starting idle, saved state could not be restored");
            }
        }
        store.start_persistence();

        info!(
            persistence = config.persistence_active(),
            skip_interval_ms = config.playback.skip_interval.as_millis() as u64,
            "Core service started"
        );

        Ok(Self {
            store,
            event_bus,
            config: Arc::new(config),
        })
    }

    /// The player store shared by all screens.
    pub fn store(&self) -> &PlayerStore {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stream of playback and storage events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Releases the platform handle and flushes the last state.
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
        info!("Core service shut down");
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the default SQLite settings store for persistence.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example(engine: std::sync::Arc<dyn bridge_traits::AudioEngine>) -> core_service::Result<()> {
/// use core_service::bootstrap_desktop;
///
/// let core = bootstrap_desktop(engine).await?;
/// let state = core.store().state();
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(engine: Arc<dyn AudioEngine>) -> Result<CoreService> {
    let config = CoreConfig::builder().audio_engine(engine).build()?;
    CoreService::new(config).await
}

/// Builds the service for an engine with an explicit settings store.
pub async fn bootstrap_with_settings(
    engine: Arc<dyn AudioEngine>,
    settings: Arc<dyn bridge_traits::SettingsStore>,
) -> Result<CoreService> {
    let config = CoreConfig::builder()
        .audio_engine(engine)
        .settings_store(settings)
        .build()?;
    CoreService::new(config).await
}

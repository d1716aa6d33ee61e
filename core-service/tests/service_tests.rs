//! Bootstrap tests for the core service
//!
//! This test suite verifies:
//! - startup restores the saved snapshot paused at its position
//! - audio session configuration at startup, failures tolerated
//! - a broken snapshot or failed restore leaves the player idle
//! - shutdown flushes the last state for the next launch

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        AudioEngine, AudioHandle, AudioSessionConfig, BridgeError, HandleId, HandleStatus,
        LoadRequest, SettingsStore,
    };
    use core_playback::{PlayerState, StatePersistence, Track};
    use core_runtime::config::CoreConfig;
    use core_runtime::events::{CoreEvent, StorageEvent};
    use core_service::{bootstrap_with_settings, CoreError, CoreService};
    use mockall::mock;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    struct StubHandle {
        id: HandleId,
        status: watch::Sender<HandleStatus>,
    }

    #[async_trait]
    impl AudioHandle for StubHandle {
        fn id(&self) -> HandleId {
            self.id
        }

        async fn play(&self) -> BridgeResult<()> {
            self.status.send_modify(|s| s.playing = true);
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            self.status.send_modify(|s| s.playing = false);
            Ok(())
        }

        async fn stop(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn unload(&self) -> BridgeResult<()> {
            self.status.send_replace(HandleStatus::unloaded());
            Ok(())
        }

        async fn set_position(&self, position: Duration) -> BridgeResult<()> {
            self.status
                .send_modify(|s| s.position_ms = position.as_millis() as f64);
            Ok(())
        }

        async fn set_rate(&self, _rate: f64, _preserve_pitch: bool) -> BridgeResult<()> {
            Ok(())
        }

        async fn status(&self) -> BridgeResult<HandleStatus> {
            Ok(*self.status.borrow())
        }

        fn status_updates(&self) -> watch::Receiver<HandleStatus> {
            self.status.subscribe()
        }
    }

    fn stub_handle(request: &LoadRequest) -> Arc<dyn AudioHandle> {
        let status = HandleStatus::loaded(
            request.options.autoplay,
            request.options.start_position.as_millis() as f64,
            Some(180_000.0),
        );
        let (tx, _) = watch::channel(status);
        Arc::new(StubHandle {
            id: HandleId::new(),
            status: tx,
        })
    }

    mock! {
        Engine {}

        #[async_trait]
        impl AudioEngine for Engine {
            async fn load(&self, request: LoadRequest) -> BridgeResult<Arc<dyn AudioHandle>>;
            async fn configure_session(&self, config: AudioSessionConfig) -> BridgeResult<()>;
        }
    }

    #[derive(Default)]
    struct MemorySettings {
        values: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl SettingsStore for MemorySettings {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.values.lock().insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.values.lock().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.values.lock().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.values.lock().keys().cloned().collect())
        }

        async fn clear_all(&self) -> BridgeResult<()> {
            self.values.lock().clear();
            Ok(())
        }
    }

    fn working_engine() -> MockEngine {
        let mut engine = MockEngine::new();
        engine.expect_configure_session().returning(|_| Ok(()));
        engine
            .expect_load()
            .returning(|request| Ok(stub_handle(&request)));
        engine
    }

    fn episode() -> Track {
        Track::new(
            "ep-7",
            "Episode 7",
            "Some Podcast",
            "https://cdn.example.com/ep-7.mp3",
        )
    }

    async fn seed(settings: &Arc<MemorySettings>, state: &PlayerState) {
        StatePersistence::with_default_key(settings.clone())
            .save(state)
            .await
            .unwrap();
    }

    // ------------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_startup_without_snapshot_is_idle() {
        let settings = Arc::new(MemorySettings::default());
        let core = bootstrap_with_settings(Arc::new(working_engine()), settings)
            .await
            .unwrap();

        assert_eq!(core.store().state(), PlayerState::default());
        assert!(!core.store().has_handle());
        assert!(core.config().persistence_active());
    }

    #[tokio::test]
    async fn test_startup_restores_saved_state_paused() {
        let settings = Arc::new(MemorySettings::default());
        seed(
            &settings,
            &PlayerState {
                is_playing: true,
                current_track: Some(episode()),
                progress: 50_000,
                duration: 180_000,
                playback_rate: 1.5,
            },
        )
        .await;

        let mut engine = MockEngine::new();
        engine.expect_configure_session().returning(|_| Ok(()));
        engine
            .expect_load()
            .withf(|request| {
                !request.options.autoplay
                    && request.options.start_position == Duration::from_millis(50_000)
                    && request.options.rate == 1.5
            })
            .times(1)
            .returning(|request| Ok(stub_handle(&request)));

        let core = bootstrap_with_settings(Arc::new(engine), settings)
            .await
            .unwrap();

        let state = core.store().state();
        assert_eq!(state.current_track_id(), Some("ep-7"));
        assert_eq!(state.progress, 50_000);
        assert_eq!(state.playback_rate, 1.5);
        assert!(!state.is_playing);
        assert!(core.store().has_handle());
    }

    #[tokio::test]
    async fn test_restore_can_be_disabled() {
        let settings = Arc::new(MemorySettings::default());
        seed(
            &settings,
            &PlayerState {
                current_track: Some(episode()),
                progress: 10_000,
                ..PlayerState::default()
            },
        )
        .await;

        let mut engine = MockEngine::new();
        engine.expect_configure_session().returning(|_| Ok(()));
        engine.expect_load().never();

        let config = CoreConfig::builder()
            .audio_engine(Arc::new(engine))
            .settings_store(settings)
            .restore_on_startup(false)
            .build()
            .unwrap();
        let core = CoreService::new(config).await.unwrap();

        assert_eq!(core.store().state(), PlayerState::default());
    }

    #[tokio::test]
    async fn test_failed_restore_starts_idle() {
        let settings = Arc::new(MemorySettings::default());
        seed(
            &settings,
            &PlayerState {
                current_track: Some(episode()),
                progress: 10_000,
                ..PlayerState::default()
            },
        )
        .await;

        let mut engine = MockEngine::new();
        engine.expect_configure_session().returning(|_| Ok(()));
        engine
            .expect_load()
            .returning(|_| Err(BridgeError::OperationFailed("offline".to_string())));

        let core = bootstrap_with_settings(Arc::new(engine), settings)
            .await
            .unwrap();

        assert_eq!(core.store().state(), PlayerState::default());
        assert!(!core.store().has_handle());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_idle() {
        let settings = Arc::new(MemorySettings::default());
        settings
            .set_string("@audio_player_state", "{not json")
            .await
            .unwrap();

        let core = bootstrap_with_settings(Arc::new(working_engine()), settings)
            .await
            .unwrap();

        assert_eq!(core.store().state(), PlayerState::default());
    }

    #[tokio::test]
    async fn test_session_is_configured_at_startup() {
        let session = AudioSessionConfig {
            duck_others: false,
            ..AudioSessionConfig::default()
        };

        let mut engine = MockEngine::new();
        engine
            .expect_configure_session()
            .withf(move |config| *config == session)
            .times(1)
            .returning(|_| Ok(()));

        let config = CoreConfig::builder()
            .audio_engine(Arc::new(engine))
            .enable_persistence(false)
            .audio_session(session)
            .build()
            .unwrap();

        CoreService::new(config).await.unwrap();
    }

    #[tokio::test]
    async fn test_session_failure_does_not_abort_startup() {
        let mut engine = MockEngine::new();
        engine
            .expect_configure_session()
            .returning(|_| Err(BridgeError::NotAvailable("audio session".to_string())));

        let config = CoreConfig::builder()
            .audio_engine(Arc::new(engine))
            .enable_persistence(false)
            .build()
            .unwrap();

        assert!(CoreService::new(config).await.is_ok());
    }

    // ------------------------------------------------------------------------
    // Runtime
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let config = CoreConfig::builder()
            .audio_engine(Arc::new(working_engine()))
            .enable_persistence(false)
            .build()
            .unwrap();
        let core = CoreService::new(config).await.unwrap();
        let mut events = core.subscribe_events();

        core.store().play(episode()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, CoreEvent::Playback(_)));
    }

    #[tokio::test]
    async fn test_restored_event_is_emitted_to_bus() {
        let settings = Arc::new(MemorySettings::default());
        let core = bootstrap_with_settings(Arc::new(working_engine()), settings.clone())
            .await
            .unwrap();
        let mut events = core.subscribe_events();

        core.store().restore().await.unwrap();
        assert!(events.try_recv().is_none());

        seed(
            &settings,
            &PlayerState {
                current_track: Some(episode()),
                progress: 2_000,
                ..PlayerState::default()
            },
        )
        .await;
        core.store().restore().await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Storage(StorageEvent::Restored {
                track_id: Some("ep-7".to_string()),
                position_ms: 2_000,
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_persists_last_state() {
        let settings = Arc::new(MemorySettings::default());
        let core = bootstrap_with_settings(Arc::new(working_engine()), settings.clone())
            .await
            .unwrap();

        core.store().play(episode()).await.unwrap();
        core.store().seek(61_000.0).await.unwrap();
        core.shutdown().await;

        let saved = StatePersistence::with_default_key(settings)
            .load()
            .await
            .unwrap();
        assert_eq!(saved.current_track_id(), Some("ep-7"));
        assert_eq!(saved.progress, 61_000);
        assert!(saved.is_playing);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let config = CoreConfig::builder()
            .audio_engine(Arc::new(working_engine()))
            .enable_persistence(false)
            .build()
            .unwrap();

        let result = futures::executor::block_on(CoreService::new(config));
        assert!(matches!(result, Err(CoreError::InitializationFailed(_))));
    }
}

//! Playback bridge traits and supporting audio types.
//!
//! These abstractions let the core playback store drive the host platform's
//! media API (AVPlayer, ExoPlayer, an HTML audio element, ...) without knowing
//! anything about decoding or output. The host provides an [`AudioEngine`]
//! that turns a [`LoadRequest`] into a live [`AudioHandle`]; the core owns at
//! most one handle at a time and releases it before acquiring the next.

use crate::{error::Result, platform::PlatformSendSync};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// High-level audio source descriptor provided to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Remote HTTP(S) stream resolved and fetched by the host.
    RemoteStream {
        url: String,
        headers: HashMap<String, String>,
    },
}

impl AudioSource {
    /// Build a remote source with no extra request headers.
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    /// The URL the host should open.
    pub fn url(&self) -> &str {
        match self {
            AudioSource::RemoteStream { url, .. } => url,
        }
    }
}

/// Options applied when a handle is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Start playing as soon as the stream is ready.
    pub autoplay: bool,
    /// Initial playback rate (1.0 = normal speed).
    pub rate: f64,
    /// Initial playback position.
    pub start_position: Duration,
    /// Initial volume (0.0 = silent, 1.0 = unity gain).
    pub volume: f32,
    /// Whether the handle starts muted.
    pub muted: bool,
    /// Requested interval between status reports.
    pub progress_update_interval: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            autoplay: false,
            rate: 1.0,
            start_position: Duration::from_secs(0),
            volume: 1.0,
            muted: false,
            progress_update_interval: Duration::from_millis(500),
        }
    }
}

/// Metadata associated with a load request. Implementations may use this to
/// populate lock-screen controls or notification center entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackMetadata {
    /// Opaque track identifier.
    pub track_id: Option<String>,
    /// Display title for the track.
    pub title: Option<String>,
    /// Display artist string.
    pub artist: Option<String>,
    /// Artwork URL, when available.
    pub artwork: Option<String>,
}

/// Request describing the handle a host engine should create.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub source: AudioSource,
    pub options: LoadOptions,
    pub metadata: PlaybackMetadata,
}

impl LoadRequest {
    /// Construct a request for the given source with default options.
    pub fn new(source: AudioSource) -> Self {
        Self {
            source,
            options: LoadOptions::default(),
            metadata: PlaybackMetadata::default(),
        }
    }

    /// Attach load options to the request.
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach metadata to the request.
    pub fn with_metadata(mut self, metadata: PlaybackMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Unique identifier for a handle created by a host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    /// Generate a new handle identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time status reported by a handle.
///
/// Positions are reported as fractional milliseconds, the way most platform
/// media APIs do; the core truncates them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HandleStatus {
    /// Whether the stream is loaded. Unloaded reports carry no position data.
    pub loaded: bool,
    /// Whether audio is currently being rendered.
    pub playing: bool,
    /// Current position in milliseconds.
    pub position_ms: f64,
    /// Stream length in milliseconds, once known.
    pub duration_ms: Option<f64>,
    /// Set on the report emitted when playback reaches the end of the stream.
    pub did_just_finish: bool,
}

impl HandleStatus {
    /// Status of a handle that has not loaded (or has been unloaded).
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Status of a loaded handle.
    pub fn loaded(playing: bool, position_ms: f64, duration_ms: Option<f64>) -> Self {
        Self {
            loaded: true,
            playing,
            position_ms,
            duration_ms,
            did_just_finish: false,
        }
    }

    /// Mark this report as the end-of-stream report.
    pub fn finished(mut self) -> Self {
        self.did_just_finish = true;
        self.playing = false;
        self
    }

    /// Duration if the platform reports a positive length.
    pub fn known_duration_ms(&self) -> Option<f64> {
        self.duration_ms.filter(|d| d.is_finite() && *d > 0.0)
    }
}

/// Audio session behaviour requested from the host at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSessionConfig {
    /// Keep playing when the device's silent switch is on (iOS).
    pub plays_in_silent_mode: bool,
    /// Keep the session alive while the app is backgrounded.
    pub stays_active_in_background: bool,
    /// Lower other apps' audio instead of stopping it (Android).
    pub duck_others: bool,
    /// Route output to the earpiece instead of the speaker (Android).
    pub route_to_earpiece: bool,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            plays_in_silent_mode: true,
            stays_active_in_background: true,
            duck_others: true,
            route_to_earpiece: false,
        }
    }
}

/// Host audio engine capable of creating stream handles.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioEngine: PlatformSendSync {
    /// Open the requested source and return a live handle. The handle must
    /// honour `request.options` (autoplay, rate, start position, volume).
    async fn load(&self, request: LoadRequest) -> Result<Arc<dyn AudioHandle>>;

    /// Apply process-wide audio session settings.
    async fn configure_session(&self, _config: AudioSessionConfig) -> Result<()> {
        Ok(())
    }
}

/// One loaded, playable audio stream owned by the core.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioHandle: PlatformSendSync {
    /// Identifier assigned by the engine.
    fn id(&self) -> HandleId;

    /// Begin or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the position.
    async fn pause(&self) -> Result<()>;

    /// Stop playback and rewind.
    async fn stop(&self) -> Result<()>;

    /// Release all native resources. The handle is unusable afterwards.
    async fn unload(&self) -> Result<()>;

    /// Move to an absolute position. Hosts clamp out-of-range positions.
    async fn set_position(&self, position: Duration) -> Result<()>;

    /// Change playback speed, optionally preserving pitch.
    async fn set_rate(&self, rate: f64, preserve_pitch: bool) -> Result<()>;

    /// Query the current status.
    async fn status(&self) -> Result<HandleStatus>;

    /// Periodic status reports, emitted at roughly the interval requested in
    /// [`LoadOptions::progress_update_interval`]. Intermediate reports may be
    /// coalesced; the latest one is always observable.
    fn status_updates(&self) -> watch::Receiver<HandleStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_options_default_values() {
        let opts = LoadOptions::default();
        assert!(!opts.autoplay);
        assert_eq!(opts.rate, 1.0);
        assert_eq!(opts.start_position, Duration::from_secs(0));
        assert_eq!(opts.volume, 1.0);
        assert!(!opts.muted);
        assert_eq!(opts.progress_update_interval, Duration::from_millis(500));
    }

    #[test]
    fn handle_id_is_unique() {
        let a = HandleId::new();
        let b = HandleId::new();
        assert_ne!(a, b);
        assert_eq!(a, HandleId::from_uuid(*a.as_uuid()));
    }

    #[test]
    fn remote_source_exposes_url() {
        let source = AudioSource::remote("https://example.com/a.mp3");
        assert_eq!(source.url(), "https://example.com/a.mp3");
    }

    #[test]
    fn known_duration_filters_unknown_lengths() {
        assert_eq!(HandleStatus::loaded(true, 0.0, None).known_duration_ms(), None);
        assert_eq!(
            HandleStatus::loaded(true, 0.0, Some(0.0)).known_duration_ms(),
            None
        );
        assert_eq!(
            HandleStatus::loaded(true, 0.0, Some(f64::NAN)).known_duration_ms(),
            None
        );
        assert_eq!(
            HandleStatus::loaded(true, 0.0, Some(1200.5)).known_duration_ms(),
            Some(1200.5)
        );
    }

    #[test]
    fn finished_report_is_not_playing() {
        let status = HandleStatus::loaded(true, 1000.0, Some(1000.0)).finished();
        assert!(status.did_just_finish);
        assert!(!status.playing);
        assert!(status.loaded);
    }
}

//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform-specific pieces it cannot own: the native media API that decodes
//! and renders audio, the local key/value store used for state snapshots, and
//! the host logging pipeline.
//!
//! ## Traits
//!
//! ### Playback
//! - [`AudioEngine`](playback::AudioEngine) - Creates stream handles from a URL
//! - [`AudioHandle`](playback::AudioHandle) - One loaded stream: play/pause/stop/seek/rate, status reports
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Utilities
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop` (settings store) | ✅ In Progress |
//! | iOS      | Host app (AVFoundation, UserDefaults) | 📋 Planned |
//! | Android  | Host app (ExoPlayer, DataStore) | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert native errors to `BridgeError` and keep the
//! message actionable (which URL failed to open, which key failed to write).
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` on native targets so the core can hold
//! them behind `Arc` and call them from spawned tasks.
//!
//! ## Examples
//!
//! ### Implementing AudioEngine
//!
//! ```ignore
//! use bridge_traits::playback::{AudioEngine, AudioHandle, LoadRequest};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! pub struct NativeEngine;
//!
//! #[async_trait]
//! impl AudioEngine for NativeEngine {
//!     async fn load(&self, request: LoadRequest) -> Result<Arc<dyn AudioHandle>> {
//!         // Hand the URL and options to the platform player.
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod platform;
pub mod playback;
pub mod storage;
pub mod logger;

pub use error::BridgeError;

// Re-export commonly used types
pub use playback::{
    AudioEngine, AudioHandle, AudioSessionConfig, AudioSource, HandleId, HandleStatus,
    LoadOptions, LoadRequest, PlaybackMetadata,
};
pub use storage::SettingsStore;
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};

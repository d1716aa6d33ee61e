//! # Playback Error Types
//!
//! Error types for the playback store and its persistence adapter.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Broad failure categories reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The platform could not open or load a stream (network, codec, URL).
    HandleAcquisition,
    /// A call on an existing handle failed (pause/seek/rate on a dead handle).
    PlatformCall,
    /// Reading or writing the state snapshot failed.
    Persistence,
    /// The caller passed an argument the store refuses.
    InvalidInput,
}

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// The platform failed to create a handle for the track.
    #[error("Failed to load track {track_id}: {source}")]
    LoadFailed {
        track_id: String,
        #[source]
        source: BridgeError,
    },

    /// The platform created a handle that never reported itself loaded.
    #[error("Track {0} did not finish loading")]
    NotLoaded(String),

    /// A platform call on the live handle failed.
    #[error("Platform {operation} failed: {source}")]
    Platform {
        operation: &'static str,
        #[source]
        source: BridgeError,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The settings store rejected a read or write.
    #[error("Settings store error: {0}")]
    Storage(#[from] BridgeError),

    /// The snapshot could not be encoded.
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Playback rate must be a positive finite number.
    #[error("Invalid playback rate: {0} (must be positive and finite)")]
    InvalidPlaybackRate(f64),

    /// Seek target must be a finite number of milliseconds.
    #[error("Invalid seek position: {0}")]
    InvalidPosition(f64),

    /// The store was shut down and no longer accepts commands.
    #[error("Player store has been shut down")]
    ShutDown,
}

impl PlaybackError {
    pub(crate) fn platform(operation: &'static str, source: BridgeError) -> Self {
        PlaybackError::Platform { operation, source }
    }

    /// Returns the failure category.
    pub fn kind(&self) -> FailureKind {
        match self {
            PlaybackError::LoadFailed { .. } | PlaybackError::NotLoaded(_) => {
                FailureKind::HandleAcquisition
            }
            PlaybackError::Platform { .. } | PlaybackError::ShutDown => FailureKind::PlatformCall,
            PlaybackError::Storage(_) | PlaybackError::Serialization(_) => {
                FailureKind::Persistence
            }
            PlaybackError::InvalidPlaybackRate(_) | PlaybackError::InvalidPosition(_) => {
                FailureKind::InvalidInput
            }
        }
    }

    /// Returns `true` if invoking the action again may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            PlaybackError::InvalidPlaybackRate(_)
                | PlaybackError::InvalidPosition(_)
                | PlaybackError::ShutDown
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

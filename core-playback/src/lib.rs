//! # Playback Module
//!
//! The playback state core of the player.
//!
//! ## Overview
//!
//! This crate handles:
//! - The [`PlayerState`] snapshot and the pure [`reduce`] transition over [`PlayerAction`]
//! - The [`PlayerStore`] owning the state and the single live platform handle
//! - Save-through persistence of the last state via [`StatePersistence`]
//! - Time formatting for player screens
//!
//! Decoding and output are done by the host platform behind
//! [`bridge_traits::AudioEngine`].

pub mod error;
pub mod format;
pub mod persistence;
pub mod state;
pub mod store;
pub mod track;

pub use error::{FailureKind, PlaybackError, Result};
pub use format::format_time;
pub use persistence::{PersistenceWriter, StatePersistence};
pub use state::{reduce, PlaybackPhase, PlayerAction, PlayerState, DEFAULT_PLAYBACK_RATE};
pub use store::PlayerStore;
pub use track::Track;

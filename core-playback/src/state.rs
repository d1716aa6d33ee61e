//! # Player State and Reducer
//!
//! [`PlayerState`] is the single source of truth for what is playing. It only
//! changes through [`reduce`], a pure transition over [`PlayerAction`]; the
//! store performs platform side effects around each dispatch.
//!
//! The reducer keeps these invariants on every result:
//! - no current track means not playing and progress 0
//! - numeric inputs are truncated to whole milliseconds, negatives clamp to 0,
//!   and non-finite inputs are ignored
//! - the playback rate is always positive

use crate::track::Track;
use bridge_traits::HandleStatus;
use serde::{Deserialize, Serialize};

/// Playback rate of a fresh player.
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

/// Snapshot of the player. Serialized as the persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub is_playing: bool,
    #[serde(default)]
    pub current_track: Option<Track>,
    /// Position in milliseconds.
    #[serde(default)]
    pub progress: u64,
    /// Length in milliseconds, 0 while unknown.
    #[serde(default)]
    pub duration: u64,
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

fn default_playback_rate() -> f64 {
    DEFAULT_PLAYBACK_RATE
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_track: None,
            progress: 0,
            duration: 0,
            playback_rate: DEFAULT_PLAYBACK_RATE,
        }
    }
}

/// Coarse phase derived from the state, for UI controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Idle,
    Playing,
    Paused,
}

impl PlayerState {
    pub fn phase(&self) -> PlaybackPhase {
        match (&self.current_track, self.is_playing) {
            (None, _) => PlaybackPhase::Idle,
            (Some(_), true) => PlaybackPhase::Playing,
            (Some(_), false) => PlaybackPhase::Paused,
        }
    }

    /// Id of the current track, if any.
    pub fn current_track_id(&self) -> Option<&str> {
        self.current_track.as_ref().map(|track| track.id.as_str())
    }

    /// Whether the track length has been reported.
    pub fn has_duration(&self) -> bool {
        self.duration > 0
    }

    /// Elapsed fraction in `0.0..=1.0`, or 0 when the length is unknown.
    pub fn progress_ratio(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        (self.progress as f64 / self.duration as f64).clamp(0.0, 1.0)
    }

    fn normalized(mut self) -> Self {
        if self.current_track.is_none() {
            self.is_playing = false;
            self.progress = 0;
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            self.playback_rate = DEFAULT_PLAYBACK_RATE;
        }
        self
    }
}

/// Mutation intents applied by [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerAction {
    /// Make `track` current, starting from the beginning.
    LoadTrack(Track),
    SetPlaying(bool),
    /// Explicit position in milliseconds.
    SetProgress(f64),
    /// Length in milliseconds.
    SetDuration(f64),
    SetPlaybackRate(f64),
    /// Status report from the platform handle.
    ApplyStatus(HandleStatus),
    /// Replace the state with a saved snapshot.
    Restore(PlayerState),
    /// Back to the empty player.
    Reset,
}

/// Truncate a millisecond value. `None` for NaN and infinities.
pub(crate) fn truncate_ms(value: f64) -> Option<u64> {
    if !value.is_finite() {
        return None;
    }
    if value <= 0.0 {
        return Some(0);
    }
    Some(value.floor() as u64)
}

/// Apply `action` to `state`, returning the next state.
pub fn reduce(state: &PlayerState, action: PlayerAction) -> PlayerState {
    let mut next = state.clone();

    match action {
        PlayerAction::LoadTrack(track) => {
            next.duration = track.duration.unwrap_or(0);
            next.progress = 0;
            next.current_track = Some(track);
        }
        PlayerAction::SetPlaying(playing) => {
            next.is_playing = playing;
        }
        PlayerAction::SetProgress(position) => {
            if let Some(position) = truncate_ms(position) {
                next.progress = position;
            }
        }
        PlayerAction::SetDuration(duration) => {
            if let Some(duration) = truncate_ms(duration) {
                next.duration = duration;
            }
        }
        PlayerAction::SetPlaybackRate(rate) => {
            if rate.is_finite() && rate > 0.0 {
                next.playback_rate = rate;
            }
        }
        PlayerAction::ApplyStatus(status) => {
            if status.loaded && next.current_track.is_some() {
                if let Some(position) = truncate_ms(status.position_ms) {
                    next.progress = position;
                }
                // Keep the hint until the platform knows better.
                if let Some(duration) = status.known_duration_ms().and_then(truncate_ms) {
                    next.duration = duration;
                }
                next.is_playing = status.playing;
            }
        }
        PlayerAction::Restore(snapshot) => {
            next = snapshot;
            next.is_playing = false;
        }
        PlayerAction::Reset => {
            next = PlayerState::default();
        }
    }

    next.normalized()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> Track {
        Track::new(id, format!("Track {id}"), "Artist", format!("https://example.com/{id}.mp3"))
    }

    fn playing(id: &str) -> PlayerState {
        let state = reduce(&PlayerState::default(), PlayerAction::LoadTrack(track(id)));
        reduce(&state, PlayerAction::SetPlaying(true))
    }

    #[test]
    fn test_default_state() {
        let state = PlayerState::default();
        assert!(!state.is_playing);
        assert!(state.current_track.is_none());
        assert_eq!(state.progress, 0);
        assert_eq!(state.duration, 0);
        assert_eq!(state.playback_rate, 1.0);
        assert_eq!(state.phase(), PlaybackPhase::Idle);
    }

    #[test]
    fn test_load_track_resets_progress_and_seeds_duration() {
        let mut state = playing("a");
        state = reduce(&state, PlayerAction::SetProgress(42_000.0));

        let next = reduce(
            &state,
            PlayerAction::LoadTrack(track("b").with_duration(180_000)),
        );
        assert_eq!(next.current_track_id(), Some("b"));
        assert_eq!(next.progress, 0);
        assert_eq!(next.duration, 180_000);
    }

    #[test]
    fn test_progress_truncates_and_clamps() {
        let state = playing("a");

        assert_eq!(reduce(&state, PlayerAction::SetProgress(1234.9)).progress, 1234);
        assert_eq!(reduce(&state, PlayerAction::SetProgress(-50.0)).progress, 0);

        let at = reduce(&state, PlayerAction::SetProgress(500.0));
        assert_eq!(reduce(&at, PlayerAction::SetProgress(f64::NAN)).progress, 500);
        assert_eq!(
            reduce(&at, PlayerAction::SetDuration(f64::INFINITY)).duration,
            0
        );
    }

    #[test]
    fn test_rate_rejects_non_positive() {
        let state = playing("a");
        assert_eq!(
            reduce(&state, PlayerAction::SetPlaybackRate(1.5)).playback_rate,
            1.5
        );
        assert_eq!(
            reduce(&state, PlayerAction::SetPlaybackRate(0.0)).playback_rate,
            1.0
        );
        assert_eq!(
            reduce(&state, PlayerAction::SetPlaybackRate(-2.0)).playback_rate,
            1.0
        );
    }

    #[test]
    fn test_no_track_is_never_playing() {
        let state = reduce(&PlayerState::default(), PlayerAction::SetPlaying(true));
        assert!(!state.is_playing);

        let state = reduce(&state, PlayerAction::SetProgress(5000.0));
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_apply_status_is_authoritative() {
        let state = playing("a");
        let status = HandleStatus::loaded(true, 101_500.7, Some(100_000.2));
        let next = reduce(&state, PlayerAction::ApplyStatus(status));

        assert_eq!(next.progress, 101_500);
        assert_eq!(next.duration, 100_000);
        assert!(next.is_playing);

        let finished = HandleStatus::loaded(true, 100_000.0, Some(100_000.0)).finished();
        let next = reduce(&next, PlayerAction::ApplyStatus(finished));
        assert!(!next.is_playing);
        assert_eq!(next.phase(), PlaybackPhase::Paused);
    }

    #[test]
    fn test_apply_status_ignores_unloaded_reports() {
        let state = reduce(&playing("a"), PlayerAction::SetProgress(3000.0));
        let next = reduce(&state, PlayerAction::ApplyStatus(HandleStatus::unloaded()));
        assert_eq!(next, state);
    }

    #[test]
    fn test_apply_status_without_track_is_ignored() {
        let status = HandleStatus::loaded(true, 5000.0, Some(10_000.0));
        let next = reduce(&PlayerState::default(), PlayerAction::ApplyStatus(status));
        assert_eq!(next, PlayerState::default());
    }

    #[test]
    fn test_apply_status_keeps_hint_until_duration_known() {
        let state = reduce(
            &PlayerState::default(),
            PlayerAction::LoadTrack(track("a").with_duration(90_000)),
        );
        let next = reduce(
            &state,
            PlayerAction::ApplyStatus(HandleStatus::loaded(true, 1000.0, None)),
        );
        assert_eq!(next.duration, 90_000);
        assert_eq!(next.progress, 1000);
    }

    #[test]
    fn test_restore_never_autoplays() {
        let snapshot = PlayerState {
            is_playing: true,
            current_track: Some(track("a")),
            progress: 50_000,
            duration: 100_000,
            playback_rate: 1.25,
        };
        let restored = reduce(&PlayerState::default(), PlayerAction::Restore(snapshot));

        assert!(!restored.is_playing);
        assert_eq!(restored.progress, 50_000);
        assert_eq!(restored.duration, 100_000);
        assert_eq!(restored.playback_rate, 1.25);
    }

    #[test]
    fn test_restore_normalizes_inconsistent_snapshot() {
        let snapshot = PlayerState {
            is_playing: true,
            current_track: None,
            progress: 10,
            duration: 0,
            playback_rate: 0.0,
        };
        let restored = reduce(&PlayerState::default(), PlayerAction::Restore(snapshot));
        assert_eq!(restored, PlayerState::default());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut state = playing("a");
        state = reduce(&state, PlayerAction::SetPlaybackRate(2.0));
        state = reduce(&state, PlayerAction::SetDuration(1000.0));

        assert_eq!(reduce(&state, PlayerAction::Reset), PlayerState::default());
    }

    #[test]
    fn test_snapshot_field_names() {
        let state = reduce(&playing("a"), PlayerAction::SetDuration(2000.0));
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["isPlaying"], true);
        assert_eq!(json["currentTrack"]["id"], "a");
        assert_eq!(json["duration"], 2000);
        assert_eq!(json["playbackRate"], 1.0);
        assert!(json.get("progress").is_some());
    }

    #[test]
    fn test_progress_ratio() {
        let mut state = playing("a");
        assert_eq!(state.progress_ratio(), 0.0);
        state = reduce(&state, PlayerAction::SetDuration(200.0));
        state = reduce(&state, PlayerAction::SetProgress(50.0));
        assert_eq!(state.progress_ratio(), 0.25);
    }
}

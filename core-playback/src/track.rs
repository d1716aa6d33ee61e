//! Track value type.

use bridge_traits::{AudioSource, PlaybackMetadata};
use serde::{Deserialize, Serialize};

/// A playable item from the catalog. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Unique identifier.
    pub id: String,
    pub title: String,
    pub artist: String,
    /// Stream source resolved by the platform.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    /// Known length hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            url: url.into(),
            artwork: None,
            duration: None,
        }
    }

    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub(crate) fn source(&self) -> AudioSource {
        AudioSource::remote(&self.url)
    }

    pub(crate) fn metadata(&self) -> PlaybackMetadata {
        PlaybackMetadata {
            track_id: Some(self.id.clone()),
            title: Some(self.title.clone()),
            artist: Some(self.artist.clone()),
            artwork: self.artwork.clone(),
        }
    }
}

//! Core types for hlsplay

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Readiness of the loaded media item
///
/// `Ready` and `Failed` are terminal for observation: once reached, the
/// readiness observer is removed until the next setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readiness {
    /// No item loaded
    Idle,
    /// Item loaded, engine has not reported a final status yet
    Loading,
    /// Engine can play the item
    Ready,
    /// Engine gave up on the item
    Failed,
}

impl Readiness {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: Readiness) -> bool {
        use Readiness::*;
        matches!(
            (self, target),
            // Setup
            (Idle, Loading) | (Ready, Loading) | (Failed, Loading) | (Loading, Loading) |
            // Observation
            (Loading, Ready) | (Loading, Failed) |
            // Stop
            (Loading, Idle) | (Ready, Idle) | (Failed, Idle) | (Idle, Idle)
        )
    }

    /// True once the observer has nothing left to wait for
    pub fn is_terminal(&self) -> bool {
        matches!(self, Readiness::Ready | Readiness::Failed)
    }
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Readiness::Idle => write!(f, "idle"),
            Readiness::Loading => write!(f, "loading"),
            Readiness::Ready => write!(f, "ready"),
            Readiness::Failed => write!(f, "failed"),
        }
    }
}

/// Encoded artwork image shown on the now-playing surface
///
/// Serialized as a base64 string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    data: Bytes,
}

impl Artwork {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Raw image bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Serialize for Artwork {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.data))
    }
}

impl<'de> Deserialize<'de> for Artwork {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Artwork::new)
            .map_err(serde::de::Error::custom)
    }
}

/// Metadata attached to a session at setup time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Title shown on the now-playing surface
    pub title: String,
    /// Optional artwork
    pub artwork: Option<Artwork>,
}

impl MediaMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artwork: None,
        }
    }

    pub fn with_artwork(mut self, artwork: Artwork) -> Self {
        self.artwork = Some(artwork);
        self
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cadence of progress ticks delivered to the delegate (milliseconds)
    pub progress_interval_ms: u64,
    /// Include rate/elapsed/duration when publishing now-playing info.
    /// When false, the session publishes the item as a live stream.
    pub now_playing_timing: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 1000,
            now_playing_timing: false,
        }
    }
}

impl SessionConfig {
    /// Progress tick cadence
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "progress_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

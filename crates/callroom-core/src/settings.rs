use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::CallError;
use crate::events::LocalMediaState;
use crate::permissions::Platform;

/// Runtime configuration for one call session.
///
/// Read-only: the core never writes it back.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default = "default_true")]
    pub audio_enabled_on_join: bool,
    #[serde(default = "default_true")]
    pub video_enabled_on_join: bool,
    /// Keep remote tracks when the room disconnects instead of clearing them.
    #[serde(default)]
    pub retain_tracks_on_disconnect: bool,
    /// React to `RoomFailedToConnect`; when off the event is only logged.
    #[serde(default = "default_true")]
    pub handle_connect_failure: bool,
    /// Give up on a connect attempt after this long. `None` waits forever.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            audio_enabled_on_join: true,
            video_enabled_on_join: true,
            retain_tracks_on_disconnect: false,
            handle_connect_failure: true,
            connect_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, CallError> {
        serde_json::from_str(json).map_err(|e| CallError::Config(e.to_string()))
    }

    /// Read a JSON config file, falling back to defaults when it is missing
    /// or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn initial_media(&self) -> LocalMediaState {
        LocalMediaState {
            audio_enabled: self.audio_enabled_on_join,
            video_enabled: self.video_enabled_on_join,
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

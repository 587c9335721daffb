use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Connection lifecycle of the single call room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Local capture flags, only changed by acknowledged user toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMediaState {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl Default for LocalMediaState {
    fn default() -> Self {
        Self {
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

/// A remote video track published by a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub track_id: String,
    pub participant_id: String,
}

/// Everything the rendering layer needs, read in one go.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    pub local_media: LocalMediaState,
    pub tracks: Vec<RemoteTrack>,
}

/// Events pushed by the transport collaborator, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    RoomConnected {
        room_name: String,
    },
    RoomDisconnected {
        room_name: String,
        error: Option<String>,
    },
    RoomFailedToConnect {
        error: String,
    },
    TrackAdded {
        participant_id: String,
        track_id: String,
    },
    TrackRemoved {
        participant_id: String,
        track_id: String,
    },
}

/// Events emitted by the core to native UI listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StatusChanged(ConnectionStatus),
    TrackAdded(RemoteTrack),
    TrackRemoved(String), // track id
    LocalMediaChanged(LocalMediaState),
    ConnectionFailed { reason: String },
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait SessionEventListener: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Arc<dyn SessionEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionEventListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn emit(&self, event: SessionEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

use crate::errors::CallError;
use crate::events::{
    ConnectionStatus, EventEmitter, LocalMediaState, RemoteTrack, SessionEvent, SessionSnapshot,
    TransportEvent,
};
use crate::settings::SessionConfig;
use crate::tracks::RemoteTrackSet;
use crate::transport::{MediaAck, Transport};

/// Call session state machine.
///
/// Single writer: every mutation goes through `&mut self`, so whoever owns
/// the session decides the order in which commands and transport events
/// apply. Status transitions:
///
/// ```text
/// Disconnected --request_connect--> Connecting --RoomConnected--> Connected
/// Connecting --RoomFailedToConnect--> Disconnected
/// Connected --RoomDisconnected--> Disconnected
/// ```
pub struct CallSession<T: Transport> {
    transport: T,
    emitter: EventEmitter,
    config: SessionConfig,
    status: ConnectionStatus,
    local_media: LocalMediaState,
    tracks: RemoteTrackSet,
    attempt: u64,
}

impl<T: Transport> CallSession<T> {
    pub fn new(transport: T, config: SessionConfig, emitter: EventEmitter) -> Self {
        let local_media = config.initial_media();
        Self {
            transport,
            emitter,
            config,
            status: ConnectionStatus::Disconnected,
            local_media,
            tracks: RemoteTrackSet::new(),
            attempt: 0,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn local_media(&self) -> LocalMediaState {
        self.local_media
    }

    pub fn tracks(&self) -> &[RemoteTrack] {
        self.tracks.tracks()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Ask the transport to join the room.
    ///
    /// Only valid while disconnected. Returns the id of this connect
    /// attempt, used to match a later timeout.
    pub fn request_connect(&mut self, credential: &str) -> Result<u64, CallError> {
        if credential.is_empty() {
            return Err(CallError::EmptyCredential);
        }
        if self.status != ConnectionStatus::Disconnected {
            return Err(CallError::InvalidState(format!(
                "connect requested while {:?}",
                self.status
            )));
        }

        self.attempt += 1;
        tracing::info!("connect attempt {}", self.attempt);
        self.transport.connect(credential);
        self.set_status(ConnectionStatus::Connecting);
        Ok(self.attempt)
    }

    /// Ask the transport to leave the room. The status only changes once the
    /// transport reports `RoomDisconnected`.
    pub fn request_disconnect(&self) {
        tracing::info!("disconnect requested while {:?}", self.status);
        self.transport.disconnect();
    }

    /// Request the opposite of the acknowledged audio state. Feed the ack's
    /// value to [`Self::apply_audio_ack`] whenever it resolves.
    pub fn toggle_audio(&self) -> MediaAck {
        let target = !self.local_media.audio_enabled;
        tracing::debug!("requesting local audio enabled={target}");
        self.transport.set_local_audio_enabled(target)
    }

    pub fn apply_audio_ack(&mut self, enabled: bool) {
        if self.local_media.audio_enabled != enabled {
            self.local_media.audio_enabled = enabled;
            tracing::info!("local audio enabled: {enabled}");
            self.emitter.emit(SessionEvent::LocalMediaChanged(self.local_media));
        }
    }

    /// Same protocol as [`Self::toggle_audio`], for the camera feed.
    pub fn toggle_video(&self) -> MediaAck {
        let target = !self.local_media.video_enabled;
        tracing::debug!("requesting local video enabled={target}");
        self.transport.set_local_video_enabled(target)
    }

    pub fn apply_video_ack(&mut self, enabled: bool) {
        if self.local_media.video_enabled != enabled {
            self.local_media.video_enabled = enabled;
            tracing::info!("local video enabled: {enabled}");
            self.emitter.emit(SessionEvent::LocalMediaChanged(self.local_media));
        }
    }

    pub fn flip_camera(&self) {
        self.transport.flip_camera();
    }

    /// Abandon connect attempt `attempt` if it is still pending.
    ///
    /// Returns `true` if the session gave up on it.
    pub fn connect_timed_out(&mut self, attempt: u64) -> bool {
        if self.status != ConnectionStatus::Connecting || attempt != self.attempt {
            return false;
        }
        tracing::warn!("connect attempt {attempt} timed out");
        self.transport.disconnect();
        self.set_status(ConnectionStatus::Disconnected);
        self.emitter.emit(SessionEvent::ConnectionFailed {
            reason: "connection timed out".to_string(),
        });
        true
    }

    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::RoomConnected { room_name } => {
                if self.status == ConnectionStatus::Connecting {
                    tracing::info!("room connected: {room_name}");
                    self.set_status(ConnectionStatus::Connected);
                } else {
                    tracing::debug!("ignoring RoomConnected({room_name}) while {:?}", self.status);
                }
            }

            TransportEvent::RoomDisconnected { room_name, error } => {
                if let Some(error) = &error {
                    tracing::warn!("room {room_name} disconnected with error: {error}");
                }
                if self.status == ConnectionStatus::Connected {
                    tracing::info!("room disconnected: {room_name}");
                    self.set_status(ConnectionStatus::Disconnected);
                } else {
                    tracing::debug!("ignoring RoomDisconnected while {:?}", self.status);
                }
            }

            TransportEvent::RoomFailedToConnect { error } => {
                if !self.config.handle_connect_failure {
                    tracing::warn!("room failed to connect (unhandled): {error}");
                    return;
                }
                if self.status == ConnectionStatus::Connecting {
                    tracing::warn!("room failed to connect: {error}");
                    self.set_status(ConnectionStatus::Disconnected);
                    self.emitter.emit(SessionEvent::ConnectionFailed { reason: error });
                } else {
                    tracing::debug!("ignoring RoomFailedToConnect while {:?}", self.status);
                }
            }

            TransportEvent::TrackAdded { participant_id, track_id } => {
                tracing::info!("video track added: {track_id} from {participant_id}");
                let track = RemoteTrack { track_id, participant_id };
                self.tracks.upsert(track.clone());
                self.emitter.emit(SessionEvent::TrackAdded(track));
            }

            TransportEvent::TrackRemoved { participant_id, track_id } => {
                match self.tracks.remove(&track_id) {
                    Some(_) => {
                        tracing::info!("video track removed: {track_id} from {participant_id}");
                        self.emitter.emit(SessionEvent::TrackRemoved(track_id));
                    }
                    None => tracing::debug!("unknown video track removed: {track_id}"),
                }
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            local_media: self.local_media,
            tracks: self.tracks.tracks().to_vec(),
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.emitter.emit(SessionEvent::StatusChanged(status));

        if status == ConnectionStatus::Disconnected && !self.config.retain_tracks_on_disconnect {
            for track in self.tracks.tracks().to_vec() {
                self.emitter.emit(SessionEvent::TrackRemoved(track.track_id));
            }
            self.tracks.clear();
        }
    }
}

//! UniFFI bindings for callroom-core.
//!
//! Provides a CallClient object that wraps the core CallManager loop into a
//! single FFI-safe interface. The native shell implements the transport,
//! permission and alert callback interfaces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use callroom_core::{
    CallHandle, CallManager,
    bridge,
    errors::CallError as CoreCallError,
    events::{
        ConnectionStatus as CoreConnectionStatus, LocalMediaState as CoreLocalMediaState,
        RemoteTrack as CoreRemoteTrack, SessionEvent as CoreSessionEvent,
        SessionSnapshot as CoreSessionSnapshot, TransportEvent,
    },
    permissions::{
        AlertPresenter as CoreAlertPresenter, Permission, PermissionService,
        PermissionStatus as CorePermissionStatus, PermissionStatuses, Platform as CorePlatform,
    },
    transport::{MediaAck, Transport},
};
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;

uniffi::include_scaffolding!("callroom");

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before using CallClient.
/// On Android, stderr goes to logcat for debuggable builds.
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("callroom_core=debug,callroom_ffi=debug")
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .try_init();
    });
}

// ── FFI-safe type conversions ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl From<CoreConnectionStatus> for ConnectionStatus {
    fn from(s: CoreConnectionStatus) -> Self {
        match s {
            CoreConnectionStatus::Disconnected => Self::Disconnected,
            CoreConnectionStatus::Connecting => Self::Connecting,
            CoreConnectionStatus::Connected => Self::Connected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Blocked,
    Unavailable,
}

impl From<PermissionStatus> for CorePermissionStatus {
    fn from(s: PermissionStatus) -> Self {
        match s {
            PermissionStatus::Granted => Self::Granted,
            PermissionStatus::Denied => Self::Denied,
            PermissionStatus::Blocked => Self::Blocked,
            PermissionStatus::Unavailable => Self::Unavailable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
}

impl From<Platform> for CorePlatform {
    fn from(p: Platform) -> Self {
        match p {
            Platform::Ios => Self::Ios,
            Platform::Android => Self::Android,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalMediaState {
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl From<CoreLocalMediaState> for LocalMediaState {
    fn from(m: CoreLocalMediaState) -> Self {
        Self {
            audio_enabled: m.audio_enabled,
            video_enabled: m.video_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub track_id: String,
    pub participant_id: String,
}

impl From<CoreRemoteTrack> for RemoteTrack {
    fn from(t: CoreRemoteTrack) -> Self {
        Self {
            track_id: t.track_id,
            participant_id: t.participant_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    pub local_media: LocalMediaState,
    pub tracks: Vec<RemoteTrack>,
}

impl From<CoreSessionSnapshot> for SessionSnapshot {
    fn from(s: CoreSessionSnapshot) -> Self {
        Self {
            status: s.status.into(),
            local_media: s.local_media.into(),
            tracks: s.tracks.into_iter().map(RemoteTrack::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub platform: Platform,
    pub audio_enabled_on_join: bool,
    pub video_enabled_on_join: bool,
    pub retain_tracks_on_disconnect: bool,
    pub handle_connect_failure: bool,
    pub connect_timeout_ms: Option<u64>,
}

impl From<SessionConfig> for callroom_core::SessionConfig {
    fn from(c: SessionConfig) -> Self {
        Self {
            platform: c.platform.into(),
            audio_enabled_on_join: c.audio_enabled_on_join,
            video_enabled_on_join: c.video_enabled_on_join,
            retain_tracks_on_disconnect: c.retain_tracks_on_disconnect,
            handle_connect_failure: c.handle_connect_failure,
            connect_timeout_ms: c.connect_timeout_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StatusChanged { status: ConnectionStatus },
    TrackAdded { track: RemoteTrack },
    TrackRemoved { track_id: String },
    LocalMediaChanged { state: LocalMediaState },
    ConnectionFailed { reason: String },
}

impl From<CoreSessionEvent> for SessionEvent {
    fn from(e: CoreSessionEvent) -> Self {
        match e {
            CoreSessionEvent::StatusChanged(s) => Self::StatusChanged { status: s.into() },
            CoreSessionEvent::TrackAdded(t) => Self::TrackAdded { track: t.into() },
            CoreSessionEvent::TrackRemoved(track_id) => Self::TrackRemoved { track_id },
            CoreSessionEvent::LocalMediaChanged(m) => Self::LocalMediaChanged { state: m.into() },
            CoreSessionEvent::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
        }
    }
}

// ── Error conversion ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Invalid state: {msg}")]
    InvalidState { msg: String },
    #[error("Invalid credential: {msg}")]
    InvalidCredential { msg: String },
    #[error("Bridge error: {msg}")]
    Bridge { msg: String },
    #[error("Permission error: {msg}")]
    Permission { msg: String },
    #[error("Config error: {msg}")]
    Config { msg: String },
    #[error("Closed: {msg}")]
    Closed { msg: String },
}

impl From<CoreCallError> for CallError {
    fn from(e: CoreCallError) -> Self {
        tracing::error!("CallError: {e}");
        let msg = e.to_string();
        match e {
            CoreCallError::InvalidState(_) => Self::InvalidState { msg },
            CoreCallError::EmptyCredential => Self::InvalidCredential { msg },
            CoreCallError::Bridge(_) => Self::Bridge { msg },
            CoreCallError::Permission(_) => Self::Permission { msg },
            CoreCallError::Config(_) => Self::Config { msg },
            CoreCallError::Closed => Self::Closed { msg },
        }
    }
}

// ── Callback interfaces ───────────────────────────────────────────────

/// The native video SDK. Media changes are acknowledged later through
/// `CallClient::complete_media_request` with the same `request_id`.
pub trait CallTransport: Send + Sync {
    fn connect(&self, credential: String);
    fn disconnect(&self);
    fn set_local_audio_enabled(&self, request_id: u64, enabled: bool);
    fn set_local_video_enabled(&self, request_id: u64, enabled: bool);
    fn flip_camera(&self);
}

/// Platform permission API, keyed by platform permission id
/// (`ios.permission.CAMERA`, `android.permission.RECORD_AUDIO`, ...).
/// Both calls may block while a dialog is shown; they are invoked off the
/// event loop.
pub trait PermissionProvider: Send + Sync {
    fn check(&self, permission_ids: Vec<String>) -> HashMap<String, PermissionStatus>;
    fn request(&self, permission_ids: Vec<String>) -> HashMap<String, PermissionStatus>;
}

pub trait AlertPresenter: Send + Sync {
    fn show_alert(&self, title: String, message: String);
}

pub trait SessionListener: Send + Sync {
    fn on_event(&self, event: SessionEvent);
}

// ── Bridges: FFI callbacks → core seams ───────────────────────────────

type PendingAcks = Arc<StdMutex<HashMap<u64, oneshot::Sender<bool>>>>;

struct HostTransport {
    host: Box<dyn CallTransport>,
    pending: PendingAcks,
    next_request: AtomicU64,
}

impl HostTransport {
    fn register(&self) -> (u64, MediaAck) {
        let (tx, rx) = oneshot::channel();
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop requests whose receiver is gone.
        pending.retain(|_, tx| !tx.is_closed());
        pending.insert(id, tx);
        (id, rx)
    }
}

impl Transport for HostTransport {
    fn connect(&self, credential: &str) {
        self.host.connect(credential.to_string());
    }

    fn disconnect(&self) {
        self.host.disconnect();
    }

    fn set_local_audio_enabled(&self, enabled: bool) -> MediaAck {
        let (id, ack) = self.register();
        self.host.set_local_audio_enabled(id, enabled);
        ack
    }

    fn set_local_video_enabled(&self, enabled: bool) -> MediaAck {
        let (id, ack) = self.register();
        self.host.set_local_video_enabled(id, enabled);
        ack
    }

    fn flip_camera(&self) {
        self.host.flip_camera();
    }
}

struct HostPermissions {
    host: Arc<dyn PermissionProvider>,
}

impl HostPermissions {
    fn ask<'a>(
        &'a self,
        permissions: &'a [Permission],
        request: bool,
    ) -> BoxFuture<'a, Result<PermissionStatuses, CoreCallError>> {
        let host = self.host.clone();
        let ids: Vec<String> = permissions.iter().map(|p| p.id.to_string()).collect();
        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || {
                if request {
                    host.request(ids)
                } else {
                    host.check(ids)
                }
            })
            .await
            .map_err(|e| CoreCallError::Permission(e.to_string()))?;

            // Ids the host left out stay absent and read as unavailable.
            Ok(permissions
                .iter()
                .filter_map(|p| {
                    let status = answer.get(p.id)?;
                    Some((p.capability, CorePermissionStatus::from(*status)))
                })
                .collect())
        })
    }
}

impl PermissionService for HostPermissions {
    fn check<'a>(
        &'a self,
        permissions: &'a [Permission],
    ) -> BoxFuture<'a, Result<PermissionStatuses, CoreCallError>> {
        self.ask(permissions, false)
    }

    fn request<'a>(
        &'a self,
        permissions: &'a [Permission],
    ) -> BoxFuture<'a, Result<PermissionStatuses, CoreCallError>> {
        self.ask(permissions, true)
    }
}

struct HostAlerts {
    host: Box<dyn AlertPresenter>,
}

impl CoreAlertPresenter for HostAlerts {
    fn show_alert(&self, title: &str, message: &str) {
        self.host.show_alert(title.to_string(), message.to_string());
    }
}

struct BridgeListener {
    ffi_listener: Arc<dyn SessionListener>,
}

impl callroom_core::SessionEventListener for BridgeListener {
    fn on_event(&self, event: CoreSessionEvent) {
        self.ffi_listener.on_event(event.into());
    }
}

// ── CallClient: main FFI object ───────────────────────────────────────

pub struct CallClient {
    handle: CallHandle,
    pending: PendingAcks,
    _rt: tokio::runtime::Runtime,
}

impl CallClient {
    pub fn new(
        transport: Box<dyn CallTransport>,
        permissions: Box<dyn PermissionProvider>,
        alerts: Box<dyn AlertPresenter>,
        config: SessionConfig,
    ) -> Result<Self, CallError> {
        let rt = tokio::runtime::Runtime::new().map_err(|e| CallError::InvalidState {
            msg: format!("failed to create tokio runtime: {e}"),
        })?;

        let pending: PendingAcks = Arc::new(StdMutex::new(HashMap::new()));
        let transport = HostTransport {
            host: transport,
            pending: pending.clone(),
            next_request: AtomicU64::new(1),
        };
        let permissions = Arc::new(HostPermissions {
            host: Arc::from(permissions),
        });
        let alerts = Arc::new(HostAlerts { host: alerts });

        let handle = {
            let _guard = rt.enter();
            CallManager::spawn(transport, permissions, alerts, config.into())
        };
        tracing::info!("CallClient created");

        Ok(Self {
            handle,
            pending,
            _rt: rt,
        })
    }

    pub fn connect(&self, credential: String) -> Result<(), CallError> {
        self.handle.connect(credential).map_err(CallError::from)
    }

    pub fn disconnect(&self) -> Result<(), CallError> {
        self.handle.disconnect().map_err(CallError::from)
    }

    pub fn toggle_audio(&self) -> Result<(), CallError> {
        self.handle.toggle_audio().map_err(CallError::from)
    }

    pub fn toggle_video(&self) -> Result<(), CallError> {
        self.handle.toggle_video().map_err(CallError::from)
    }

    pub fn flip_camera(&self) -> Result<(), CallError> {
        self.handle.flip_camera().map_err(CallError::from)
    }

    pub fn on_room_connected(&self, room_name: String) -> Result<(), CallError> {
        self.deliver(TransportEvent::RoomConnected { room_name })
    }

    pub fn on_room_disconnected(
        &self,
        room_name: String,
        error: Option<String>,
    ) -> Result<(), CallError> {
        self.deliver(TransportEvent::RoomDisconnected { room_name, error })
    }

    pub fn on_room_failed_to_connect(&self, error: String) -> Result<(), CallError> {
        self.deliver(TransportEvent::RoomFailedToConnect { error })
    }

    pub fn on_track_added(
        &self,
        participant_id: String,
        track_id: String,
    ) -> Result<(), CallError> {
        self.deliver(TransportEvent::TrackAdded { participant_id, track_id })
    }

    pub fn on_track_removed(
        &self,
        participant_id: String,
        track_id: String,
    ) -> Result<(), CallError> {
        self.deliver(TransportEvent::TrackRemoved { participant_id, track_id })
    }

    /// Forward a raw SDK event (name plus JSON payload) from the native bridge.
    pub fn on_bridge_event(&self, name: String, payload_json: String) -> Result<(), CallError> {
        let event = bridge::decode_str(&name, &payload_json)?;
        self.deliver(event)
    }

    /// Resolve a pending `set_local_*_enabled` request with the state the SDK
    /// applied. Returns `false` for an unknown or already completed request.
    pub fn complete_media_request(&self, request_id: u64, enabled: bool) -> bool {
        let sender = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&request_id);
        match sender {
            Some(tx) => tx.send(enabled).is_ok(),
            None => {
                tracing::warn!("unknown media request {request_id}");
                false
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot().into()
    }

    pub fn add_listener(&self, listener: Box<dyn SessionListener>) {
        let bridge = Arc::new(BridgeListener {
            ffi_listener: Arc::from(listener),
        });
        self.handle.add_listener(bridge);
    }

    fn deliver(&self, event: TransportEvent) -> Result<(), CallError> {
        self.handle.transport_event(event).map_err(CallError::from)
    }
}

impl Drop for CallClient {
    fn drop(&mut self) {
        let _ = self.handle.shutdown();
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum HostCall {
        Connect(String),
        Disconnect,
        Audio(u64, bool),
        Video(u64, bool),
        Flip,
    }

    #[derive(Clone, Default)]
    struct FakeHost {
        calls: Arc<StdMutex<Vec<HostCall>>>,
        alerts: Arc<StdMutex<Vec<String>>>,
        events: Arc<StdMutex<Vec<SessionEvent>>>,
    }

    impl FakeHost {
        fn calls(&self) -> Vec<HostCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CallTransport for FakeHost {
        fn connect(&self, credential: String) {
            self.calls.lock().unwrap().push(HostCall::Connect(credential));
        }
        fn disconnect(&self) {
            self.calls.lock().unwrap().push(HostCall::Disconnect);
        }
        fn set_local_audio_enabled(&self, request_id: u64, enabled: bool) {
            self.calls.lock().unwrap().push(HostCall::Audio(request_id, enabled));
        }
        fn set_local_video_enabled(&self, request_id: u64, enabled: bool) {
            self.calls.lock().unwrap().push(HostCall::Video(request_id, enabled));
        }
        fn flip_camera(&self) {
            self.calls.lock().unwrap().push(HostCall::Flip);
        }
    }

    impl AlertPresenter for FakeHost {
        fn show_alert(&self, _title: String, message: String) {
            self.alerts.lock().unwrap().push(message);
        }
    }

    impl SessionListener for FakeHost {
        fn on_event(&self, event: SessionEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Answers `check` with fixed camera/microphone statuses and grants
    /// every `request`. Records the ids it was asked about.
    #[derive(Clone)]
    struct FixedPermissions {
        camera: PermissionStatus,
        microphone: PermissionStatus,
        checked: Arc<StdMutex<Vec<Vec<String>>>>,
        requested: Arc<StdMutex<Vec<Vec<String>>>>,
    }

    impl FixedPermissions {
        fn new(camera: PermissionStatus, microphone: PermissionStatus) -> Self {
            Self {
                camera,
                microphone,
                checked: Arc::default(),
                requested: Arc::default(),
            }
        }
    }

    impl PermissionProvider for FixedPermissions {
        fn check(&self, permission_ids: Vec<String>) -> HashMap<String, PermissionStatus> {
            self.checked.lock().unwrap().push(permission_ids.clone());
            permission_ids
                .into_iter()
                .map(|id| {
                    let status = if id.ends_with("CAMERA") {
                        self.camera
                    } else {
                        self.microphone
                    };
                    (id, status)
                })
                .collect()
        }

        fn request(&self, permission_ids: Vec<String>) -> HashMap<String, PermissionStatus> {
            self.requested.lock().unwrap().push(permission_ids.clone());
            permission_ids
                .into_iter()
                .map(|id| (id, PermissionStatus::Granted))
                .collect()
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            platform: Platform::Ios,
            audio_enabled_on_join: true,
            video_enabled_on_join: true,
            retain_tracks_on_disconnect: false,
            handle_connect_failure: true,
            connect_timeout_ms: None,
        }
    }

    fn client_with(host: &FakeHost, permissions: FixedPermissions) -> CallClient {
        CallClient::new(
            Box::new(host.clone()),
            Box::new(permissions),
            Box::new(host.clone()),
            config(),
        )
        .unwrap()
    }

    fn client(host: &FakeHost, camera: PermissionStatus) -> CallClient {
        client_with(host, FixedPermissions::new(camera, PermissionStatus::Granted))
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn connect_and_render_tracks() {
        let host = FakeHost::default();
        let client = client(&host, PermissionStatus::Granted);
        client.add_listener(Box::new(host.clone()));

        client.connect("tok123".to_string()).unwrap();
        wait_until(|| host.calls() == vec![HostCall::Connect("tok123".to_string())]);

        client.on_room_connected("room1".to_string()).unwrap();
        client
            .on_bridge_event(
                "onParticipantAddedVideoTrack".to_string(),
                r#"{"participant":{"sid":"p1"},"track":{"trackSid":"t1"}}"#.to_string(),
            )
            .unwrap();
        wait_until(|| client.snapshot().tracks.len() == 1);

        let snap = client.snapshot();
        assert_eq!(snap.status, ConnectionStatus::Connected);
        assert_eq!(snap.tracks[0].participant_id, "p1");
        assert!(
            host.events
                .lock()
                .unwrap()
                .contains(&SessionEvent::StatusChanged { status: ConnectionStatus::Connected })
        );
    }

    #[test]
    fn unavailable_camera_alerts_instead_of_connecting() {
        let host = FakeHost::default();
        let client = client(&host, PermissionStatus::Unavailable);

        client.connect("tok".to_string()).unwrap();
        wait_until(|| !host.alerts.lock().unwrap().is_empty());

        assert_eq!(
            host.alerts.lock().unwrap()[0],
            "Hardware to support video calls is not available"
        );
        assert!(host.calls().is_empty());
        assert_eq!(client.snapshot().status, ConnectionStatus::Disconnected);
    }

    #[test]
    fn media_request_completes_through_client() {
        let host = FakeHost::default();
        let client = client(&host, PermissionStatus::Granted);

        client.toggle_audio().unwrap();
        wait_until(|| matches!(host.calls().as_slice(), [HostCall::Audio(_, false)]));
        let HostCall::Audio(id, _) = host.calls()[0].clone() else { unreachable!() };

        assert!(client.complete_media_request(id, false));
        wait_until(|| !client.snapshot().local_media.audio_enabled);
        assert!(!client.complete_media_request(id, true));
    }

    #[test]
    fn ios_config_asks_host_for_ios_permission_ids() {
        let host = FakeHost::default();
        let permissions =
            FixedPermissions::new(PermissionStatus::Granted, PermissionStatus::Denied);
        let client = client_with(&host, permissions.clone());

        client.connect("tok".to_string()).unwrap();
        wait_until(|| host.calls() == vec![HostCall::Connect("tok".to_string())]);

        assert_eq!(
            *permissions.checked.lock().unwrap(),
            vec![vec![
                "ios.permission.CAMERA".to_string(),
                "ios.permission.MICROPHONE".to_string(),
            ]]
        );
        assert_eq!(
            *permissions.requested.lock().unwrap(),
            vec![vec!["ios.permission.MICROPHONE".to_string()]]
        );
    }

    #[test]
    fn abandoned_media_requests_are_pruned() {
        let pending: PendingAcks = Arc::default();
        let transport = HostTransport {
            host: Box::new(FakeHost::default()),
            pending: pending.clone(),
            next_request: AtomicU64::new(1),
        };

        let abandoned = transport.set_local_audio_enabled(false);
        drop(abandoned);
        let _live = transport.set_local_video_enabled(false);

        let ids: Vec<u64> = pending.lock().unwrap().keys().copied().collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn dropping_client_clears_pending_requests() {
        let host = FakeHost::default();
        let client = client(&host, PermissionStatus::Granted);
        client.toggle_video().unwrap();
        wait_until(|| client.pending.lock().unwrap().len() == 1);

        let pending = client.pending.clone();
        drop(client);
        assert!(pending.lock().unwrap().is_empty());
    }

    #[test]
    fn bridge_rejects_malformed_payload() {
        let host = FakeHost::default();
        let client = client(&host, PermissionStatus::Granted);
        let err = client
            .on_bridge_event("onParticipantRemovedVideoTrack".to_string(), "{}".to_string())
            .unwrap_err();
        assert!(matches!(err, CallError::Bridge { .. }));
    }

    #[test]
    fn empty_credential_maps_to_ffi_error() {
        let host = FakeHost::default();
        let client = client(&host, PermissionStatus::Granted);
        let err = client.connect(String::new()).unwrap_err();
        assert!(matches!(err, CallError::InvalidCredential { .. }));
    }
}

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::errors::CallError;
use crate::events::{
    ConnectionStatus, EventEmitter, SessionEventListener, SessionSnapshot, TransportEvent,
};
use crate::permissions::{AlertPresenter, PermissionGate, PermissionService};
use crate::session::CallSession;
use crate::settings::SessionConfig;
use crate::transport::{MediaAck, Transport};

/// Everything that can change the session, funneled through one queue.
#[derive(Debug)]
enum SessionInput {
    Connect(String),
    PermissionsGranted(String),
    PermissionsRefused,
    Disconnect,
    ToggleAudio,
    ToggleVideo,
    FlipCamera,
    Transport(TransportEvent),
    AudioAcknowledged(bool),
    VideoAcknowledged(bool),
    ConnectTimedOut(u64),
    Shutdown,
}

/// Runs a [`CallSession`] on its own tokio task.
///
/// The task is the only owner of the session. User commands, transport
/// events, permission results and media acknowledgements all arrive on the
/// same queue and apply in arrival order.
pub struct CallManager;

impl CallManager {
    /// Start the event loop. Must be called from within a tokio runtime.
    pub fn spawn<T: Transport>(
        transport: T,
        permissions: Arc<dyn PermissionService>,
        alerts: Arc<dyn AlertPresenter>,
        config: SessionConfig,
    ) -> CallHandle {
        let emitter = EventEmitter::new();
        let gate = PermissionGate::new(permissions, alerts, config.platform);
        let session = CallSession::new(transport, config, emitter.clone());

        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        // A weak sender lets the loop end once every handle is dropped.
        let loopback = inputs_tx.downgrade();
        tokio::spawn(async move {
            Self::event_loop(session, gate, inputs_rx, loopback, snapshot_tx).await;
        });

        CallHandle {
            inputs: inputs_tx,
            snapshot: snapshot_rx,
            emitter,
        }
    }

    async fn event_loop<T: Transport>(
        mut session: CallSession<T>,
        gate: PermissionGate,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
        loopback: mpsc::WeakUnboundedSender<SessionInput>,
        snapshot: watch::Sender<SessionSnapshot>,
    ) {
        // Set while a permission negotiation is in flight.
        let mut gate_pending = false;

        while let Some(input) = inputs.recv().await {
            match input {
                SessionInput::Connect(credential) => {
                    if session.status() != ConnectionStatus::Disconnected {
                        tracing::warn!("connect ignored while {:?}", session.status());
                        continue;
                    }
                    if gate_pending {
                        tracing::warn!("connect ignored while permissions are pending");
                        continue;
                    }
                    let Some(tx) = loopback.upgrade() else { break };
                    gate_pending = true;
                    let gate = gate.clone();
                    tokio::spawn(async move {
                        let granted = tx.clone();
                        // Refusals are alerted and logged by the gate itself.
                        let result = gate
                            .ensure_media_permissions(move || {
                                let _ = granted.send(SessionInput::PermissionsGranted(credential));
                            })
                            .await;
                        if result.is_err() {
                            let _ = tx.send(SessionInput::PermissionsRefused);
                        }
                    });
                }

                SessionInput::PermissionsRefused => gate_pending = false,

                SessionInput::PermissionsGranted(credential) => {
                    gate_pending = false;
                    match session.request_connect(&credential) {
                        Ok(attempt) => {
                            if let Some(timeout) = session.config().connect_timeout() {
                                if let Some(tx) = loopback.upgrade() {
                                    tokio::spawn(async move {
                                        tokio::time::sleep(timeout).await;
                                        let _ = tx.send(SessionInput::ConnectTimedOut(attempt));
                                    });
                                }
                            }
                        }
                        Err(e) => tracing::warn!("connect rejected: {e}"),
                    }
                }

                SessionInput::Disconnect => session.request_disconnect(),

                SessionInput::ToggleAudio => {
                    let ack = session.toggle_audio();
                    Self::await_ack(ack, &loopback, SessionInput::AudioAcknowledged, "audio");
                }

                SessionInput::ToggleVideo => {
                    let ack = session.toggle_video();
                    Self::await_ack(ack, &loopback, SessionInput::VideoAcknowledged, "video");
                }

                SessionInput::FlipCamera => session.flip_camera(),

                SessionInput::Transport(event) => session.handle_event(event),

                SessionInput::AudioAcknowledged(enabled) => session.apply_audio_ack(enabled),

                SessionInput::VideoAcknowledged(enabled) => session.apply_video_ack(enabled),

                SessionInput::ConnectTimedOut(attempt) => {
                    session.connect_timed_out(attempt);
                }

                SessionInput::Shutdown => break,
            }

            snapshot.send_replace(session.snapshot());
        }

        tracing::info!("call event loop ended");
    }

    /// Wait for a media acknowledgement off-loop and feed its value back in
    /// whenever it resolves.
    fn await_ack(
        ack: MediaAck,
        loopback: &mpsc::WeakUnboundedSender<SessionInput>,
        wrap: fn(bool) -> SessionInput,
        what: &'static str,
    ) {
        let Some(tx) = loopback.upgrade() else { return };
        tokio::spawn(async move {
            match ack.await {
                Ok(enabled) => {
                    let _ = tx.send(wrap(enabled));
                }
                Err(_) => tracing::warn!("local {what} change dropped without acknowledgement"),
            }
        });
    }
}

/// Clonable handle to a running [`CallManager`] loop.
#[derive(Clone)]
pub struct CallHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    snapshot: watch::Receiver<SessionSnapshot>,
    emitter: EventEmitter,
}

impl CallHandle {
    /// Check media permissions, then join the room with `credential`.
    pub fn connect(&self, credential: impl Into<String>) -> Result<(), CallError> {
        let credential = credential.into();
        if credential.is_empty() {
            return Err(CallError::EmptyCredential);
        }
        self.send(SessionInput::Connect(credential))
    }

    pub fn disconnect(&self) -> Result<(), CallError> {
        self.send(SessionInput::Disconnect)
    }

    pub fn toggle_audio(&self) -> Result<(), CallError> {
        self.send(SessionInput::ToggleAudio)
    }

    pub fn toggle_video(&self) -> Result<(), CallError> {
        self.send(SessionInput::ToggleVideo)
    }

    pub fn flip_camera(&self) -> Result<(), CallError> {
        self.send(SessionInput::FlipCamera)
    }

    /// Deliver an event from the transport collaborator.
    pub fn transport_event(&self, event: TransportEvent) -> Result<(), CallError> {
        self.send(SessionInput::Transport(event))
    }

    /// Stop the loop. Later commands fail with [`CallError::Closed`].
    pub fn shutdown(&self) -> Result<(), CallError> {
        self.send(SessionInput::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.inputs.is_closed()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified after every processed input.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionEventListener>) {
        self.emitter.add_listener(listener);
    }

    fn send(&self, input: SessionInput) -> Result<(), CallError> {
        self.inputs.send(input).map_err(|_| CallError::Closed)
    }
}

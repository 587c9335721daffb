//! Callroom core call logic.
//!
//! Pure Rust crate with no platform dependencies.
//! Consumed by native UI shells via UniFFI bindings.

pub mod bridge;
pub mod errors;
pub mod events;
pub mod permissions;
pub mod room;
pub mod session;
pub mod settings;
pub mod tracks;
pub mod transport;

pub use errors::CallError;
pub use events::{
    ConnectionStatus, EventEmitter, LocalMediaState, RemoteTrack, SessionEvent,
    SessionEventListener, SessionSnapshot, TransportEvent,
};
pub use permissions::{
    AlertPresenter, Capability, Permission, PermissionError, PermissionGate, PermissionService,
    PermissionStatus, PermissionStatuses, Platform,
};
pub use room::{CallHandle, CallManager};
pub use session::CallSession;
pub use settings::SessionConfig;
pub use tracks::RemoteTrackSet;
pub use transport::{MediaAck, Transport};

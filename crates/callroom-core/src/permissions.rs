use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::CallError;

/// Title used for every blocking permission alert.
pub const ALERT_TITLE: &str = "Error";

/// Capabilities a video call needs, queried as one batch.
pub const MEDIA_CAPABILITIES: [Capability; 2] = [Capability::Camera, Capability::Microphone];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Camera,
    Microphone,
}

/// Host OS, which decides the permission identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    #[default]
    Android,
}

impl Platform {
    /// Identifier the platform permission service uses for `capability`.
    pub fn permission_id(self, capability: Capability) -> &'static str {
        match (self, capability) {
            (Platform::Ios, Capability::Camera) => "ios.permission.CAMERA",
            (Platform::Ios, Capability::Microphone) => "ios.permission.MICROPHONE",
            (Platform::Android, Capability::Camera) => "android.permission.CAMERA",
            (Platform::Android, Capability::Microphone) => "android.permission.RECORD_AUDIO",
        }
    }

    pub fn permission(self, capability: Capability) -> Permission {
        Permission {
            capability,
            id: self.permission_id(capability),
        }
    }
}

/// A capability under the name the platform permission service knows it by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub capability: Capability,
    pub id: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    /// Not granted yet, the user can still be prompted.
    Denied,
    /// Permanently refused, only the OS settings can change it.
    Blocked,
    /// The hardware does not exist on this device.
    Unavailable,
}

/// Answer of the platform permission service for a batch of capabilities.
///
/// A capability absent from the answer reads as `Unavailable`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionStatuses(HashMap<Capability, PermissionStatus>);

impl PermissionStatuses {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: Capability, status: PermissionStatus) -> Self {
        self.insert(capability, status);
        self
    }

    pub fn insert(&mut self, capability: Capability, status: PermissionStatus) {
        self.0.insert(capability, status);
    }

    pub fn status(&self, capability: Capability) -> PermissionStatus {
        self.0
            .get(&capability)
            .copied()
            .unwrap_or(PermissionStatus::Unavailable)
    }
}

impl FromIterator<(Capability, PermissionStatus)> for PermissionStatuses {
    fn from_iter<I: IntoIterator<Item = (Capability, PermissionStatus)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Platform permission service (may show system dialogs on `request`).
///
/// Answers are keyed by capability; a permission missing from the answer
/// reads as `Unavailable`.
pub trait PermissionService: Send + Sync {
    fn check<'a>(
        &'a self,
        permissions: &'a [Permission],
    ) -> BoxFuture<'a, Result<PermissionStatuses, CallError>>;

    fn request<'a>(
        &'a self,
        permissions: &'a [Permission],
    ) -> BoxFuture<'a, Result<PermissionStatuses, CallError>>;
}

/// Presents a blocking, modal alert to the user.
pub trait AlertPresenter: Send + Sync {
    fn show_alert(&self, title: &str, message: &str);
}

/// Why a connection attempt was refused by the gate.
///
/// The display text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Hardware to support video calls is not available")]
    HardwareUnavailable,
    #[error("Permission to access hardware was blocked, please grant manually")]
    Blocked,
    #[error("One of the permissions was not granted")]
    NotGranted,
    #[error("Permission not granted")]
    Denied(Capability),
    #[error("Could not query media permissions: {0}")]
    Platform(String),
}

/// Ensures camera and microphone are authorized before connecting.
///
/// Every run queries the platform afresh; nothing is cached between runs.
#[derive(Clone)]
pub struct PermissionGate {
    service: Arc<dyn PermissionService>,
    alerts: Arc<dyn AlertPresenter>,
    platform: Platform,
}

impl PermissionGate {
    pub fn new(
        service: Arc<dyn PermissionService>,
        alerts: Arc<dyn AlertPresenter>,
        platform: Platform,
    ) -> Self {
        Self {
            service,
            alerts,
            platform,
        }
    }

    /// Run the negotiation once, without surfacing anything to the user.
    pub async fn check(&self) -> Result<(), PermissionError> {
        use Capability::{Camera, Microphone};
        use PermissionStatus::{Blocked, Denied, Granted, Unavailable};

        let media = MEDIA_CAPABILITIES.map(|c| self.platform.permission(c));
        let statuses = self
            .service
            .check(&media)
            .await
            .map_err(|e| PermissionError::Platform(e.to_string()))?;
        let camera = statuses.status(Camera);
        let microphone = statuses.status(Microphone);
        tracing::debug!("media permissions: camera={camera:?} microphone={microphone:?}");

        if camera == Unavailable || microphone == Unavailable {
            return Err(PermissionError::HardwareUnavailable);
        }
        if camera == Blocked || microphone == Blocked {
            return Err(PermissionError::Blocked);
        }

        match (camera, microphone) {
            (Denied, Denied) => {
                let answer = self
                    .service
                    .request(&media)
                    .await
                    .map_err(|e| PermissionError::Platform(e.to_string()))?;
                if answer.status(Camera) == Granted && answer.status(Microphone) == Granted {
                    Ok(())
                } else {
                    Err(PermissionError::NotGranted)
                }
            }
            (Denied, _) => self.request_single(Camera).await,
            (_, Denied) => self.request_single(Microphone).await,
            _ => Ok(()),
        }
    }

    /// Run the negotiation and call `on_granted` once if both capabilities
    /// end up available. Otherwise alert the user and drop the continuation.
    pub async fn ensure_media_permissions<F>(&self, on_granted: F) -> Result<(), PermissionError>
    where
        F: FnOnce(),
    {
        match self.check().await {
            Ok(()) => {
                tracing::info!("media permissions granted");
                on_granted();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("media permissions refused: {e}");
                self.alerts.show_alert(ALERT_TITLE, &e.to_string());
                Err(e)
            }
        }
    }

    async fn request_single(&self, capability: Capability) -> Result<(), PermissionError> {
        let permission = self.platform.permission(capability);
        let answer = self
            .service
            .request(std::slice::from_ref(&permission))
            .await
            .map_err(|e| PermissionError::Platform(e.to_string()))?;
        match answer.status(capability) {
            PermissionStatus::Granted => Ok(()),
            _ => Err(PermissionError::Denied(capability)),
        }
    }
}

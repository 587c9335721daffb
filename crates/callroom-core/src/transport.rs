use tokio::sync::oneshot;

/// Acknowledgement of a local media change, carrying the enabled state the
/// provider actually applied.
pub type MediaAck = oneshot::Receiver<bool>;

/// Commands accepted by the external video-call provider.
///
/// Implementations only forward to the provider; lifecycle and track
/// changes come back as [`crate::events::TransportEvent`]s.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, credential: &str);

    fn disconnect(&self);

    fn set_local_audio_enabled(&self, enabled: bool) -> MediaAck;

    fn set_local_video_enabled(&self, enabled: bool) -> MediaAck;

    fn flip_camera(&self);
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn connect(&self, credential: &str) {
        (**self).connect(credential)
    }

    fn disconnect(&self) {
        (**self).disconnect()
    }

    fn set_local_audio_enabled(&self, enabled: bool) -> MediaAck {
        (**self).set_local_audio_enabled(enabled)
    }

    fn set_local_video_enabled(&self, enabled: bool) -> MediaAck {
        (**self).set_local_video_enabled(enabled)
    }

    fn flip_camera(&self) {
        (**self).flip_camera()
    }
}

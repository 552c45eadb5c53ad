use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::errors::TransportError;
use crate::registration::AccessToken;
use crate::tracks::ParticipantTrackOrPlaceholder;

/// Pixel density used to pick simulcast layers for adaptive streaming.
///
/// The LiveKit Rust SDK only exposes adaptive streaming as an on/off switch
/// and sizes layers from the rendered video, so the device screen is the
/// only supported density.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelDensity {
    #[default]
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveStream {
    pub pixel_density: PixelDensity,
}

/// Everything the transport needs to join one room.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOptions {
    pub server_url: String,
    pub token: AccessToken,
    pub video: bool,
    pub audio: bool,
    pub adaptive_stream: Option<AdaptiveStream>,
}

impl JoinOptions {
    /// Publish camera and microphone, with adaptive streaming keyed to
    /// `pixel_density`.
    pub fn new(
        server_url: impl Into<String>,
        token: AccessToken,
        pixel_density: PixelDensity,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            token,
            video: true,
            audio: true,
            adaptive_stream: Some(AdaptiveStream { pixel_density }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Participants joined or left, or camera tracks were published,
    /// unpublished, subscribed or unsubscribed.
    TracksChanged,
    Disconnected { reason: String },
}

/// The real-time room primitive (LiveKit in production).
pub trait RoomTransport: Send + Sync + 'static {
    /// Join the room. Room events arrive on the returned channel until it
    /// closes or yields `Disconnected`.
    fn connect(
        &self,
        options: JoinOptions,
    ) -> impl Future<Output = Result<UnboundedReceiver<TransportEvent>, TransportError>> + Send;

    /// Every camera-source track across participants, including unsubscribed
    /// ones, with a placeholder for participants without a camera.
    fn camera_tracks(&self) -> impl Future<Output = Vec<ParticipantTrackOrPlaceholder>> + Send;

    fn set_camera_enabled(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn set_microphone_enabled(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc::{self, UnboundedSender};

    #[derive(Default)]
    pub struct FakeTransport {
        pub tracks: Mutex<Vec<ParticipantTrackOrPlaceholder>>,
        pub connect_error: Mutex<Option<TransportError>>,
        pub last_options: Mutex<Option<JoinOptions>>,
        pub connect_calls: AtomicUsize,
        pub disconnect_calls: AtomicUsize,
        pub camera_enabled: Mutex<Option<bool>>,
        pub microphone_enabled: Mutex<Option<bool>>,
        events: Mutex<Option<UnboundedSender<TransportEvent>>>,
    }

    impl FakeTransport {
        pub fn set_tracks(&self, tracks: Vec<ParticipantTrackOrPlaceholder>) {
            *self.tracks.lock().unwrap() = tracks;
            self.send(TransportEvent::TracksChanged);
        }

        pub fn drop_connection(&self, reason: &str) {
            self.send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
        }

        /// End the event stream without a `Disconnected` event.
        pub fn close_stream(&self) {
            self.events.lock().unwrap().take();
        }

        pub fn connects(&self) -> usize {
            self.connect_calls.load(Ordering::SeqCst)
        }

        pub fn disconnects(&self) -> usize {
            self.disconnect_calls.load(Ordering::SeqCst)
        }

        fn send(&self, event: TransportEvent) {
            if let Some(tx) = self.events.lock().unwrap().as_ref() {
                let _ = tx.send(event);
            }
        }
    }

    impl RoomTransport for Arc<FakeTransport> {
        async fn connect(
            &self,
            options: JoinOptions,
        ) -> Result<UnboundedReceiver<TransportEvent>, TransportError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_options.lock().unwrap() = Some(options);
            if let Some(e) = self.connect_error.lock().unwrap().clone() {
                return Err(e);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.events.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn camera_tracks(&self) -> Vec<ParticipantTrackOrPlaceholder> {
            self.tracks.lock().unwrap().clone()
        }

        async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError> {
            *self.camera_enabled.lock().unwrap() = Some(enabled);
            Ok(())
        }

        async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
            *self.microphone_enabled.lock().unwrap() = Some(enabled);
            Ok(())
        }

        async fn disconnect(&self) {
            self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
            self.events.lock().unwrap().take();
        }
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use livekit::options::TrackPublishOptions;
use livekit::prelude::*;
use livekit::track::TrackSource as LkTrackSource;
use livekit::webrtc::audio_source::native::NativeAudioSource;
use livekit::webrtc::prelude::*;
use livekit::webrtc::video_source::native::NativeVideoSource;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::errors::TransportError;
use crate::participants::ParticipantRoster;
use crate::tracks::{ParticipantTrackOrPlaceholder, TrackReference};
use crate::transport::{JoinOptions, RoomTransport, TransportEvent};

/// Audio source options matching the mobile capture pipeline.
const AUDIO_SAMPLE_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u32 = 1;
const AUDIO_QUEUE_SIZE_MS: u32 = 100;

/// Default camera resolution.
const VIDEO_WIDTH: u32 = 1280;
const VIDEO_HEIGHT: u32 = 720;

/// [`RoomTransport`] backed by a LiveKit room.
///
/// Native shells feed captured PCM and camera frames into the sources
/// exposed by [`LiveKitTransport::audio_source`] and
/// [`LiveKitTransport::video_source`].
pub struct LiveKitTransport {
    room: Arc<Mutex<Option<Arc<Room>>>>,
    roster: Arc<Mutex<ParticipantRoster>>,
    audio_source: Arc<Mutex<Option<NativeAudioSource>>>,
    video_source: Arc<Mutex<Option<NativeVideoSource>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for LiveKitTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveKitTransport {
    pub fn new() -> Self {
        Self {
            room: Arc::new(Mutex::new(None)),
            roster: Arc::new(Mutex::new(ParticipantRoster::new())),
            audio_source: Arc::new(Mutex::new(None)),
            video_source: Arc::new(Mutex::new(None)),
            event_task: Mutex::new(None),
        }
    }

    /// Get the audio source for feeding PCM frames from native capture.
    pub async fn audio_source(&self) -> Option<NativeAudioSource> {
        self.audio_source.lock().await.clone()
    }

    /// Get the video source for feeding video frames from native capture.
    pub async fn video_source(&self) -> Option<NativeVideoSource> {
        self.video_source.lock().await.clone()
    }

    async fn current_room(&self) -> Result<Arc<Room>, TransportError> {
        self.room
            .lock()
            .await
            .clone()
            .ok_or(TransportError::NotConnected)
    }

    /// Create a NativeAudioSource and publish it as the microphone track.
    async fn publish_microphone(&self, room: &Room) -> Result<(), TransportError> {
        let source = NativeAudioSource::new(
            AudioSourceOptions {
                echo_cancellation: true,
                noise_suppression: true,
                auto_gain_control: true,
            },
            AUDIO_SAMPLE_RATE,
            AUDIO_CHANNELS,
            AUDIO_QUEUE_SIZE_MS,
        );

        let track = LocalAudioTrack::create_audio_track(
            "microphone",
            RtcAudioSource::Native(source.clone()),
        );

        room.local_participant()
            .publish_track(
                LocalTrack::Audio(track),
                TrackPublishOptions {
                    source: LkTrackSource::Microphone,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TransportError::Publish(format!("microphone: {e}")))?;

        *self.audio_source.lock().await = Some(source);
        tracing::info!("microphone track published");
        Ok(())
    }

    async fn publish_local_tracks(
        &self,
        room: &Room,
        options: &JoinOptions,
    ) -> Result<(), TransportError> {
        if options.audio {
            self.publish_microphone(room).await?;
        }
        if options.video {
            self.publish_camera(room).await?;
        }
        Ok(())
    }

    /// Create a NativeVideoSource and publish it as the camera track.
    async fn publish_camera(&self, room: &Room) -> Result<(), TransportError> {
        let source = NativeVideoSource::new(
            VideoResolution {
                width: VIDEO_WIDTH,
                height: VIDEO_HEIGHT,
            },
            false, // not a screencast
        );

        let track = LocalVideoTrack::create_video_track(
            "camera",
            RtcVideoSource::Native(source.clone()),
        );

        room.local_participant()
            .publish_track(
                LocalTrack::Video(track),
                TrackPublishOptions {
                    source: LkTrackSource::Camera,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TransportError::Publish(format!("camera: {e}")))?;

        *self.video_source.lock().await = Some(source);
        tracing::info!("camera track published");
        Ok(())
    }

    /// Mute or unmute the first local publication from `source`.
    /// Returns false when nothing is published from it.
    fn set_local_muted(room: &Room, source: LkTrackSource, muted: bool) -> bool {
        let local = room.local_participant();
        for (_, publication) in local.track_publications() {
            if publication.source() == source {
                if muted {
                    publication.mute();
                } else {
                    publication.unmute();
                }
                return true;
            }
        }
        false
    }

    fn local_entry(local: &LocalParticipant) -> ParticipantTrackOrPlaceholder {
        let identity = local.identity().to_string();
        let camera = local
            .track_publications()
            .into_values()
            .find(|publication| publication.source() == LkTrackSource::Camera);
        match camera {
            Some(publication) => ParticipantTrackOrPlaceholder::Track(TrackReference {
                identity,
                is_speaking: local.is_speaking(),
                track_sid: publication.sid().to_string(),
                subscribed: true,
            }),
            None => ParticipantTrackOrPlaceholder::Placeholder { identity },
        }
    }

    fn remote_entry(participant: &RemoteParticipant) -> ParticipantTrackOrPlaceholder {
        let identity = participant.identity().to_string();
        let camera = participant
            .track_publications()
            .into_values()
            .find(|publication| publication.source() == LkTrackSource::Camera);
        match camera {
            Some(publication) => ParticipantTrackOrPlaceholder::Track(TrackReference {
                identity,
                is_speaking: participant.is_speaking(),
                track_sid: publication.sid().to_string(),
                subscribed: publication.is_subscribed(),
            }),
            None => ParticipantTrackOrPlaceholder::Placeholder { identity },
        }
    }

    async fn event_loop(
        mut events: UnboundedReceiver<RoomEvent>,
        tx: UnboundedSender<TransportEvent>,
        roster: Arc<Mutex<ParticipantRoster>>,
        room_ref: Arc<Mutex<Option<Arc<Room>>>>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                RoomEvent::ParticipantConnected(participant) => {
                    roster.lock().await.add(participant.identity().to_string());
                    let _ = tx.send(TransportEvent::TracksChanged);
                }

                RoomEvent::ParticipantDisconnected(participant) => {
                    roster.lock().await.remove(&participant.identity().to_string());
                    let _ = tx.send(TransportEvent::TracksChanged);
                }

                RoomEvent::TrackPublished { .. }
                | RoomEvent::TrackUnpublished { .. }
                | RoomEvent::TrackSubscribed { .. }
                | RoomEvent::TrackUnsubscribed { .. }
                | RoomEvent::LocalTrackPublished { .. }
                | RoomEvent::LocalTrackUnpublished { .. }
                | RoomEvent::ActiveSpeakersChanged { .. } => {
                    let _ = tx.send(TransportEvent::TracksChanged);
                }

                RoomEvent::Reconnecting => {
                    tracing::warn!("room connection lost, sdk is reconnecting");
                }

                RoomEvent::Reconnected => {
                    tracing::info!("room reconnected");
                    let _ = tx.send(TransportEvent::TracksChanged);
                }

                RoomEvent::Disconnected { reason } => {
                    tracing::info!("room disconnected: {reason:?}");
                    roster.lock().await.clear();
                    *room_ref.lock().await = None;
                    let _ = tx.send(TransportEvent::Disconnected {
                        reason: format!("{reason:?}"),
                    });
                    break;
                }

                _ => {
                    tracing::debug!("unhandled room event: {event:?}");
                }
            }
        }

        tracing::info!("room event loop ended");
    }
}

/// Put entries in roster order; participants the roster has not seen yet
/// follow, sorted by identity.
fn in_join_order<E>(roster: &[String], mut by_identity: HashMap<String, E>) -> Vec<E> {
    let mut ordered = Vec::with_capacity(by_identity.len());
    for identity in roster {
        if let Some(entry) = by_identity.remove(identity) {
            ordered.push(entry);
        }
    }
    let mut rest: Vec<(String, E)> = by_identity.into_iter().collect();
    rest.sort_by(|a, b| a.0.cmp(&b.0));
    ordered.extend(rest.into_iter().map(|(_, entry)| entry));
    ordered
}

impl RoomTransport for LiveKitTransport {
    async fn connect(
        &self,
        options: JoinOptions,
    ) -> Result<UnboundedReceiver<TransportEvent>, TransportError> {
        let mut room_options = RoomOptions::default();
        room_options.auto_subscribe = true;
        // Layers are sized from the rendered video at screen density.
        room_options.adaptive_stream = options.adaptive_stream.is_some();

        tracing::info!("connecting to {}", options.server_url);
        let (room, events) =
            Room::connect(&options.server_url, options.token.as_str(), room_options)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
        let room = Arc::new(room);

        // Seed participants already in the room
        {
            let mut roster = self.roster.lock().await;
            roster.clear();
            let mut existing: Vec<String> = room
                .remote_participants()
                .into_values()
                .map(|p| p.identity().to_string())
                .collect();
            existing.sort();
            for identity in existing {
                roster.add(identity);
            }
        }

        *self.room.lock().await = Some(room.clone());

        if let Err(e) = self.publish_local_tracks(&room, &options).await {
            tracing::error!("leaving room after publish failure: {e}");
            self.disconnect().await;
            return Err(e);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::event_loop(
            events,
            tx,
            self.roster.clone(),
            self.room.clone(),
        ));
        if let Some(stale) = self.event_task.lock().await.replace(handle) {
            stale.abort();
        }

        Ok(rx)
    }

    async fn camera_tracks(&self) -> Vec<ParticipantTrackOrPlaceholder> {
        let Some(room) = self.room.lock().await.clone() else {
            return Vec::new();
        };

        let remotes: HashMap<String, ParticipantTrackOrPlaceholder> = room
            .remote_participants()
            .into_values()
            .map(|p| (p.identity().to_string(), Self::remote_entry(&p)))
            .collect();
        let roster = self.roster.lock().await;

        let mut entries = vec![Self::local_entry(&room.local_participant())];
        entries.extend(in_join_order(roster.identities(), remotes));
        entries
    }

    async fn set_camera_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        let room = self.current_room().await?;
        if !Self::set_local_muted(&room, LkTrackSource::Camera, !enabled) && enabled {
            self.publish_camera(&room).await?;
        }
        tracing::info!("camera enabled: {enabled}");
        Ok(())
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        let room = self.current_room().await?;
        if !Self::set_local_muted(&room, LkTrackSource::Microphone, !enabled) && enabled {
            self.publish_microphone(&room).await?;
        }
        tracing::info!("microphone enabled: {enabled}");
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(handle) = self.event_task.lock().await.take() {
            handle.abort();
        }
        let room = self.room.lock().await.take();
        if let Some(room) = room {
            if let Err(e) = room.close().await {
                tracing::warn!("error closing room: {e}");
            }
        }
        self.roster.lock().await.clear();
        self.audio_source.lock().await.take();
        self.video_source.lock().await.take();
    }
}

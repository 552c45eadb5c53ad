//! LiveRoom core: the join-room screen logic.
//!
//! Sequences username → token → audio session → room join, and maps the
//! room's camera tracks onto a two-column tile grid. Platform audio and the
//! UI itself stay in the native shell.

pub mod audio_session;
pub mod clip;
pub mod config;
pub mod controller;
pub mod errors;
pub mod events;
pub mod grid;
#[cfg(feature = "livekit")]
pub mod livekit_transport;
pub mod logging;
pub mod participants;
pub mod registration;
pub mod tracks;
pub mod transport;
pub mod username;
pub mod view;

pub use audio_session::{AudioConfig, AudioSession, AudioSessionManager, NoopAudioSession};
pub use clip::ClipPlayer;
pub use config::{ScreenConfig, StartupMode};
pub use controller::{ConnectionController, ConnectionPhase};
pub use errors::{AudioSessionError, ConfigError, RegistrationError, ScreenError, TransportError};
pub use events::{ScreenEvent, ScreenEventListener};
pub use grid::{GridView, Tile, TileAspect, TrackGridPresenter};
#[cfg(feature = "livekit")]
pub use livekit_transport::LiveKitTransport;
pub use logging::init_logging;
pub use registration::{AccessToken, Registrar, RegistrationClient};
pub use tracks::{ParticipantTrackOrPlaceholder, TrackReference};
pub use transport::{JoinOptions, PixelDensity, RoomTransport, TransportEvent};
pub use view::{RoomView, ScreenView};

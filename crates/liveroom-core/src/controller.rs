use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::audio_session::{AudioConfig, AudioSession, AudioSessionManager};
use crate::clip::ClipPlayer;
use crate::config::{ScreenConfig, StartupMode};
use crate::errors::{ScreenError, TransportError};
use crate::events::{EventEmitter, ScreenEvent, ScreenEventListener};
use crate::grid::{GridView, TrackGridPresenter};
use crate::registration::{AccessToken, Registrar};
use crate::transport::{JoinOptions, RoomTransport, TransportEvent};
use crate::username::{generate_username, is_submittable};
use crate::view::{RoomView, ScreenView};

/// Where the screen is in the join flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Login form. `error` holds the failure of the previous attempt.
    Idle { error: Option<ScreenError> },
    /// Token request in flight.
    Authenticating,
    /// Token held, audio session not ready yet.
    AudioPreparing { token: AccessToken },
    /// Token held, audio ready, room view active.
    Joined { token: AccessToken },
}

impl ConnectionPhase {
    pub fn idle() -> Self {
        ConnectionPhase::Idle { error: None }
    }

    pub fn token(&self) -> Option<&AccessToken> {
        match self {
            ConnectionPhase::AudioPreparing { token } | ConnectionPhase::Joined { token } => {
                Some(token)
            }
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ScreenError> {
        match self {
            ConnectionPhase::Idle { error } => error.as_ref(),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ConnectionPhase::Idle { .. })
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, ConnectionPhase::Joined { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionPhase::Idle { .. } => "idle",
            ConnectionPhase::Authenticating => "authenticating",
            ConnectionPhase::AudioPreparing { .. } => "audio-preparing",
            ConnectionPhase::Joined { .. } => "joined",
        }
    }
}

struct ScreenState {
    mounted: bool,
    /// Bumped on mount, unmount and leave. Work started under an older
    /// generation must not touch the state.
    generation: u64,
    username: String,
    phase: ConnectionPhase,
}

struct Inner<R, A, T> {
    config: ScreenConfig,
    registrar: R,
    audio: AudioSessionManager<A>,
    transport: T,
    presenter: TrackGridPresenter,
    emitter: EventEmitter,
    state: Mutex<ScreenState>,
    attempt: Mutex<Option<JoinHandle<()>>>,
}

/// Drives one join screen: username → token → audio session → room.
///
/// All suspending work runs in a single task bound to the current mount;
/// `leave` and `unmount` abort it and bump the generation so that late
/// completions are dropped.
pub struct ConnectionController<R, A, T> {
    inner: Arc<Inner<R, A, T>>,
}

impl<R, A, T> Clone for ConnectionController<R, A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R, A, T> ConnectionController<R, A, T>
where
    R: Registrar,
    A: AudioSession,
    T: RoomTransport,
{
    pub fn new(config: ScreenConfig, registrar: R, audio_session: A, transport: T) -> Self {
        let emitter = EventEmitter::new();
        let presenter =
            TrackGridPresenter::new(config.screen_width, config.tile_aspect, emitter.clone());
        Self {
            inner: Arc::new(Inner {
                audio: AudioSessionManager::new(audio_session, AudioConfig::default()),
                registrar,
                transport,
                presenter,
                emitter,
                state: Mutex::new(ScreenState {
                    mounted: false,
                    generation: 0,
                    username: String::new(),
                    phase: ConnectionPhase::idle(),
                }),
                attempt: Mutex::new(None),
                config,
            }),
        }
    }

    /// Register a listener for phase and grid updates.
    pub fn add_listener(&self, listener: Arc<dyn ScreenEventListener>) {
        self.inner.emitter.add_listener(listener);
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.inner.config
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Show the screen. Must be called from within a tokio runtime.
    pub fn mount(&self) {
        let mode = self.inner.config.startup_mode;
        let phase = {
            let mut state = self.inner.lock_state();
            if state.mounted {
                tracing::warn!("mount: screen already mounted");
                return;
            }
            state.mounted = true;
            state.generation += 1;
            state.username = match mode {
                StartupMode::AutoStart | StartupMode::Prefilled => generate_username(),
                StartupMode::ManualEntry => String::new(),
            };
            state.phase = ConnectionPhase::idle();
            state.phase.clone()
        };
        tracing::info!("screen mounted ({mode:?})");
        self.inner.emitter.emit(ScreenEvent::PhaseChanged(phase));

        if mode == StartupMode::AutoStart {
            if let Err(e) = self.submit() {
                tracing::error!("auto-start submit failed: {e}");
            }
        }
    }

    /// Tear the screen down: abort pending work, stop the audio session,
    /// leave the room and discard the token.
    pub async fn unmount(&self) {
        let was_joined = {
            let mut state = self.inner.lock_state();
            if !state.mounted {
                return;
            }
            state.mounted = false;
            self.inner.reset(&mut state)
        };
        tracing::info!("screen unmounted");
        self.inner.release(was_joined).await;
    }

    /// Leave the room (or abandon the pending attempt) and return to the
    /// login form. The username is kept.
    pub async fn leave(&self) -> Result<(), ScreenError> {
        let (was_joined, phase) = {
            let mut state = self.inner.lock_state();
            if !state.mounted {
                return Err(ScreenError::NotMounted);
            }
            let was_joined = self.inner.reset(&mut state);
            (was_joined, state.phase.clone())
        };
        tracing::info!("leaving room");
        self.inner.release(was_joined).await;
        self.inner.emitter.emit(ScreenEvent::PhaseChanged(phase));
        Ok(())
    }

    /// Edit the username field. Only allowed on the login form.
    pub fn set_username(&self, username: impl Into<String>) -> Result<(), ScreenError> {
        let mut state = self.inner.lock_state();
        if !state.mounted {
            return Err(ScreenError::NotMounted);
        }
        if !state.phase.is_idle() {
            return Err(ScreenError::AttemptInFlight);
        }
        state.username = username.into();
        Ok(())
    }

    /// The validate control: start a connect attempt with the current
    /// username. At most one attempt is in flight per screen.
    pub fn submit(&self) -> Result<(), ScreenError> {
        let (generation, username) = {
            let mut state = self.inner.lock_state();
            if !state.mounted {
                return Err(ScreenError::NotMounted);
            }
            if !state.phase.is_idle() {
                tracing::debug!("submit ignored: attempt already {}", state.phase.name());
                return Err(ScreenError::AttemptInFlight);
            }
            if !is_submittable(&state.username) {
                state.phase = ConnectionPhase::Idle {
                    error: Some(ScreenError::EmptyUsername),
                };
                let phase = state.phase.clone();
                drop(state);
                self.inner.emitter.emit(ScreenEvent::PhaseChanged(phase));
                return Err(ScreenError::EmptyUsername);
            }
            state.phase = ConnectionPhase::Authenticating;
            (state.generation, state.username.clone())
        };
        self.inner
            .emitter
            .emit(ScreenEvent::PhaseChanged(ConnectionPhase::Authenticating));

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            inner.run_attempt(generation, username).await;
        });
        if let Some(stale) = self.inner.lock_attempt().replace(handle) {
            stale.abort();
        }
        Ok(())
    }

    /// Device rotation or resize.
    pub fn set_screen_width(&self, screen_width: f32) -> GridView {
        self.inner.presenter.set_screen_width(screen_width)
    }

    pub async fn set_camera_enabled(&self, enabled: bool) -> Result<(), ScreenError> {
        self.inner.ensure_joined()?;
        self.inner.transport.set_camera_enabled(enabled).await?;
        Ok(())
    }

    pub async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), ScreenError> {
        self.inner.ensure_joined()?;
        self.inner.transport.set_microphone_enabled(enabled).await?;
        Ok(())
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.inner.lock_state().phase.clone()
    }

    pub fn username(&self) -> String {
        self.inner.lock_state().username.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.lock_state().mounted
    }

    pub fn is_audio_ready(&self) -> bool {
        self.inner.audio.is_ready()
    }

    pub fn grid(&self) -> GridView {
        self.inner.presenter.view()
    }

    /// The view the shell should display right now.
    pub fn view(&self) -> ScreenView {
        let (phase, username) = {
            let state = self.inner.lock_state();
            (state.phase.clone(), state.username.clone())
        };
        match phase {
            ConnectionPhase::Idle { error } => ScreenView::LoginForm {
                username,
                error: error.map(|e| e.to_string()),
            },
            ConnectionPhase::Authenticating | ConnectionPhase::AudioPreparing { .. } => {
                ScreenView::Loading
            }
            ConnectionPhase::Joined { .. } => {
                let config = &self.inner.config;
                ScreenView::Room(RoomView::new(
                    ClipPlayer::new(config.clip_id.clone(), config.clip_height),
                    self.inner.presenter.view(),
                ))
            }
        }
    }
}

impl<R, A, T> Inner<R, A, T>
where
    R: Registrar,
    A: AudioSession,
    T: RoomTransport,
{
    fn lock_state(&self) -> MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_attempt(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Invalidate the current generation and clear the token. Returns whether
    /// a room was joined.
    fn reset(&self, state: &mut ScreenState) -> bool {
        let was_joined = state.phase.is_joined();
        state.generation += 1;
        state.phase = ConnectionPhase::idle();
        was_joined
    }

    async fn release(&self, was_joined: bool) {
        let attempt = self.lock_attempt().take();
        if let Some(handle) = attempt {
            handle.abort();
            // An attempt being polled on another worker only stops at its
            // next await; wait so teardown runs after any in-flight start.
            let _ = handle.await;
        }
        self.audio.teardown();
        if was_joined {
            self.transport.disconnect().await;
        }
        self.presenter.clear();
    }

    fn ensure_joined(&self) -> Result<(), ScreenError> {
        let state = self.lock_state();
        if state.phase.is_joined() {
            Ok(())
        } else {
            Err(ScreenError::NotJoined)
        }
    }

    /// Apply `phase` if `generation` is still current.
    fn advance(&self, generation: u64, phase: ConnectionPhase) -> bool {
        {
            let mut state = self.lock_state();
            if state.generation != generation {
                tracing::debug!("discarding stale transition to {}", phase.name());
                return false;
            }
            state.phase = phase.clone();
        }
        tracing::info!("phase -> {}", phase.name());
        self.emitter.emit(ScreenEvent::PhaseChanged(phase));
        true
    }

    fn fail(&self, generation: u64, error: ScreenError) {
        tracing::error!("connect attempt failed: {error}");
        let was_joined = self.lock_state().phase.is_joined();
        if self.advance(generation, ConnectionPhase::Idle { error: Some(error) }) && was_joined {
            self.presenter.clear();
        }
    }

    async fn refresh_grid(&self, generation: u64) {
        let tracks = self.transport.camera_tracks().await;
        let current = {
            let state = self.lock_state();
            state.generation == generation && state.phase.is_joined()
        };
        if current {
            self.presenter.update_tracks(tracks);
        }
    }

    async fn run_attempt(&self, generation: u64, username: String) {
        let token = match self.registrar.register(&username).await {
            Ok(token) => token,
            Err(e) => return self.fail(generation, e.into()),
        };
        if !self.advance(
            generation,
            ConnectionPhase::AudioPreparing {
                token: token.clone(),
            },
        ) {
            return;
        }

        let lease = match self.audio.prepare().await {
            Ok(lease) => lease,
            Err(e) => return self.fail(generation, e.into()),
        };
        if !self.advance(
            generation,
            ConnectionPhase::Joined {
                token: token.clone(),
            },
        ) {
            return;
        }

        let options = JoinOptions::new(
            self.config.server_url.clone(),
            token,
            self.config.pixel_density,
        );
        let mut events = match self.transport.connect(options).await {
            Ok(events) => events,
            Err(e) => {
                self.transport.disconnect().await;
                drop(lease);
                return self.fail(generation, e.into());
            }
        };
        self.refresh_grid(generation).await;

        let reason = loop {
            match events.recv().await {
                Some(TransportEvent::TracksChanged) => self.refresh_grid(generation).await,
                Some(TransportEvent::Disconnected { reason }) => break reason,
                None => break "event stream closed".to_string(),
            }
        };
        tracing::warn!("room connection ended: {reason}");
        self.transport.disconnect().await;
        drop(lease);
        self.fail(generation, TransportError::Disconnected(reason).into());
    }
}

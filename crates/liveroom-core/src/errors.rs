use thiserror::Error;

/// Failure while acquiring an access token from the registration service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("registration request failed: {0}")]
    Network(String),
    #[error("registration service returned status {status}")]
    Status { status: u16 },
    #[error("invalid registration response: {0}")]
    Malformed(String),
    #[error("registration service returned an empty token")]
    EmptyToken,
    #[error("registration timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

/// Failure while configuring or starting the platform audio session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioSessionError {
    #[error("audio configuration rejected: {0}")]
    ConfigurationRejected(String),
    #[error("audio device busy")]
    DeviceBusy,
    #[error("audio permission denied")]
    PermissionDenied,
    #[error("audio session error: {0}")]
    Platform(String),
    #[error("audio session is already being prepared")]
    AlreadyPreparing,
    #[error("audio session was torn down while starting")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("room connection failed: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("not connected to a room")]
    NotConnected,
    #[error("disconnected from room: {0}")]
    Disconnected(String),
}

/// Errors surfaced to the screen, either as the failure of a connect
/// attempt or as a rejected command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    AudioSession(#[from] AudioSessionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("a connection attempt is already in progress")]
    AttemptInFlight,
    #[error("not joined to a room")]
    NotJoined,
    #[error("screen is not mounted")]
    NotMounted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid url in config: {0}")]
    Url(#[from] url::ParseError),
}

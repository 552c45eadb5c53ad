/// A live, subscribable camera track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReference {
    pub identity: String,
    pub is_speaking: bool,
    pub track_sid: String,
    /// False for remote publications that are known but not subscribed yet.
    pub subscribed: bool,
}

/// One grid entry as reported by the transport: either a camera track or a
/// participant without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantTrackOrPlaceholder {
    Track(TrackReference),
    Placeholder { identity: String },
}

impl ParticipantTrackOrPlaceholder {
    pub fn placeholder(identity: impl Into<String>) -> Self {
        Self::Placeholder {
            identity: identity.into(),
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Self::Track(track) => &track.identity,
            Self::Placeholder { identity } => identity,
        }
    }

    pub fn has_video(&self) -> bool {
        matches!(self, Self::Track(_))
    }
}

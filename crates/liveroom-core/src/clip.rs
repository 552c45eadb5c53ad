/// Embedded clip shown above the participant grid. Playback itself belongs
/// to the host's embed player; this only carries what it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPlayer {
    pub clip_id: String,
    pub height: u32,
}

impl ClipPlayer {
    pub fn new(clip_id: impl Into<String>, height: u32) -> Self {
        Self {
            clip_id: clip_id.into(),
            height,
        }
    }

    pub fn embed_url(&self) -> String {
        format!("https://www.youtube.com/embed/{}", self.clip_id)
    }
}

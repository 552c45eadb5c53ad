use crate::clip::ClipPlayer;
use crate::grid::GridView;

pub const ROOM_TITLE: &str = "Live Room";

/// The three mutually exclusive screens.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenView {
    /// Username field plus validate control. `error` is the message of the
    /// last failed attempt.
    LoginForm {
        username: String,
        error: Option<String>,
    },
    Loading,
    Room(RoomView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub title: &'static str,
    pub clip: ClipPlayer,
    pub participant_count: String,
    pub grid: GridView,
}

impl RoomView {
    pub fn new(clip: ClipPlayer, grid: GridView) -> Self {
        Self {
            title: ROOM_TITLE,
            clip,
            participant_count: grid.participant_count_label(),
            grid,
        }
    }
}

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::events::{EventEmitter, ScreenEvent};
use crate::tracks::ParticipantTrackOrPlaceholder;

pub const GRID_COLUMNS: usize = 2;
/// Horizontal padding plus the gutter between the two columns.
pub const GRID_MARGIN: f32 = 60.0;
pub const NO_VIDEO_TEXT: &str = "No video";

/// Fixed aspect ratio shared by every tile of a grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileAspect {
    #[default]
    Square,
    Widescreen,
}

impl TileAspect {
    pub fn height_for(self, width: f32) -> f32 {
        match self {
            TileAspect::Square => width,
            TileAspect::Widescreen => width * 9.0 / 16.0,
        }
    }
}

/// Width of one grid cell for a device of the given width.
pub fn tile_width(screen_width: f32) -> f32 {
    (screen_width - GRID_MARGIN) / GRID_COLUMNS as f32
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tile {
    Video {
        key: String,
        track_sid: String,
        label: String,
        speaking: bool,
        width: f32,
        height: f32,
    },
    Placeholder {
        key: String,
        label: String,
        subtext: &'static str,
        width: f32,
        height: f32,
    },
}

impl Tile {
    pub fn label(&self) -> &str {
        match self {
            Tile::Video { label, .. } | Tile::Placeholder { label, .. } => label,
        }
    }

    pub fn has_video(&self) -> bool {
        matches!(self, Tile::Video { .. })
    }

    pub fn width(&self) -> f32 {
        match self {
            Tile::Video { width, .. } | Tile::Placeholder { width, .. } => *width,
        }
    }
}

/// One full render pass of the participant grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub tiles: Vec<Tile>,
    pub tile_width: f32,
}

impl GridView {
    pub fn empty(screen_width: f32) -> Self {
        Self {
            tiles: Vec::new(),
            tile_width: tile_width(screen_width),
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(GRID_COLUMNS)
    }

    pub fn participant_count_label(&self) -> String {
        participant_count_label(self.tiles.len())
    }
}

pub fn participant_count_label(count: usize) -> String {
    if count == 1 {
        "1 participant".to_string()
    } else {
        format!("{count} participants")
    }
}

/// Identity clipped to its first line, or `Participant N` when empty.
pub fn tile_label(identity: &str, index: usize) -> String {
    if identity.is_empty() {
        return format!("Participant {}", index + 1);
    }
    match identity.split_once(['\r', '\n']) {
        Some((first, _)) => format!("{first}\u{2026}"),
        None => identity.to_string(),
    }
}

/// Map transport entries to tiles, one per entry, in entry order.
pub fn render_grid(
    entries: &[ParticipantTrackOrPlaceholder],
    screen_width: f32,
    aspect: TileAspect,
) -> GridView {
    let width = tile_width(screen_width);
    let height = aspect.height_for(width);

    let tiles = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            ParticipantTrackOrPlaceholder::Track(track) => Tile::Video {
                key: format!("{}-{index}", track.identity),
                track_sid: track.track_sid.clone(),
                label: tile_label(&track.identity, index),
                speaking: track.is_speaking,
                width,
                height,
            },
            ParticipantTrackOrPlaceholder::Placeholder { identity } => Tile::Placeholder {
                key: format!("placeholder-{index}"),
                label: tile_label(identity, index),
                subtext: NO_VIDEO_TEXT,
                width,
                height,
            },
        })
        .collect();

    GridView {
        tiles,
        tile_width: width,
    }
}

struct PresenterState {
    screen_width: f32,
    entries: Vec<ParticipantTrackOrPlaceholder>,
    view: GridView,
}

/// Keeps the latest track snapshot and device width, re-rendering the whole
/// grid whenever either changes.
pub struct TrackGridPresenter {
    aspect: TileAspect,
    state: Mutex<PresenterState>,
    emitter: EventEmitter,
}

impl TrackGridPresenter {
    pub fn new(screen_width: f32, aspect: TileAspect, emitter: EventEmitter) -> Self {
        Self {
            aspect,
            state: Mutex::new(PresenterState {
                screen_width,
                entries: Vec::new(),
                view: GridView::empty(screen_width),
            }),
            emitter,
        }
    }

    pub fn update_tracks(&self, entries: Vec<ParticipantTrackOrPlaceholder>) -> GridView {
        self.rerender(|state| state.entries = entries)
    }

    /// Device rotation or window resize.
    pub fn set_screen_width(&self, screen_width: f32) -> GridView {
        self.rerender(|state| state.screen_width = screen_width)
    }

    pub fn clear(&self) -> GridView {
        self.rerender(|state| state.entries.clear())
    }

    pub fn view(&self) -> GridView {
        self.lock().view.clone()
    }

    fn rerender(&self, apply: impl FnOnce(&mut PresenterState)) -> GridView {
        let view = {
            let mut state = self.lock();
            apply(&mut *state);
            state.view = render_grid(&state.entries, state.screen_width, self.aspect);
            state.view.clone()
        };
        tracing::debug!("grid rendered: {} tiles", view.tiles.len());
        self.emitter.emit(ScreenEvent::GridChanged(view.clone()));
        view
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PresenterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

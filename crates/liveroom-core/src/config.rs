use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::grid::TileAspect;
use crate::transport::PixelDensity;

/// How the screen picks and submits the username on mount.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    /// Generate a random name and connect immediately.
    #[default]
    AutoStart,
    /// Pre-fill a random name and wait for the user to validate it.
    Prefilled,
    /// Start with an empty field.
    ManualEntry,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScreenConfig {
    /// Root of the token service; `/register` is appended.
    pub registration_url: String,
    /// Room server websocket endpoint.
    pub server_url: String,
    pub clip_id: String,
    pub clip_height: u32,
    pub registration_timeout_ms: u64,
    pub startup_mode: StartupMode,
    pub tile_aspect: TileAspect,
    /// Initial device width in points, until the host reports the real one.
    pub screen_width: f32,
    pub pixel_density: PixelDensity,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            registration_url: "https://livekit-youtube-repro-server.onrender.com".to_string(),
            server_url: "wss://livekeet-youtube-repro-8qar0fgr.livekit.cloud".to_string(),
            clip_id: "oaRZAI8XDyA".to_string(),
            clip_height: 300,
            registration_timeout_ms: 10_000,
            startup_mode: StartupMode::AutoStart,
            tile_aspect: TileAspect::Square,
            screen_width: 390.0,
            pixel_density: PixelDensity::Screen,
        }
    }
}

impl ScreenConfig {
    /// Read a JSON config file. A missing file yields the defaults; unknown
    /// keys are ignored and absent keys take their default value.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`ScreenConfig::load`], but falls back to the defaults on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring config {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_millis(self.registration_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.registration_url)?;
        url::Url::parse(&self.server_url)?;
        Ok(())
    }
}

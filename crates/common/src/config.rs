use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading the startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Immutable startup configuration.
///
/// Loaded once at startup and injected by reference into transport and
/// orchestrator construction. Runtime changes arrive only as a
/// `ConfigChanged` notification routed through the orchestrator's queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Window dimensions, read by the rendering collaborator only.
    pub window_width: u32,
    pub window_height: u32,
    /// UDP port the server binds and discovery broadcasts target.
    pub server_port: u16,
    /// Name reported in discovery responses.
    pub server_name: String,
    /// Enables debug overlays in the rendering collaborator.
    pub debug: bool,
    pub sim: SimTuning,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            server_port: 42_800,
            server_name: "gravwell".into(),
            debug: false,
            sim: SimTuning::default(),
        }
    }
}

impl GameConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Load configuration, falling back to defaults if the file is missing.
    /// A malformed file is still an error; silently ignoring it hides typos.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Simulation and protocol tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimTuning {
    /// The frame rate the integrator's step scaling is calibrated against.
    pub reference_fps: f32,
    /// Global speed cap applied after braking.
    pub max_speed: f32,
    /// Velocity retention per step, applied after the speed clamp.
    pub inertia_ratio: f32,
    /// Fraction of speed shed along the collision normal on impact.
    pub bounce_factor: f32,
    /// Acceleration applied per unit of input direction.
    pub thrust: f32,
    /// Launch speed applied when jumping off a surface.
    pub jump_speed: f32,
    /// Braking force while the brake toggle is on.
    pub player_braking: f32,
    /// Maximum concurrent players the server admits.
    pub max_players: u8,
    /// Client-side join handshake deadline.
    pub connect_timeout_ms: u64,
    /// Silence threshold after which a peer counts as disconnected.
    pub peer_timeout_ms: u64,
    /// Retransmit interval for unacknowledged snapshots.
    pub snapshot_retry_ms: u64,
    /// Pause applied when admitting a peer so everyone resumes together.
    pub sync_pause_ms: u64,
}

impl Default for SimTuning {
    fn default() -> Self {
        Self {
            reference_fps: 60.0,
            max_speed: 12.0,
            inertia_ratio: 0.995,
            bounce_factor: 0.35,
            thrust: 0.08,
            jump_speed: 6.0,
            player_braking: 0.12,
            max_players: 8,
            connect_timeout_ms: 5_000,
            peer_timeout_ms: 6_000,
            snapshot_retry_ms: 250,
            sync_pause_ms: 1_500,
        }
    }
}

//! Shared types and utilities for the gravwell simulation core.
//!
//! # Invariants
//! - `EntityId` handles are local to one world instance and never travel
//!   over the network; `NetId` is the stable cross-session identifier.
//! - `GameConfig` is loaded once at startup and immutable afterwards.

pub mod config;
pub mod types;

pub use config::{ConfigError, GameConfig, SimTuning};
pub use types::{Aabb, EntityId, NetId, PeerId, PlayerNumber, Shape, Transform, now_millis};

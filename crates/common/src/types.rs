use glam::Vec2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local handle for an entity in the simulation arena.
///
/// Handles are allocated monotonically per world and are NOT stable across
/// snapshot reconstruction; anything that crosses the network uses [`NetId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Stable network identifier for a serializable entity.
///
/// Unique for the session; assigned once at entity creation and preserved
/// through every snapshot handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetId(pub Uuid);

impl NetId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Player number, unique per session, assigned by the server starting at 1.
pub type PlayerNumber = u8;

/// Identifier the transport assigns to a connected remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

/// Spatial transform: position, rotation, scale, optional parent.
///
/// A parented transform is positioned relative to its parent and is exempt
/// from level wrap-around.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub parent: Option<EntityId>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            parent: None,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Collision shape. Rectangles are axis-aligned and described by half extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { half_extents: Vec2 },
}

impl Shape {
    /// Static bounding box of the shape centered at `center`.
    pub fn bounds(&self, center: Vec2) -> Aabb {
        let half = match *self {
            Shape::Circle { radius } => Vec2::splat(radius),
            Shape::Rect { half_extents } => half_extents,
        };
        Aabb {
            min: center - half,
            max: center + half,
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Expand the box along a displacement so it covers the full travel of a
    /// body moving by `delta` this step.
    pub fn expanded_along(&self, delta: Vec2) -> Aabb {
        Aabb {
            min: self.min + delta.min(Vec2::ZERO),
            max: self.max + delta.max(Vec2::ZERO),
        }
    }
}

/// Current wall-clock time as milliseconds since the unix epoch.
///
/// Used for the negotiated resume timestamp; never for simulation stepping.
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

use glam::Vec2;
use gravwell_common::{Aabb, EntityId, NetId, PeerId, PlayerNumber, Shape};
use serde::{Deserialize, Serialize};

/// Collider-type bits. An entity's `collider_type` says what it is; its
/// `collides_with` mask says what it reacts to. The relation is directional.
pub mod collider {
    pub const STATIC: u8 = 1 << 0;
    pub const WALKABLE: u8 = 1 << 1;
    pub const PLAYER: u8 = 1 << 2;
    pub const PROJECTILE: u8 = 1 << 3;
}

/// Kinematic state for anything the integrator moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movable {
    pub velocity: Vec2,
    pub acceleration: Vec2,
    /// Scales the accumulated gravity pull; 0 disables gravity entirely.
    pub gravity_multiplier: f32,
    /// Sum of per-source pulls, written by the gravity accumulator and
    /// consumed (then cleared) by the integrator.
    pub gravity_pull: Vec2,
    /// Sum of this step's penetration vectors, written by collision
    /// resolution and consumed (then cleared) by the integrator.
    pub collision_vector: Vec2,
    pub braking_force: f32,
    /// Wrap position into level bounds (ignored while parented).
    pub wraps: bool,
    /// Hint for the camera collaborator to keep this body in frame.
    pub expands_camera: bool,
    /// Position before the last integration, kept for collaborators that
    /// interpolate. Local-only; rebuilt after a snapshot restore.
    #[serde(skip)]
    pub prev_position: Vec2,
}

impl Default for Movable {
    fn default() -> Self {
        Self {
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            gravity_multiplier: 1.0,
            gravity_pull: Vec2::ZERO,
            collision_vector: Vec2::ZERO,
            braking_force: 0.0,
            wraps: true,
            expands_camera: false,
            prev_position: Vec2::ZERO,
        }
    }
}

/// One narrow-phase result: the peer we hit and our penetration into it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub other: EntityId,
    pub penetration: Vec2,
}

/// Collision participation: shape, type masks and this step's contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionBody {
    pub shape: Shape,
    pub collider_type: u8,
    pub collides_with: u8,
    /// Rebuilt by the collision system every step.
    pub collisions: Vec<Contact>,
    /// Broad-phase cache; recomputed every step, never serialized.
    #[serde(skip)]
    pub swept_bounds: Option<Aabb>,
}

impl CollisionBody {
    pub fn new(shape: Shape, collider_type: u8, collides_with: u8) -> Self {
        Self {
            shape,
            collider_type,
            collides_with,
            collisions: Vec::new(),
            swept_bounds: None,
        }
    }
}

/// Gravity source. The pull position derives from the entity's transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GravityPoint {
    pub mass: f32,
}

/// What a player is currently standing on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Standing {
    #[default]
    Nothing,
    Surface,
}

/// Per-player session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub player_number: PlayerNumber,
    /// Transport peer controlling this player; None for server-local players.
    pub peer: Option<PeerId>,
    pub standing_on: Standing,
    pub standing_on_entity: Option<EntityId>,
    /// Index into the local input devices; None for remote players.
    /// Local-only, never serialized.
    #[serde(skip)]
    pub local_index: Option<usize>,
    pub braking: bool,
}

impl PlayerState {
    pub fn new(player_number: PlayerNumber) -> Self {
        Self {
            player_number,
            peer: None,
            standing_on: Standing::Nothing,
            standing_on_entity: None,
            local_index: None,
            braking: false,
        }
    }

    /// Derived: a player is local when a local input device drives it.
    pub fn is_local(&self) -> bool {
        self.local_index.is_some()
    }

    pub fn stand_on(&mut self, surface: EntityId) {
        self.standing_on = Standing::Surface;
        self.standing_on_entity = Some(surface);
    }

    pub fn leave_surface(&mut self) {
        self.standing_on = Standing::Nothing;
        self.standing_on_entity = None;
    }
}

/// Stable network identity. Exactly one per networked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serializable {
    pub id: NetId,
}

impl Serializable {
    pub fn fresh() -> Self {
        Self { id: NetId::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Apply damage; true when this reduced health to zero or below.
    pub fn damage(&mut self, amount: f32) -> bool {
        self.current -= amount;
        self.current <= 0.0
    }

    pub fn reset(&mut self) {
        self.current = self.max;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Damaging {
    pub amount: f32,
}

/// Remaining lifetime in seconds; expiry queues destruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lifetime {
    pub remaining: f32,
}

/// Projectile emitter settings and cooldown state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emitter {
    pub cooldown: f32,
    pub interval: f32,
    pub projectile_speed: f32,
    pub projectile_radius: f32,
    pub projectile_damage: f32,
    pub projectile_lifetime: f32,
}

impl Default for Emitter {
    fn default() -> Self {
        Self {
            cooldown: 0.0,
            interval: 0.25,
            projectile_speed: 10.0,
            projectile_radius: 0.15,
            projectile_damage: 25.0,
            projectile_lifetime: 3.0,
        }
    }
}

/// World extents used for wrap-around and spawn placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl LevelBounds {
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }
}

//! Level construction and deterministic spawn placement.
//!
//! Only this module and the snapshot restore create entities; everything
//! here is called from the orchestrator or the step pipeline.

use crate::control::ProjectileSpawn;
use crate::world::World;
use glam::Vec2;
use gravwell_common::{EntityId, PlayerNumber, Shape, Transform};
use gravwell_ecs::{
    CollisionBody, Damaging, Emitter, GravityPoint, Health, LevelBounds, Lifetime, Movable,
    PlayerState, Serializable, collider,
};
use gravwell_input::FrameBuffer;

pub const LEVEL_MIN: Vec2 = Vec2::new(-40.0, -25.0);
pub const LEVEL_MAX: Vec2 = Vec2::new(40.0, 25.0);
pub const PLAYER_RADIUS: f32 = 0.75;
pub const PLAYER_MAX_HEALTH: f32 = 100.0;
/// Spawn slots are spread over a fixed ring so the point for a player
/// number never depends on who else is connected.
const SPAWN_SLOTS: u32 = 8;
const SPAWN_RING_RADIUS: f32 = 18.0;

struct PlanetSpec {
    position: Vec2,
    radius: f32,
    mass: f32,
}

const PLANETS: [PlanetSpec; 2] = [
    PlanetSpec {
        position: Vec2::new(-14.0, 0.0),
        radius: 6.0,
        mass: 950.0,
    },
    PlanetSpec {
        position: Vec2::new(16.0, 7.0),
        radius: 4.0,
        mass: 420.0,
    },
];

/// Build the default level: bounds, planets and a central derelict block.
pub fn build_level(world: &mut World) {
    let level = world.spawn();
    world
        .store_mut()
        .set_level_bounds(level, LevelBounds { min: LEVEL_MIN, max: LEVEL_MAX });
    world
        .store_mut()
        .set_serializable(level, Serializable::fresh());

    for planet in &PLANETS {
        let id = world.spawn();
        world
            .store_mut()
            .set_transform(id, Transform::from_position(planet.position));
        world.store_mut().set_collision_body(
            id,
            CollisionBody::new(
                Shape::Circle { radius: planet.radius },
                collider::WALKABLE | collider::STATIC,
                0,
            ),
        );
        world
            .store_mut()
            .set_gravity_point(id, GravityPoint { mass: planet.mass });
        world
            .store_mut()
            .set_serializable(id, Serializable::fresh());
    }

    // A plain static obstacle: collidable, walk-proof, no gravity.
    let block = world.spawn();
    world
        .store_mut()
        .set_transform(block, Transform::from_position(Vec2::new(2.0, -12.0)));
    world.store_mut().set_collision_body(
        block,
        CollisionBody::new(
            Shape::Rect {
                half_extents: Vec2::new(3.0, 1.5),
            },
            collider::STATIC,
            0,
        ),
    );
    world
        .store_mut()
        .set_serializable(block, Serializable::fresh());

    tracing::info!(entities = world.entity_count(), "level built");
}

/// Deterministic spawn point for a player number: a fixed slot on a ring
/// around the level center.
pub fn spawn_point(bounds: &LevelBounds, number: PlayerNumber) -> Vec2 {
    let slot = u32::from(number) % SPAWN_SLOTS;
    let angle = slot as f32 * std::f32::consts::TAU / SPAWN_SLOTS as f32;
    bounds.center() + Vec2::from_angle(angle) * SPAWN_RING_RADIUS
}

/// Spawn a player entity with the given number at its spawn point.
pub fn spawn_player(world: &mut World, number: PlayerNumber) -> EntityId {
    let bounds = world.level_bounds().unwrap_or(LevelBounds {
        min: LEVEL_MIN,
        max: LEVEL_MAX,
    });
    let position = spawn_point(&bounds, number);

    let id = world.spawn();
    world
        .store_mut()
        .set_transform(id, Transform::from_position(position));
    world.store_mut().set_movable(
        id,
        Movable {
            expands_camera: true,
            prev_position: position,
            ..Movable::default()
        },
    );
    world.store_mut().set_collision_body(
        id,
        CollisionBody::new(
            Shape::Circle { radius: PLAYER_RADIUS },
            collider::PLAYER,
            collider::STATIC | collider::WALKABLE,
        ),
    );
    world
        .store_mut()
        .set_player_state(id, PlayerState::new(number));
    world.store_mut().set_player_input(id, FrameBuffer::new());
    world
        .store_mut()
        .set_health(id, Health::full(PLAYER_MAX_HEALTH));
    world.store_mut().set_emitter(id, Emitter::default());
    world
        .store_mut()
        .set_serializable(id, Serializable::fresh());

    tracing::debug!(player = number, ?position, "player spawned");
    id
}

/// Spawn a projectile requested by the control system.
pub fn spawn_projectile(world: &mut World, request: &ProjectileSpawn) -> EntityId {
    let id = world.spawn();
    world
        .store_mut()
        .set_transform(id, Transform::from_position(request.position));
    world.store_mut().set_movable(
        id,
        Movable {
            velocity: request.velocity,
            prev_position: request.position,
            ..Movable::default()
        },
    );
    world.store_mut().set_collision_body(
        id,
        CollisionBody::new(
            Shape::Circle {
                radius: request.radius,
            },
            collider::PROJECTILE,
            collider::STATIC | collider::WALKABLE | collider::PLAYER,
        ),
    );
    world
        .store_mut()
        .set_damaging(id, Damaging { amount: request.damage });
    world.store_mut().set_lifetime(
        id,
        Lifetime {
            remaining: request.lifetime,
        },
    );
    world
        .store_mut()
        .set_serializable(id, Serializable::fresh());
    id
}

/// Reset a dead player in place: full health, no motion, spawn-point
/// position keyed by its player number.
pub fn respawn_player(world: &mut World, id: EntityId) {
    let Some(number) = world
        .store()
        .get_player_state(id)
        .map(|p| p.player_number)
    else {
        return;
    };
    let bounds = world.level_bounds().unwrap_or(LevelBounds {
        min: LEVEL_MIN,
        max: LEVEL_MAX,
    });
    let position = spawn_point(&bounds, number);

    if let Some(health) = world.store_mut().get_health_mut(id) {
        health.reset();
    }
    if let Some(m) = world.store_mut().get_movable_mut(id) {
        m.velocity = Vec2::ZERO;
        m.acceleration = Vec2::ZERO;
        m.gravity_pull = Vec2::ZERO;
        m.collision_vector = Vec2::ZERO;
        m.prev_position = position;
    }
    if let Some(state) = world.store_mut().get_player_state_mut(id) {
        state.leave_surface();
    }
    if let Some(t) = world.store_mut().get_transform_mut(id) {
        t.position = position;
        t.parent = None;
    }
    tracing::debug!(player = number, "player respawned");
}

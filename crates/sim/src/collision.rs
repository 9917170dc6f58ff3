//! Collision system: broad phase over swept bounds, narrow-phase
//! penetration, and resolution by collider-type pair.
//!
//! The broad phase is a pairwise O(n²) scan. Entity counts here are tens,
//! not thousands; a spatial index can replace the scan without touching the
//! narrow phase or resolution. The pair relation is directional: A's
//! collides-with mask is tested against B's collider type, once per ordered
//! pair per step.

use crate::world::World;
use crate::{geometry, level, sweep};
use glam::Vec2;
use gravwell_common::{EntityId, PlayerNumber, Shape, SimTuning};
use gravwell_ecs::{Contact, Standing, collider};

/// Entities the resolution pass condemned, and players it respawned.
#[derive(Debug, Clone, Default)]
pub struct CollisionOutcome {
    pub destroyed: Vec<EntityId>,
    pub respawned: Vec<PlayerNumber>,
}

pub fn run(world: &mut World, tuning: &SimTuning, dt: f32) -> CollisionOutcome {
    detect(world, tuning, dt);
    resolve(world)
}

struct BodyView {
    id: EntityId,
    shape: Shape,
    collider_type: u8,
    collides_with: u8,
    position: Vec2,
    /// Displacement covered last integration (old-position cache).
    displacement: Vec2,
    moving: bool,
}

/// Rebuild every body's swept bounds and contact list.
pub fn detect(world: &mut World, tuning: &SimTuning, dt: f32) {
    let step_scale = dt * tuning.reference_fps;

    let mut bodies = Vec::new();
    let ids: Vec<EntityId> = world.store().collision_bodies().keys().copied().collect();
    for id in ids {
        let Some(position) = world.store().world_position(id) else {
            continue;
        };
        let movable = world.store().get_movable(id).copied();
        let velocity = movable.map_or(Vec2::ZERO, |m| m.velocity);
        let displacement = movable.map_or(Vec2::ZERO, |m| position - m.prev_position);

        let Some(body) = world.store_mut().get_collision_body_mut(id) else {
            continue;
        };
        body.collisions.clear();
        // Bounds cover the whole travel of the last integration: static
        // bounds at the old position, expanded along the step's motion.
        let expansion = if displacement != Vec2::ZERO {
            displacement
        } else {
            velocity * step_scale
        };
        let swept = body
            .shape
            .bounds(position - displacement)
            .expanded_along(expansion);
        body.swept_bounds = Some(swept);

        bodies.push(BodyView {
            id,
            shape: body.shape,
            collider_type: body.collider_type,
            collides_with: body.collides_with,
            position,
            displacement,
            moving: movable.is_some(),
        });
    }

    for a in &bodies {
        for b in &bodies {
            if a.id == b.id || a.collides_with & b.collider_type == 0 {
                continue;
            }
            if stands_on(world, a.id, b.id) || stands_on(world, b.id, a.id) {
                continue;
            }
            let (Some(sa), Some(sb)) = (swept_of(world, a.id), swept_of(world, b.id)) else {
                continue;
            };
            if !sa.overlaps(&sb) {
                continue;
            }

            let penetration = narrow(a, b);
            if penetration == Vec2::ZERO {
                continue;
            }
            if let Some(body) = world.store_mut().get_collision_body_mut(a.id) {
                body.collisions.push(Contact {
                    other: b.id,
                    penetration,
                });
            }
        }
    }
}

fn swept_of(world: &World, id: EntityId) -> Option<gravwell_common::Aabb> {
    world.store().get_collision_body(id)?.swept_bounds
}

/// A player never collides against the surface it currently stands on.
fn stands_on(world: &World, player: EntityId, surface: EntityId) -> bool {
    world
        .store()
        .get_player_state(player)
        .is_some_and(|p| p.standing_on == Standing::Surface && p.standing_on_entity == Some(surface))
}

fn narrow(a: &BodyView, b: &BodyView) -> Vec2 {
    match (a.shape, b.shape) {
        // Moving circles get the continuous solver so a body that crossed
        // its peer inside one step is still caught.
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) if a.moving || b.moving => {
            sweep::swept_circle_penetration(
                a.position,
                a.displacement,
                ra,
                b.position,
                b.displacement,
                rb,
            )
        }
        _ => geometry::penetration_vector(a.shape, a.position, b.shape, b.position),
    }
}

/// Apply the resolution policy for every recorded contact.
fn resolve(world: &mut World) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();

    let mut work: Vec<(EntityId, EntityId, Vec2)> = Vec::new();
    for (id, body) in world.store().collision_bodies() {
        for contact in &body.collisions {
            work.push((*id, contact.other, contact.penetration));
        }
    }

    for (a, b, penetration) in work {
        let type_a = collider_type(world, a);
        let type_b = collider_type(world, b);

        if type_a & collider::PROJECTILE != 0 {
            // Back the projectile out to the contact surface, then condemn it.
            if let Some(t) = world.store_mut().get_transform_mut(a) {
                t.position -= penetration;
            }
            if !outcome.destroyed.contains(&a) {
                outcome.destroyed.push(a);
            }
        } else if type_a & collider::PLAYER != 0 && type_b & collider::WALKABLE != 0 {
            land_player(world, a, b, penetration);
        } else if type_a & collider::PLAYER != 0 && type_b & collider::STATIC != 0 {
            // Impulse only; the integrator turns it into motion.
            if let Some(m) = world.store_mut().get_movable_mut(a) {
                m.collision_vector += penetration;
            }
        }

        apply_damage(world, a, b, &mut outcome);
    }

    outcome.respawned.dedup();
    outcome
}

fn collider_type(world: &World, id: EntityId) -> u8 {
    world
        .store()
        .get_collision_body(id)
        .map_or(0, |b| b.collider_type)
}

fn land_player(world: &mut World, player: EntityId, surface: EntityId, penetration: Vec2) {
    let already = world
        .store()
        .get_player_state(player)
        .is_some_and(|p| p.standing_on_entity == Some(surface));
    if already {
        return;
    }
    if let Some(state) = world.store_mut().get_player_state_mut(player) {
        state.stand_on(surface);
    }
    if let Some(m) = world.store_mut().get_movable_mut(player) {
        m.velocity = Vec2::ZERO;
        m.acceleration = Vec2::ZERO;
    }
    if let Some(t) = world.store_mut().get_transform_mut(player) {
        t.position -= penetration;
    }
}

/// Damaging meets Health in either direction; lethal damage respawns
/// players and condemns everything else.
fn apply_damage(world: &mut World, a: EntityId, b: EntityId, outcome: &mut CollisionOutcome) {
    let pairs = [(a, b), (b, a)];
    for (source, target) in pairs {
        let Some(amount) = world.store().get_damaging(source).map(|d| d.amount) else {
            continue;
        };
        let Some(health) = world.store_mut().get_health_mut(target) else {
            continue;
        };
        if !health.damage(amount) {
            continue;
        }
        let player = world
            .store()
            .get_player_state(target)
            .map(|p| p.player_number);
        match player {
            Some(number) => {
                level::respawn_player(world, target);
                outcome.respawned.push(number);
            }
            None => {
                if !outcome.destroyed.contains(&target) {
                    outcome.destroyed.push(target);
                }
            }
        }
    }
}

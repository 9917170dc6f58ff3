//! Gravity accumulation.
//!
//! Every movable entity receives a pull from every gravity point,
//! inverse-square weighted. The result is stored on the movable for the
//! integrator to consume next; this system never touches velocity itself.

use crate::world::World;
use glam::Vec2;
use gravwell_common::EntityId;

pub fn accumulate(world: &mut World) {
    // Collect sources first: position is derived from the transform.
    let sources: Vec<(Vec2, f32)> = world
        .store()
        .gravity_points()
        .iter()
        .filter_map(|(id, point)| Some((world.store().world_position(*id)?, point.mass)))
        .collect();

    let ids: Vec<EntityId> = world.store().movables().keys().copied().collect();
    for id in ids {
        let Some(pos) = world.store().world_position(id) else {
            continue;
        };
        let pull = sources
            .iter()
            .map(|&(src, mass)| pull_from(pos, src, mass))
            .sum::<Vec2>();
        if let Some(movable) = world.store_mut().get_movable_mut(id) {
            movable.gravity_pull = pull * movable.gravity_multiplier;
        }
    }
}

/// Pull on a body at `pos` from a source at `src` with the given mass.
/// A coincident source contributes zero rather than a singularity.
fn pull_from(pos: Vec2, src: Vec2, mass: f32) -> Vec2 {
    let offset = src - pos;
    let dist_sq = offset.length_squared();
    if dist_sq == 0.0 {
        return Vec2::ZERO;
    }
    offset.normalize() * (mass / dist_sq)
}

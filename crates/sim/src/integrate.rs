//! Velocity/position integration, braking and wrap-around.

use crate::world::World;
use glam::Vec2;
use gravwell_common::{EntityId, SimTuning};

/// Integrate every movable entity one step.
///
/// Consumes (and clears) the accumulated gravity pull and collision vector,
/// refreshes the old-position cache, and wraps positions into the level
/// bounds on each axis independently. Parented transforms move in their
/// parent's space and never wrap.
pub fn step(world: &mut World, tuning: &SimTuning, dt: f32) {
    let step_scale = dt * tuning.reference_fps;
    let bounds = world.level_bounds();

    let ids: Vec<EntityId> = world.store().movables().keys().copied().collect();
    for id in ids {
        let Some(position) = world.store().get_transform(id).map(|t| t.position) else {
            continue;
        };
        let parented = world
            .store()
            .get_transform(id)
            .is_some_and(|t| t.parent.is_some());

        let Some(m) = world.store_mut().get_movable_mut(id) else {
            continue;
        };
        let speed_before = m.velocity.length();
        let mut velocity = m.velocity + m.acceleration + m.gravity_pull
            - m.collision_vector
            - m.collision_vector.normalize_or_zero() * speed_before * tuning.bounce_factor;

        // Braking shortens the velocity without ever reversing it.
        let speed = velocity.length();
        if speed > 0.0 {
            let reduced = speed - speed.min(m.braking_force);
            velocity *= reduced / speed;
        }

        velocity = velocity.clamp_length_max(tuning.max_speed) * tuning.inertia_ratio;

        let collision_vector = m.collision_vector;
        let wraps = m.wraps;
        m.velocity = velocity;
        m.gravity_pull = Vec2::ZERO;
        m.collision_vector = Vec2::ZERO;
        m.prev_position = position;

        let mut next = position + (velocity - collision_vector) * step_scale;
        if wraps && !parented
            && let Some(b) = bounds
        {
            next.x = wrap(next.x, b.min.x, b.max.x);
            next.y = wrap(next.y, b.min.y, b.max.y);
        }
        if let Some(t) = world.store_mut().get_transform_mut(id) {
            t.position = next;
        }
    }
}

fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let span = max - min;
    if span <= 0.0 {
        return value;
    }
    min + (value - min).rem_euclid(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravwell_common::Transform;
    use gravwell_ecs::{LevelBounds, Movable};

    const DT: f32 = 1.0 / 60.0;

    fn tuning() -> SimTuning {
        SimTuning {
            inertia_ratio: 1.0,
            ..SimTuning::default()
        }
    }

    fn add_movable(world: &mut World, pos: Vec2, movable: Movable) -> EntityId {
        let id = world.spawn();
        world
            .store_mut()
            .set_transform(id, Transform::from_position(pos));
        world.store_mut().set_movable(
            id,
            Movable {
                prev_position: pos,
                ..movable
            },
        );
        id
    }

    #[test]
    fn velocity_moves_position_at_reference_rate() {
        let mut world = World::new();
        let id = add_movable(
            &mut world,
            Vec2::ZERO,
            Movable {
                velocity: Vec2::new(3.0, 0.0),
                ..Movable::default()
            },
        );
        step(&mut world, &tuning(), DT);
        // dt * reference_fps == 1, so one step moves by one velocity unit.
        let pos = world.store().get_transform(id).unwrap().position;
        assert!((pos.x - 3.0).abs() < 1e-5);
        assert_eq!(
            world.store().get_movable(id).unwrap().prev_position,
            Vec2::ZERO
        );
    }

    #[test]
    fn acceleration_and_gravity_feed_velocity() {
        let mut world = World::new();
        let id = add_movable(
            &mut world,
            Vec2::ZERO,
            Movable {
                acceleration: Vec2::new(1.0, 0.0),
                gravity_pull: Vec2::new(0.0, 2.0),
                ..Movable::default()
            },
        );
        step(&mut world, &tuning(), DT);
        let m = world.store().get_movable(id).unwrap();
        assert_eq!(m.velocity, Vec2::new(1.0, 2.0));
        // Pull is consumed.
        assert_eq!(m.gravity_pull, Vec2::ZERO);
    }

    #[test]
    fn collision_vector_is_consumed_and_pushes_out() {
        let mut world = World::new();
        let id = add_movable(
            &mut world,
            Vec2::ZERO,
            Movable {
                velocity: Vec2::new(2.0, 0.0),
                collision_vector: Vec2::new(0.5, 0.0),
                ..Movable::default()
            },
        );
        step(&mut world, &tuning(), DT);
        let m = world.store().get_movable(id).unwrap();
        // 2.0 - 0.5 - (1.0 * 2.0 * bounce)
        let expected = 2.0 - 0.5 - 2.0 * tuning().bounce_factor;
        assert!((m.velocity.x - expected).abs() < 1e-5);
        assert_eq!(m.collision_vector, Vec2::ZERO);
        // Position moved by velocity minus the collision vector.
        let pos = world.store().get_transform(id).unwrap().position;
        assert!((pos.x - (expected - 0.5)).abs() < 1e-5);
    }

    #[test]
    fn braking_never_reverses() {
        let mut world = World::new();
        let slow = add_movable(
            &mut world,
            Vec2::ZERO,
            Movable {
                velocity: Vec2::new(0.05, 0.0),
                braking_force: 0.12,
                ..Movable::default()
            },
        );
        step(&mut world, &tuning(), DT);
        let v = world.store().get_movable(slow).unwrap().velocity;
        assert_eq!(v, Vec2::ZERO);
    }

    #[test]
    fn speed_is_clamped() {
        let mut world = World::new();
        let t = tuning();
        let id = add_movable(
            &mut world,
            Vec2::ZERO,
            Movable {
                velocity: Vec2::new(1000.0, 0.0),
                ..Movable::default()
            },
        );
        step(&mut world, &t, DT);
        let v = world.store().get_movable(id).unwrap().velocity;
        assert!((v.length() - t.max_speed).abs() < 1e-4);
    }

    #[test]
    fn wraps_each_axis_independently() {
        let mut world = World::new();
        let level = world.spawn();
        world.store_mut().set_level_bounds(
            level,
            LevelBounds {
                min: Vec2::new(-10.0, -10.0),
                max: Vec2::new(10.0, 10.0),
            },
        );
        let id = add_movable(
            &mut world,
            Vec2::new(9.5, 0.0),
            Movable {
                velocity: Vec2::new(1.0, 0.0),
                ..Movable::default()
            },
        );
        step(&mut world, &tuning(), DT);
        let pos = world.store().get_transform(id).unwrap().position;
        assert!((pos.x - (-9.5)).abs() < 1e-4);
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn parented_transform_does_not_wrap() {
        let mut world = World::new();
        let level = world.spawn();
        world.store_mut().set_level_bounds(
            level,
            LevelBounds {
                min: Vec2::new(-10.0, -10.0),
                max: Vec2::new(10.0, 10.0),
            },
        );
        let anchor = world.spawn();
        world
            .store_mut()
            .set_transform(anchor, Transform::default());
        let id = add_movable(
            &mut world,
            Vec2::new(9.5, 0.0),
            Movable {
                velocity: Vec2::new(1.0, 0.0),
                ..Movable::default()
            },
        );
        world.store_mut().get_transform_mut(id).unwrap().parent = Some(anchor);

        step(&mut world, &tuning(), DT);
        let pos = world.store().get_transform(id).unwrap().position;
        assert!(pos.x > 10.0);
    }
}

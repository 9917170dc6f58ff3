//! Player control: turns the current frame's buffered input into
//! acceleration, jumps, braking and fire requests.

use crate::world::World;
use glam::Vec2;
use gravwell_common::{EntityId, Shape, SimTuning};
use gravwell_ecs::Standing;
use gravwell_input::{InputSample, Key};

/// A projectile the control pass wants created. The step pipeline performs
/// the actual spawn; systems never create entities themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpawn {
    pub owner: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub damage: f32,
    pub lifetime: f32,
}

pub fn apply(world: &mut World, tuning: &SimTuning, dt: f32) -> Vec<ProjectileSpawn> {
    let mut spawns = Vec::new();

    let ids: Vec<EntityId> = world.store().player_states().keys().copied().collect();
    for id in ids {
        let sample = world
            .store()
            .get_player_input(id)
            .map(|buffer| buffer.sample())
            .unwrap_or(InputSample::NEUTRAL);

        apply_braking(world, id, &sample, tuning);
        apply_movement(world, id, &sample, tuning);
        apply_aim(world, id, &sample);
        if let Some(spawn) = apply_fire(world, id, &sample, dt) {
            spawns.push(spawn);
        }
    }

    spawns
}

fn apply_braking(world: &mut World, id: EntityId, sample: &InputSample, tuning: &SimTuning) {
    let braking = {
        let Some(state) = world.store_mut().get_player_state_mut(id) else {
            return;
        };
        if sample.key(Key::Brake).just_pressed() {
            state.braking = !state.braking;
        }
        state.braking
    };
    if let Some(m) = world.store_mut().get_movable_mut(id) {
        m.braking_force = if braking { tuning.player_braking } else { 0.0 };
    }
}

fn apply_movement(world: &mut World, id: EntityId, sample: &InputSample, tuning: &SimTuning) {
    let standing = world
        .store()
        .get_player_state(id)
        .map(|p| (p.standing_on, p.standing_on_entity));
    let Some((standing_on, surface)) = standing else {
        return;
    };

    if standing_on == Standing::Nothing {
        if let Some(m) = world.store_mut().get_movable_mut(id) {
            m.acceleration = sample.accelerate * tuning.thrust;
        }
        return;
    }

    // Standing: thrust is inert until the player jumps off.
    if let Some(m) = world.store_mut().get_movable_mut(id) {
        m.acceleration = Vec2::ZERO;
    }
    if !sample.key(Key::Up).just_pressed() {
        return;
    }

    let away = surface
        .and_then(|s| {
            let player = world.store().world_position(id)?;
            let anchor = world.store().world_position(s)?;
            Some((player - anchor).normalize_or_zero())
        })
        .filter(|v| *v != Vec2::ZERO)
        .unwrap_or(Vec2::Y);

    if let Some(m) = world.store_mut().get_movable_mut(id) {
        m.velocity = away * tuning.jump_speed;
    }
    if let Some(state) = world.store_mut().get_player_state_mut(id) {
        state.leave_surface();
    }
}

fn apply_aim(world: &mut World, id: EntityId, sample: &InputSample) {
    if sample.aim == Vec2::ZERO {
        return;
    }
    if let Some(t) = world.store_mut().get_transform_mut(id) {
        t.rotation = sample.aim.to_angle();
    }
}

fn apply_fire(
    world: &mut World,
    id: EntityId,
    sample: &InputSample,
    dt: f32,
) -> Option<ProjectileSpawn> {
    let ready = {
        let emitter = world.store_mut().get_emitter_mut(id)?;
        emitter.cooldown = (emitter.cooldown - dt).max(0.0);
        emitter.cooldown == 0.0
    };

    if !ready || !sample.key(Key::Fire).pressed {
        return None;
    }
    let direction = sample.aim.normalize_or_zero();
    if direction == Vec2::ZERO {
        return None;
    }

    let position = world.store().world_position(id)?;
    let muzzle_offset = match world.store().get_collision_body(id).map(|b| b.shape) {
        Some(Shape::Circle { radius }) => radius,
        Some(Shape::Rect { half_extents }) => half_extents.max_element(),
        None => 0.0,
    };

    let emitter = *world.store().get_emitter(id)?;
    world.store_mut().get_emitter_mut(id)?.cooldown = emitter.interval;

    Some(ProjectileSpawn {
        owner: id,
        position: position + direction * (muzzle_offset + emitter.projectile_radius * 2.0),
        velocity: direction * emitter.projectile_speed,
        radius: emitter.projectile_radius,
        damage: emitter.projectile_damage,
        lifetime: emitter.projectile_lifetime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravwell_common::Transform;
    use gravwell_ecs::{CollisionBody, Emitter, Movable, PlayerState, collider};
    use gravwell_input::{FrameBuffer, KeyState};

    const DT: f32 = 1.0 / 60.0;

    fn sample_with(keys: &[(Key, KeyState)], accelerate: Vec2, aim: Vec2) -> InputSample {
        let mut s = InputSample::default();
        for (key, state) in keys {
            s.set_key(*key, *state);
        }
        s.accelerate = accelerate;
        s.aim = aim;
        s
    }

    fn pressed() -> KeyState {
        KeyState {
            pressed: true,
            changed: true,
        }
    }

    fn add_player(world: &mut World, pos: Vec2, sample: InputSample) -> EntityId {
        let id = world.spawn();
        world
            .store_mut()
            .set_transform(id, Transform::from_position(pos));
        world.store_mut().set_movable(
            id,
            Movable {
                prev_position: pos,
                ..Movable::default()
            },
        );
        world.store_mut().set_player_state(id, PlayerState::new(1));
        world.store_mut().set_collision_body(
            id,
            CollisionBody::new(
                Shape::Circle { radius: 0.75 },
                collider::PLAYER,
                collider::STATIC,
            ),
        );
        world.store_mut().set_emitter(id, Emitter::default());
        let mut buffer = FrameBuffer::new();
        buffer.insert(0, sample);
        world.store_mut().set_player_input(id, buffer);
        id
    }

    #[test]
    fn thrust_follows_acceleration_direction() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let id = add_player(&mut world, Vec2::ZERO, sample_with(&[], Vec2::X, Vec2::ZERO));
        apply(&mut world, &tuning, DT);
        let m = world.store().get_movable(id).unwrap();
        assert_eq!(m.acceleration, Vec2::X * tuning.thrust);
    }

    #[test]
    fn missing_buffer_means_neutral_not_panic() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let id = add_player(&mut world, Vec2::ZERO, InputSample::NEUTRAL);
        world.store_mut().remove_player_input(id);
        apply(&mut world, &tuning, DT);
        assert_eq!(
            world.store().get_movable(id).unwrap().acceleration,
            Vec2::ZERO
        );
    }

    #[test]
    fn jump_launches_away_from_surface() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let planet = world.spawn();
        world
            .store_mut()
            .set_transform(planet, Transform::default());
        let id = add_player(
            &mut world,
            Vec2::new(0.0, 5.75),
            sample_with(&[(Key::Up, pressed())], Vec2::ZERO, Vec2::ZERO),
        );
        world
            .store_mut()
            .get_player_state_mut(id)
            .unwrap()
            .stand_on(planet);

        apply(&mut world, &tuning, DT);

        let m = world.store().get_movable(id).unwrap();
        assert_eq!(m.velocity, Vec2::Y * tuning.jump_speed);
        let state = world.store().get_player_state(id).unwrap();
        assert_eq!(state.standing_on, Standing::Nothing);
        assert!(state.standing_on_entity.is_none());
    }

    #[test]
    fn thrust_is_inert_while_standing() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let planet = world.spawn();
        world
            .store_mut()
            .set_transform(planet, Transform::default());
        let id = add_player(
            &mut world,
            Vec2::new(0.0, 5.75),
            sample_with(&[], Vec2::X, Vec2::ZERO),
        );
        world
            .store_mut()
            .get_player_state_mut(id)
            .unwrap()
            .stand_on(planet);

        apply(&mut world, &tuning, DT);
        assert_eq!(
            world.store().get_movable(id).unwrap().acceleration,
            Vec2::ZERO
        );
    }

    #[test]
    fn brake_key_toggles() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let id = add_player(
            &mut world,
            Vec2::ZERO,
            sample_with(&[(Key::Brake, pressed())], Vec2::ZERO, Vec2::ZERO),
        );
        apply(&mut world, &tuning, DT);
        assert!(world.store().get_player_state(id).unwrap().braking);
        assert_eq!(
            world.store().get_movable(id).unwrap().braking_force,
            tuning.player_braking
        );

        // Same sample again: a held key is not a new press.
        let held = sample_with(
            &[(
                Key::Brake,
                KeyState {
                    pressed: true,
                    changed: false,
                },
            )],
            Vec2::ZERO,
            Vec2::ZERO,
        );
        world
            .store_mut()
            .get_player_input_mut(id)
            .unwrap()
            .insert(0, held);
        apply(&mut world, &tuning, DT);
        assert!(world.store().get_player_state(id).unwrap().braking);
    }

    #[test]
    fn fire_requests_projectile_and_respects_cooldown() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let id = add_player(
            &mut world,
            Vec2::ZERO,
            sample_with(&[(Key::Fire, pressed())], Vec2::ZERO, Vec2::X),
        );

        let spawns = apply(&mut world, &tuning, DT);
        assert_eq!(spawns.len(), 1);
        let spawn = spawns[0];
        assert_eq!(spawn.owner, id);
        assert!(spawn.position.x > 0.0);
        assert_eq!(
            spawn.velocity,
            Vec2::X * Emitter::default().projectile_speed
        );

        // Cooldown now blocks an immediate second shot.
        let again = apply(&mut world, &tuning, DT);
        assert!(again.is_empty());
    }

    #[test]
    fn fire_without_aim_does_nothing() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        add_player(
            &mut world,
            Vec2::ZERO,
            sample_with(&[(Key::Fire, pressed())], Vec2::ZERO, Vec2::ZERO),
        );
        assert!(apply(&mut world, &tuning, DT).is_empty());
    }

    #[test]
    fn aim_sets_rotation() {
        let mut world = World::new();
        let tuning = SimTuning::default();
        let id = add_player(
            &mut world,
            Vec2::ZERO,
            sample_with(&[], Vec2::ZERO, Vec2::new(0.0, 1.0)),
        );
        apply(&mut world, &tuning, DT);
        let rot = world.store().get_transform(id).unwrap().rotation;
        assert!((rot - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}

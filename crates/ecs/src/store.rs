use crate::components::{
    CollisionBody, Damaging, Emitter, GravityPoint, Health, LevelBounds, Lifetime, Movable,
    PlayerState, Serializable,
};
use gravwell_common::{EntityId, NetId, Transform};
use gravwell_input::FrameBuffer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deterministic component storage for all component types.
///
/// One BTreeMap per component type, keyed by entity handle, for canonical
/// iteration order. Accessors return `Option`; a system that finds a
/// component missing skips the entity rather than failing the step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentStore {
    transforms: BTreeMap<EntityId, Transform>,
    movables: BTreeMap<EntityId, Movable>,
    collision_bodies: BTreeMap<EntityId, CollisionBody>,
    gravity_points: BTreeMap<EntityId, GravityPoint>,
    player_states: BTreeMap<EntityId, PlayerState>,
    player_inputs: BTreeMap<EntityId, FrameBuffer>,
    serializables: BTreeMap<EntityId, Serializable>,
    healths: BTreeMap<EntityId, Health>,
    damagings: BTreeMap<EntityId, Damaging>,
    lifetimes: BTreeMap<EntityId, Lifetime>,
    emitters: BTreeMap<EntityId, Emitter>,
    level_bounds: BTreeMap<EntityId, LevelBounds>,
}

macro_rules! accessors {
    ($field:ident, $ty:ty, $set:ident, $get:ident, $get_mut:ident, $remove:ident) => {
        pub fn $set(&mut self, entity: EntityId, value: $ty) {
            self.$field.insert(entity, value);
        }

        pub fn $get(&self, entity: EntityId) -> Option<&$ty> {
            self.$field.get(&entity)
        }

        pub fn $get_mut(&mut self, entity: EntityId) -> Option<&mut $ty> {
            self.$field.get_mut(&entity)
        }

        pub fn $remove(&mut self, entity: EntityId) -> Option<$ty> {
            self.$field.remove(&entity)
        }

        pub fn $field(&self) -> &BTreeMap<EntityId, $ty> {
            &self.$field
        }
    };
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    accessors!(transforms, Transform, set_transform, get_transform, get_transform_mut, remove_transform);
    accessors!(movables, Movable, set_movable, get_movable, get_movable_mut, remove_movable);
    accessors!(collision_bodies, CollisionBody, set_collision_body, get_collision_body, get_collision_body_mut, remove_collision_body);
    accessors!(gravity_points, GravityPoint, set_gravity_point, get_gravity_point, get_gravity_point_mut, remove_gravity_point);
    accessors!(player_states, PlayerState, set_player_state, get_player_state, get_player_state_mut, remove_player_state);
    accessors!(player_inputs, FrameBuffer, set_player_input, get_player_input, get_player_input_mut, remove_player_input);
    accessors!(serializables, Serializable, set_serializable, get_serializable, get_serializable_mut, remove_serializable);
    accessors!(healths, Health, set_health, get_health, get_health_mut, remove_health);
    accessors!(damagings, Damaging, set_damaging, get_damaging, get_damaging_mut, remove_damaging);
    accessors!(lifetimes, Lifetime, set_lifetime, get_lifetime, get_lifetime_mut, remove_lifetime);
    accessors!(emitters, Emitter, set_emitter, get_emitter, get_emitter_mut, remove_emitter);
    accessors!(level_bounds, LevelBounds, set_level_bounds, get_level_bounds, get_level_bounds_mut, remove_level_bounds);

    /// World-space position of an entity, resolving the parent chain.
    pub fn world_position(&self, entity: EntityId) -> Option<glam::Vec2> {
        let t = self.transforms.get(&entity)?;
        match t.parent {
            Some(parent) => Some(self.world_position(parent).unwrap_or_default() + t.position),
            None => Some(t.position),
        }
    }

    /// Find the entity carrying a given stable network id.
    pub fn entity_by_net_id(&self, id: NetId) -> Option<EntityId> {
        self.serializables
            .iter()
            .find(|(_, s)| s.id == id)
            .map(|(e, _)| *e)
    }

    /// Remove all components for an entity.
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.transforms.remove(&entity);
        self.movables.remove(&entity);
        self.collision_bodies.remove(&entity);
        self.gravity_points.remove(&entity);
        self.player_states.remove(&entity);
        self.player_inputs.remove(&entity);
        self.serializables.remove(&entity);
        self.healths.remove(&entity);
        self.damagings.remove(&entity);
        self.lifetimes.remove(&entity);
        self.emitters.remove(&entity);
        self.level_bounds.remove(&entity);
    }

    /// Drop every component of every entity.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn set_get_remove() {
        let mut store = ComponentStore::new();
        let id = EntityId(1);
        store.set_movable(id, Movable::default());
        assert!(store.get_movable(id).is_some());
        assert!(store.remove_movable(id).is_some());
        assert!(store.get_movable(id).is_none());
    }

    #[test]
    fn missing_component_is_none_not_error() {
        let store = ComponentStore::new();
        assert!(store.get_health(EntityId(42)).is_none());
        assert!(store.get_transform(EntityId(42)).is_none());
    }

    #[test]
    fn remove_entity_clears_all() {
        let mut store = ComponentStore::new();
        let id = EntityId(3);
        store.set_transform(id, Transform::default());
        store.set_movable(id, Movable::default());
        store.set_health(id, Health::full(100.0));
        store.set_serializable(id, Serializable::fresh());

        store.remove_entity(id);
        assert!(store.get_transform(id).is_none());
        assert!(store.get_movable(id).is_none());
        assert!(store.get_health(id).is_none());
        assert!(store.get_serializable(id).is_none());
    }

    #[test]
    fn world_position_resolves_parent_chain() {
        let mut store = ComponentStore::new();
        let planet = EntityId(1);
        let player = EntityId(2);
        store.set_transform(planet, Transform::from_position(Vec2::new(10.0, 0.0)));
        let mut t = Transform::from_position(Vec2::new(0.0, 3.0));
        t.parent = Some(planet);
        store.set_transform(player, t);

        assert_eq!(store.world_position(player), Some(Vec2::new(10.0, 3.0)));
    }

    #[test]
    fn lookup_by_net_id() {
        let mut store = ComponentStore::new();
        let id = EntityId(9);
        let s = Serializable::fresh();
        store.set_serializable(id, s);
        assert_eq!(store.entity_by_net_id(s.id), Some(id));
        assert_eq!(store.entity_by_net_id(NetId::new()), None);
    }

    #[test]
    fn iteration_order_is_deterministic() {
        let mut store = ComponentStore::new();
        for i in (0..50).rev() {
            store.set_health(EntityId(i), Health::full(1.0));
        }
        let keys: Vec<_> = store.healths().keys().copied().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}

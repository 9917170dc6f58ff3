//! Full-state snapshots keyed by stable network ids.
//!
//! A snapshot is built in one pass over live entities, copying every
//! present optional component. Entity references inside components
//! (transform parent, standing-on surface) are translated to `NetId` on
//! capture and back to fresh handles on restore, because arena handles are
//! not stable across reconstruction.

use glam::Vec2;
use gravwell_common::{NetId, PlayerNumber, PeerId, Shape, Transform, now_millis};
use gravwell_ecs::{
    CollisionBody, Damaging, Emitter, GravityPoint, Health, LevelBounds, Lifetime, Movable,
    PlayerState, Serializable, Standing,
};
use gravwell_input::FrameBuffer;
use gravwell_sim::World;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Transform with its parent reference made portable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub parent: Option<NetId>,
}

/// Collision participation without the per-step contact list, which is
/// rebuilt by the next detect pass anyway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionBodyRecord {
    pub shape: Shape,
    pub collider_type: u8,
    pub collides_with: u8,
}

/// Player state with the standing-on reference made portable. The local
/// input device index stays behind: it is meaningless on another machine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerStateRecord {
    pub player_number: PlayerNumber,
    pub peer: Option<PeerId>,
    pub standing_on: Standing,
    pub standing_on_entity: Option<NetId>,
    pub braking: bool,
}

/// Complete serializable state of the simulation at one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub frame: u64,
    /// Every live serializable entity.
    pub ids: BTreeSet<NetId>,
    pub transforms: BTreeMap<NetId, TransformRecord>,
    pub movables: BTreeMap<NetId, Movable>,
    pub collision_bodies: BTreeMap<NetId, CollisionBodyRecord>,
    pub gravity_points: BTreeMap<NetId, GravityPoint>,
    pub player_states: BTreeMap<NetId, PlayerStateRecord>,
    pub player_inputs: BTreeMap<NetId, FrameBuffer>,
    pub healths: BTreeMap<NetId, Health>,
    pub damagings: BTreeMap<NetId, Damaging>,
    pub lifetimes: BTreeMap<NetId, Lifetime>,
    pub emitters: BTreeMap<NetId, Emitter>,
    pub level_bounds: BTreeMap<NetId, LevelBounds>,
    /// Wall clock at capture time.
    pub captured_at_ms: u64,
    /// Negotiated wall-clock instant at which every participant resumes.
    pub resume_at_ms: u64,
}

impl Snapshot {
    /// Capture the current world state. Entities without a `Serializable`
    /// component are local-only and skipped.
    pub fn capture(world: &World, resume_at_ms: u64) -> Self {
        let store = world.store();
        let mut snap = Snapshot {
            frame: world.frame(),
            ids: BTreeSet::new(),
            transforms: BTreeMap::new(),
            movables: BTreeMap::new(),
            collision_bodies: BTreeMap::new(),
            gravity_points: BTreeMap::new(),
            player_states: BTreeMap::new(),
            player_inputs: BTreeMap::new(),
            healths: BTreeMap::new(),
            damagings: BTreeMap::new(),
            lifetimes: BTreeMap::new(),
            emitters: BTreeMap::new(),
            level_bounds: BTreeMap::new(),
            captured_at_ms: now_millis(),
            resume_at_ms,
        };

        let net_id_of = |entity| store.get_serializable(entity).map(|s| s.id);

        for entity in world.entities() {
            let Some(id) = net_id_of(entity) else {
                continue;
            };
            snap.ids.insert(id);

            if let Some(t) = store.get_transform(entity) {
                snap.transforms.insert(
                    id,
                    TransformRecord {
                        position: t.position,
                        rotation: t.rotation,
                        scale: t.scale,
                        parent: t.parent.and_then(net_id_of),
                    },
                );
            }
            if let Some(m) = store.get_movable(entity) {
                let mut m = *m;
                // Transient: the cache is rebuilt on restore and would not
                // survive the wire anyway (serde skip).
                m.prev_position = Vec2::ZERO;
                snap.movables.insert(id, m);
            }
            if let Some(b) = store.get_collision_body(entity) {
                snap.collision_bodies.insert(
                    id,
                    CollisionBodyRecord {
                        shape: b.shape,
                        collider_type: b.collider_type,
                        collides_with: b.collides_with,
                    },
                );
            }
            if let Some(g) = store.get_gravity_point(entity) {
                snap.gravity_points.insert(id, *g);
            }
            if let Some(p) = store.get_player_state(entity) {
                snap.player_states.insert(
                    id,
                    PlayerStateRecord {
                        player_number: p.player_number,
                        peer: p.peer,
                        standing_on: p.standing_on,
                        standing_on_entity: p.standing_on_entity.and_then(net_id_of),
                        braking: p.braking,
                    },
                );
            }
            if let Some(i) = store.get_player_input(entity) {
                snap.player_inputs.insert(id, i.clone());
            }
            if let Some(h) = store.get_health(entity) {
                snap.healths.insert(id, *h);
            }
            if let Some(d) = store.get_damaging(entity) {
                snap.damagings.insert(id, *d);
            }
            if let Some(l) = store.get_lifetime(entity) {
                snap.lifetimes.insert(id, *l);
            }
            if let Some(e) = store.get_emitter(entity) {
                snap.emitters.insert(id, *e);
            }
            if let Some(b) = store.get_level_bounds(entity) {
                snap.level_bounds.insert(id, *b);
            }
        }

        snap
    }

    /// Rebuild a world strictly from this snapshot.
    ///
    /// Fresh handles are allocated per id; dangling references (an id the
    /// snapshot does not contain) are dropped with a warning rather than
    /// failing the rebuild.
    pub fn restore(&self) -> World {
        let mut world = World::new();
        world.set_frame(self.frame);

        let mut handles: BTreeMap<NetId, gravwell_common::EntityId> = BTreeMap::new();
        for id in &self.ids {
            let entity = world.spawn();
            world
                .store_mut()
                .set_serializable(entity, Serializable { id: *id });
            handles.insert(*id, entity);
        }
        let resolve = |id: &NetId| {
            let handle = handles.get(id).copied();
            if handle.is_none() {
                tracing::warn!(?id, "snapshot reference to unknown entity dropped");
            }
            handle
        };

        for (id, record) in &self.transforms {
            let Some(&entity) = handles.get(id) else {
                continue;
            };
            world.store_mut().set_transform(
                entity,
                Transform {
                    position: record.position,
                    rotation: record.rotation,
                    scale: record.scale,
                    parent: record.parent.as_ref().and_then(resolve),
                },
            );
        }
        for (id, movable) in &self.movables {
            let Some(&entity) = handles.get(id) else {
                continue;
            };
            let mut m = *movable;
            // The old-position cache is local-only; seed it so the first
            // collision pass sees no phantom displacement.
            m.prev_position = self
                .transforms
                .get(id)
                .map(|t| t.position)
                .unwrap_or_default();
            world.store_mut().set_movable(entity, m);
        }
        for (id, record) in &self.collision_bodies {
            let Some(&entity) = handles.get(id) else {
                continue;
            };
            world.store_mut().set_collision_body(
                entity,
                CollisionBody::new(record.shape, record.collider_type, record.collides_with),
            );
        }
        for (id, g) in &self.gravity_points {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_gravity_point(entity, *g);
            }
        }
        for (id, record) in &self.player_states {
            let Some(&entity) = handles.get(id) else {
                continue;
            };
            world.store_mut().set_player_state(
                entity,
                PlayerState {
                    player_number: record.player_number,
                    peer: record.peer,
                    standing_on: record.standing_on,
                    standing_on_entity: record.standing_on_entity.as_ref().and_then(resolve),
                    local_index: None,
                    braking: record.braking,
                },
            );
        }
        for (id, buffer) in &self.player_inputs {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_player_input(entity, buffer.clone());
            }
        }
        for (id, h) in &self.healths {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_health(entity, *h);
            }
        }
        for (id, d) in &self.damagings {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_damaging(entity, *d);
            }
        }
        for (id, l) in &self.lifetimes {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_lifetime(entity, *l);
            }
        }
        for (id, e) in &self.emitters {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_emitter(entity, *e);
            }
        }
        for (id, b) in &self.level_bounds {
            if let Some(&entity) = handles.get(id) {
                world.store_mut().set_level_bounds(entity, *b);
            }
        }

        world
    }
}

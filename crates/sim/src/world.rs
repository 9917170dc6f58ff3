use crate::{collision, control, gravity, integrate, level};
use gravwell_common::{EntityId, NetId, PlayerNumber, SimTuning};
use gravwell_ecs::{Arena, ComponentStore, LevelBounds};
use std::collections::BTreeSet;

/// The authoritative simulation state: arena, component stores, frame counter.
///
/// All per-step mutation flows through [`World::step`]; the orchestrator is
/// the only caller and the only code that creates or destroys entities
/// outside of it.
#[derive(Debug, Clone, Default)]
pub struct World {
    arena: Arena,
    store: ComponentStore,
    frame: u64,
}

/// What one step did, for the orchestrator to react to.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Projectiles spawned this step.
    pub spawned: Vec<EntityId>,
    /// Entities destroyed this step (projectile impact/expiry).
    pub destroyed: Vec<EntityId>,
    /// Players that died and were respawned this step.
    pub respawned: Vec<PlayerNumber>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Set the frame counter directly (snapshot restore only).
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn store(&self) -> &ComponentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ComponentStore {
        &mut self.store
    }

    pub fn entity_count(&self) -> usize {
        self.arena.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.arena.contains(id)
    }

    /// Live handles in deterministic order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.arena.iter()
    }

    pub fn spawn(&mut self) -> EntityId {
        self.arena.spawn()
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.store.remove_entity(id);
        self.arena.despawn(id)
    }

    /// Remove every entity and component. The frame counter is left alone;
    /// a snapshot restore sets it explicitly.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.store.clear();
    }

    /// The level bounds component, wherever it lives.
    pub fn level_bounds(&self) -> Option<LevelBounds> {
        self.store.level_bounds().values().next().copied()
    }

    /// Entity carrying the given player number.
    pub fn player_by_number(&self, number: PlayerNumber) -> Option<EntityId> {
        self.store
            .player_states()
            .iter()
            .find(|(_, p)| p.player_number == number)
            .map(|(id, _)| *id)
    }

    /// The stable ids of every serializable entity.
    pub fn net_ids(&self) -> BTreeSet<NetId> {
        self.store.serializables().values().map(|s| s.id).collect()
    }

    /// Advance the simulation one step.
    ///
    /// Runs the pausable systems in order: player control, gravity
    /// accumulation, integration, then collision detect/resolve against the
    /// freshly moved positions. Impulses recorded by resolution feed the
    /// *next* integration. Advances the frame counter and every player's
    /// input cursor exactly once. The orchestrator skips this entirely
    /// while paused.
    pub fn step(&mut self, tuning: &SimTuning, dt: f32) -> StepReport {
        let mut report = StepReport::default();

        let requests = control::apply(self, tuning, dt);
        for request in requests {
            report.spawned.push(level::spawn_projectile(self, &request));
        }

        gravity::accumulate(self);
        integrate::step(self, tuning, dt);

        let outcome = collision::run(self, tuning, dt);
        report.respawned = outcome.respawned;
        report.destroyed = outcome.destroyed;

        report.destroyed.extend(self.tick_lifetimes(dt));
        for id in &report.destroyed {
            self.despawn(*id);
        }

        self.frame += 1;
        let players: Vec<EntityId> = self.store.player_inputs().keys().copied().collect();
        for id in players {
            if let Some(buffer) = self.store.get_player_input_mut(id) {
                buffer.advance();
            }
        }

        report
    }

    fn tick_lifetimes(&mut self, dt: f32) -> Vec<EntityId> {
        let mut expired = Vec::new();
        let ids: Vec<EntityId> = self.store.lifetimes().keys().copied().collect();
        for id in ids {
            if let Some(lifetime) = self.store.get_lifetime_mut(id) {
                lifetime.remaining -= dt;
                if lifetime.remaining <= 0.0 {
                    expired.push(id);
                }
            }
        }
        expired
    }
}

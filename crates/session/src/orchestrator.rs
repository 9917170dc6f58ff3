//! The orchestrator: owns the world, drives the step pipeline, and turns
//! transport events into queued notifications.

use gravwell_common::{GameConfig, PeerId, PlayerNumber, SimTuning, now_millis};
use gravwell_input::InputSample;
use gravwell_net::wire::{InputWindows, NetError, ServerInfo};
use gravwell_net::{ClientEvent, NetClient, NetServer, ServerEvent, Snapshot};
use gravwell_sim::{World, level};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// How many recent input frames travel in each update.
const INPUT_WINDOW: usize = 8;

/// Pause/resume state machine.
///
/// Every (re)initialization lands in `AwaitingSync` holding the negotiated
/// resume timestamp; the transition to `Running` happens when local wall
/// clock reaches it, giving all participants a common frame zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstarted,
    AwaitingSync { resume_at_ms: u64 },
    Running,
}

/// Inbound happenings, republished for the embedding shell (menus, HUD).
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ServerDiscovered { addr: SocketAddr, info: ServerInfo },
    PlayerJoined(PlayerNumber),
    PlayerLeft(PlayerNumber),
    GameStarted,
    ServerDisconnected,
    PlayerRespawned(PlayerNumber),
    ConfigChanged(SimTuning),
}

enum Role {
    Offline,
    Server(NetServer),
    Client(NetClient),
}

pub struct Orchestrator {
    config: Arc<GameConfig>,
    /// Live tunables; start as `config.sim`, change only via
    /// [`Orchestrator::update_tuning`] so every change is also a
    /// notification.
    tuning: SimTuning,
    world: World,
    phase: Phase,
    role: Role,
    notifications: Vec<Notification>,
    /// Server side: which player each transport peer controls.
    peer_players: BTreeMap<PeerId, PlayerNumber>,
    /// The player driven by this machine's input, if any.
    local_player: Option<PlayerNumber>,
    started: bool,
}

impl Orchestrator {
    /// Single-machine session: level plus one local player, running as soon
    /// as the first step observes the resume timestamp.
    pub fn offline(config: Arc<GameConfig>) -> Self {
        let mut this = Self::with_role(config, Role::Offline);
        this.initialize_fresh();
        this
    }

    /// Host a LAN session on the configured port.
    pub fn host(config: Arc<GameConfig>) -> Result<Self, NetError> {
        let server = NetServer::bind(Arc::clone(&config))?;
        let mut this = Self::with_role(config, Role::Server(server));
        this.initialize_fresh();
        Ok(this)
    }

    /// Host on an ephemeral loopback port (tests and local play).
    pub fn host_local(config: Arc<GameConfig>) -> Result<Self, NetError> {
        let server = NetServer::bind_local(Arc::clone(&config))?;
        let mut this = Self::with_role(config, Role::Server(server));
        this.initialize_fresh();
        Ok(this)
    }

    /// A client role with no connection yet: enough to browse the LAN for
    /// servers from a menu.
    pub fn browser(config: Arc<GameConfig>) -> Result<Self, NetError> {
        let client = NetClient::bind(Arc::clone(&config))?;
        Ok(Self::with_role(config, Role::Client(client)))
    }

    /// Join a remote session. Blocks for at most the configured connect
    /// timeout; on failure the caller stays in its menu state.
    pub fn join(config: Arc<GameConfig>, addr: SocketAddr) -> Result<Self, NetError> {
        let mut client = NetClient::bind(Arc::clone(&config))?;
        client.connect(addr)?;
        // Unstarted until the first snapshot arrives.
        Ok(Self::with_role(config, Role::Client(client)))
    }

    fn with_role(config: Arc<GameConfig>, role: Role) -> Self {
        let tuning = config.sim.clone();
        Self {
            config,
            tuning,
            world: World::new(),
            phase: Phase::Unstarted,
            role,
            notifications: Vec::new(),
            peer_players: BTreeMap::new(),
            local_player: None,
            started: false,
        }
    }

    /// Build a fresh level with one local player and arm the phase machine.
    fn initialize_fresh(&mut self) {
        level::build_level(&mut self.world);
        let number = 1;
        let entity = level::spawn_player(&mut self.world, number);
        if let Some(state) = self.world.store_mut().get_player_state_mut(entity) {
            state.local_index = Some(0);
        }
        self.local_player = Some(number);
        self.started = true;
        self.pause_until(now_millis());
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn frame(&self) -> u64 {
        self.world.frame()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn tuning(&self) -> &SimTuning {
        &self.tuning
    }

    pub fn local_player(&self) -> Option<PlayerNumber> {
        self.local_player
    }

    /// Address the transport is bound to, when there is one.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.role {
            Role::Server(server) => server.local_addr().ok(),
            Role::Client(_) | Role::Offline => None,
        }
    }

    /// Ask the LAN for servers (client role only; replies surface as
    /// notifications).
    pub fn discover(&self) -> Result<(), NetError> {
        match &self.role {
            Role::Client(client) => client.discover(),
            _ => Ok(()),
        }
    }

    /// Take everything that happened since the last drain.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Park the simulation until the given wall-clock instant.
    pub fn pause_until(&mut self, resume_at_ms: u64) {
        self.phase = Phase::AwaitingSync { resume_at_ms };
    }

    /// Replace the live tunables. Routed through the notification queue so
    /// every consumer observes the change the same way.
    pub fn update_tuning(&mut self, tuning: SimTuning) {
        self.tuning = tuning.clone();
        self.notifications.push(Notification::ConfigChanged(tuning));
    }

    /// Record this step's locally captured input at the current cursor.
    /// Works while paused too; only the cursor is frozen.
    pub fn push_local_input(&mut self, sample: InputSample) {
        let Some(number) = self.local_player else {
            return;
        };
        let Some(entity) = self.world.player_by_number(number) else {
            return;
        };
        if let Some(buffer) = self.world.store_mut().get_player_input_mut(entity) {
            let frame = buffer.current_frame();
            buffer.insert(frame, sample);
        }
    }

    /// One orchestrator step: drain the transport, run the phase machine,
    /// and (while Running) publish inputs and advance the simulation.
    /// Transport polling and input capture keep working while paused;
    /// the pausable systems and the frame counter do not.
    pub fn step(&mut self, dt: f32) {
        self.pump_network();

        if let Phase::AwaitingSync { resume_at_ms } = self.phase
            && now_millis() >= resume_at_ms
        {
            tracing::info!(frame = self.world.frame(), "synchronized; resuming");
            self.phase = Phase::Running;
        }
        if self.phase != Phase::Running {
            return;
        }

        self.log_stale_buffers();
        self.publish_inputs();

        let report = self.world.step(&self.tuning, dt);
        for number in report.respawned {
            self.notifications
                .push(Notification::PlayerRespawned(number));
        }
    }

    fn log_stale_buffers(&self) {
        for (entity, buffer) in self.world.store().player_inputs() {
            if buffer.is_stale() {
                let number = self
                    .world
                    .store()
                    .get_player_state(*entity)
                    .map(|p| p.player_number);
                // The simulation has outrun this player's received input;
                // lookups fall back to the neutral sample.
                tracing::debug!(player = ?number, "input buffer stale");
            }
        }
    }

    fn pump_network(&mut self) {
        match &mut self.role {
            Role::Offline => {}
            Role::Server(server) => {
                let events = server.poll();
                for event in events {
                    match event {
                        ServerEvent::PeerConnected(peer) => self.admit_peer(peer),
                        ServerEvent::PeerDisconnected(peer) => self.remove_peer(peer),
                        ServerEvent::InputsReceived { peer, inputs } => {
                            self.apply_peer_inputs(peer, inputs);
                        }
                    }
                }
            }
            Role::Client(client) => {
                let events = client.poll();
                for event in events {
                    match event {
                        ClientEvent::ServerDiscovered { addr, info } => {
                            self.notifications
                                .push(Notification::ServerDiscovered { addr, info });
                        }
                        ClientEvent::SnapshotReceived(snapshot) => self.apply_snapshot(snapshot),
                        ClientEvent::InputsReceived(inputs) => self.apply_remote_inputs(inputs),
                        ClientEvent::ServerDisconnected => {
                            self.notifications.push(Notification::ServerDisconnected);
                        }
                    }
                }
            }
        }
    }

    /// A peer connected: spawn its player, pause everyone until a common
    /// resume timestamp, and hand the newcomer one snapshot. Other peers
    /// get the updated full state so the roster matches everywhere.
    fn admit_peer(&mut self, peer: PeerId) {
        let number = self.next_free_player_number();
        let entity = level::spawn_player(&mut self.world, number);
        if let Some(state) = self.world.store_mut().get_player_state_mut(entity) {
            state.peer = Some(peer);
        }
        self.peer_players.insert(peer, number);

        let resume_at = now_millis() + self.tuning.sync_pause_ms;
        let snapshot = Snapshot::capture(&self.world, resume_at);
        let Role::Server(server) = &mut self.role else {
            return;
        };
        if let Err(e) = server.send_snapshot(peer, &snapshot) {
            tracing::warn!(?peer, error = %e, "snapshot handoff failed");
        }
        let others: Vec<PeerId> = server.peers().filter(|p| *p != peer).collect();
        for other in others {
            if let Err(e) = server.send_snapshot(other, &snapshot) {
                tracing::warn!(peer = ?other, error = %e, "roster update failed");
            }
        }

        self.pause_until(resume_at);
        self.notifications.push(Notification::PlayerJoined(number));
        tracing::info!(?peer, player = number, resume_at, "player joined");
    }

    fn remove_peer(&mut self, peer: PeerId) {
        let Some(number) = self.peer_players.remove(&peer) else {
            return;
        };
        if let Some(entity) = self.world.player_by_number(number) {
            self.world.despawn(entity);
        }
        self.notifications.push(Notification::PlayerLeft(number));
        tracing::info!(?peer, player = number, "player left");
    }

    fn next_free_player_number(&self) -> PlayerNumber {
        let mut number = 1;
        while self
            .world
            .store()
            .player_states()
            .values()
            .any(|p| p.player_number == number)
        {
            number += 1;
        }
        number
    }

    /// Server side: a peer's input window applies only to its own player.
    fn apply_peer_inputs(&mut self, peer: PeerId, inputs: InputWindows) {
        let Some(&number) = self.peer_players.get(&peer) else {
            return;
        };
        for (claimed, window) in inputs {
            if claimed != number {
                tracing::debug!(?peer, claimed, "input for foreign player dropped");
                continue;
            }
            self.merge_window(number, window);
        }
    }

    /// Client side: merged windows for everyone except the local player,
    /// whose buffer is already ahead of the echo.
    fn apply_remote_inputs(&mut self, inputs: InputWindows) {
        for (number, window) in inputs {
            if Some(number) == self.local_player {
                continue;
            }
            self.merge_window(number, window);
        }
    }

    fn merge_window(&mut self, number: PlayerNumber, window: Vec<(u64, InputSample)>) {
        let Some(entity) = self.world.player_by_number(number) else {
            return;
        };
        if let Some(buffer) = self.world.store_mut().get_player_input_mut(entity) {
            buffer.merge(window);
        }
    }

    /// Tear down whatever exists and rebuild strictly from the snapshot.
    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.world = snapshot.restore();
        self.peer_players.clear();

        // Find the player this machine controls by its transport peer id.
        let my_peer = match &self.role {
            Role::Client(client) => client.peer_id(),
            _ => None,
        };
        self.local_player = None;
        let players: Vec<_> = self
            .world
            .store()
            .player_states()
            .iter()
            .map(|(entity, state)| (*entity, state.peer, state.player_number))
            .collect();
        for (entity, peer, number) in players {
            if peer.is_some() && peer == my_peer {
                self.local_player = Some(number);
                if let Some(state) = self.world.store_mut().get_player_state_mut(entity) {
                    state.local_index = Some(0);
                }
            }
        }

        self.pause_until(snapshot.resume_at_ms);
        if !self.started {
            self.started = true;
            self.notifications.push(Notification::GameStarted);
        }
        tracing::info!(
            frame = snapshot.frame,
            entities = self.world.entity_count(),
            resume_at = snapshot.resume_at_ms,
            local_player = ?self.local_player,
            "world rebuilt from snapshot"
        );
    }

    /// While Running, stream input windows: the server broadcasts the
    /// merged set, a client sends its own player's window.
    fn publish_inputs(&mut self) {
        match &mut self.role {
            Role::Offline => {}
            Role::Server(server) => {
                let mut windows = InputWindows::new();
                for (entity, state) in self.world.store().player_states() {
                    if let Some(buffer) = self.world.store().get_player_input(*entity) {
                        windows.insert(state.player_number, buffer.recent_window(INPUT_WINDOW));
                    }
                }
                server.broadcast_inputs(windows);
            }
            Role::Client(client) => {
                let Some(number) = self.local_player else {
                    return;
                };
                let window = self
                    .world
                    .player_by_number(number)
                    .and_then(|entity| self.world.store().get_player_input(entity))
                    .map(|buffer| buffer.recent_window(INPUT_WINDOW));
                if let Some(window) = window
                    && let Err(e) = client.send_inputs(number, window)
                {
                    tracing::debug!(error = %e, "input send failed");
                }
            }
        }
    }

    /// Leave the session gracefully.
    pub fn shutdown(&mut self) {
        if let Role::Client(client) = &mut self.role {
            client.disconnect();
        }
    }
}

//! Client role: discovery, join handshake, snapshot ack, sequenced input
//! reception.

use crate::snapshot::Snapshot;
use crate::socket::NetSocket;
use crate::wire::{FullGameState, InputWindows, Message, NetError, PlayerInputs, ServerInfo};
use gravwell_common::{GameConfig, PeerId, PlayerNumber};
use gravwell_input::InputSample;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inbound events, drained once per step by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ServerDiscovered { addr: SocketAddr, info: ServerInfo },
    /// A full snapshot arrived (already acknowledged). The first one after
    /// connecting is the start-game signal.
    SnapshotReceived(Snapshot),
    InputsReceived(InputWindows),
    ServerDisconnected,
}

struct ServerLink {
    addr: SocketAddr,
    peer: PeerId,
    last_recv: Instant,
    last_send: Instant,
    last_snapshot_seq: Option<u32>,
    last_input_seq: Option<u32>,
}

pub struct NetClient {
    socket: NetSocket,
    config: Arc<GameConfig>,
    link: Option<ServerLink>,
    input_seq: u32,
}

const KEEPALIVE: Duration = Duration::from_millis(1_000);
/// How often the join request is repeated while connecting.
const JOIN_RESEND: Duration = Duration::from_millis(500);

impl NetClient {
    pub fn bind(config: Arc<GameConfig>) -> Result<Self, NetError> {
        let socket = NetSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            config,
            link: None,
            input_seq: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.link.as_ref().map(|l| l.peer)
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|l| l.addr)
    }

    /// Broadcast a discovery probe on the LAN. Replies surface later as
    /// [`ClientEvent::ServerDiscovered`].
    pub fn discover(&self) -> Result<(), NetError> {
        let target = SocketAddr::from((Ipv4Addr::BROADCAST, self.config.server_port));
        self.socket.send_to(&Message::ListServersRequest, target)
    }

    /// Probe one known address instead of broadcasting.
    pub fn discover_at(&self, addr: SocketAddr) -> Result<(), NetError> {
        self.socket.send_to(&Message::ListServersRequest, addr)
    }

    /// Request a connection and block until the server answers or the
    /// configured timeout elapses. On failure the caller falls back to its
    /// menu state; nothing here reaches the simulation.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<PeerId, NetError> {
        let timeout = Duration::from_millis(self.config.sim.connect_timeout_ms);
        let deadline = Instant::now() + timeout;
        let mut last_attempt: Option<Instant> = None;

        loop {
            let now = Instant::now();
            if now >= deadline {
                tracing::info!(%addr, "connection attempt timed out");
                return Err(NetError::ConnectTimeout);
            }
            if last_attempt.is_none_or(|t| now.duration_since(t) >= JOIN_RESEND) {
                self.socket.send_to(&Message::JoinGameRequest, addr)?;
                last_attempt = Some(now);
            }

            for (from, message) in self.socket.drain() {
                if from != addr {
                    continue;
                }
                if let Message::JoinGameResponse(response) = message {
                    if !response.accepted {
                        return Err(NetError::JoinDenied);
                    }
                    let now = Instant::now();
                    self.link = Some(ServerLink {
                        addr,
                        peer: response.peer,
                        last_recv: now,
                        last_send: now,
                        last_snapshot_seq: None,
                        last_input_seq: None,
                    });
                    tracing::info!(%addr, peer = ?response.peer, "connected");
                    return Ok(response.peer);
                }
                // Anything else (an early snapshot, say) is retransmitted by
                // the server; dropping it here is safe.
            }

            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Drain the inbound queue, service the protocol, and surface events.
    pub fn poll(&mut self) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        let now = Instant::now();

        for (addr, message) in self.socket.drain() {
            match message {
                Message::ListServersResponse(info) => {
                    events.push(ClientEvent::ServerDiscovered { addr, info });
                }
                other => self.handle_connected(addr, other, now, &mut events),
            }
        }

        // Silence past the timeout counts as a disconnect.
        if let Some(link) = &self.link {
            let timeout = Duration::from_millis(self.config.sim.peer_timeout_ms);
            if now.duration_since(link.last_recv) >= timeout {
                tracing::info!("server timed out");
                self.link = None;
                events.push(ClientEvent::ServerDisconnected);
            }
        }

        if let Some(link) = self.link.as_mut()
            && now.duration_since(link.last_send) >= KEEPALIVE
        {
            link.last_send = now;
            let addr = link.addr;
            if let Err(e) = self.socket.send_to(&Message::Ping, addr) {
                tracing::warn!(error = %e, "keepalive failed");
            }
        }

        events
    }

    /// Messages other than discovery replies must come from the connected
    /// server; anything else is logged and dropped.
    fn handle_connected(
        &mut self,
        addr: SocketAddr,
        message: Message,
        now: Instant,
        events: &mut Vec<ClientEvent>,
    ) {
        let Some(link) = self.link.as_mut() else {
            tracing::debug!(%addr, "message while disconnected dropped");
            return;
        };
        if addr != link.addr {
            tracing::debug!(%addr, "message from stranger dropped");
            return;
        }
        link.last_recv = now;

        match message {
            Message::FullGameState(FullGameState { sequence, snapshot }) => {
                // Always ack; the server keeps resending until we do.
                link.last_send = now;
                if let Err(e) = self
                    .socket
                    .send_to(&Message::FullGameStateAck { sequence }, addr)
                {
                    tracing::warn!(error = %e, "snapshot ack failed");
                }
                // Ordered channel: replay of an old snapshot is dropped.
                if link.last_snapshot_seq.is_some_and(|last| sequence <= last) {
                    return;
                }
                link.last_snapshot_seq = Some(sequence);
                events.push(ClientEvent::SnapshotReceived(snapshot));
            }
            Message::PlayerInputs(PlayerInputs { sequence, inputs }) => {
                if link.last_input_seq.is_some_and(|last| sequence <= last) {
                    return;
                }
                link.last_input_seq = Some(sequence);
                events.push(ClientEvent::InputsReceived(inputs));
            }
            Message::Ping => {
                link.last_send = now;
                if let Err(e) = self.socket.send_to(&Message::Pong, addr) {
                    tracing::warn!(error = %e, "pong failed");
                }
            }
            Message::Pong | Message::JoinGameResponse(_) => {}
            Message::Disconnect => {
                tracing::info!("server closed the connection");
                self.link = None;
                events.push(ClientEvent::ServerDisconnected);
            }
            other => {
                tracing::warn!(tag = other.tag(), "unexpected message dropped");
            }
        }
    }

    /// Send this player's recent input window, best-effort sequenced.
    pub fn send_inputs(
        &mut self,
        player: PlayerNumber,
        window: Vec<(u64, InputSample)>,
    ) -> Result<(), NetError> {
        let link = self.link.as_mut().ok_or(NetError::NotConnected)?;
        self.input_seq += 1;
        let mut inputs = InputWindows::new();
        inputs.insert(player, window);
        link.last_send = Instant::now();
        let addr = link.addr;
        self.socket.send_to(
            &Message::PlayerInputs(PlayerInputs {
                sequence: self.input_seq,
                inputs,
            }),
            addr,
        )
    }

    /// Leave gracefully. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            let _ = self.socket.send_to(&Message::Disconnect, link.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{NetServer, ServerEvent};
    use gravwell_common::GameConfig;
    use gravwell_sim::{World, level};

    fn test_config() -> Arc<GameConfig> {
        let mut config = GameConfig::default();
        config.sim.connect_timeout_ms = 500;
        config.sim.peer_timeout_ms = 400;
        config.sim.snapshot_retry_ms = 50;
        Arc::new(config)
    }

    /// Pump both endpoints until the predicate on collected events holds.
    fn pump<T>(
        mut step: impl FnMut(&mut Vec<T>),
        done: impl Fn(&[T]) -> bool,
        what: &str,
    ) -> Vec<T> {
        let mut events = Vec::new();
        for _ in 0..300 {
            step(&mut events);
            if done(&events) {
                return events;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("timed out waiting for {what}");
    }

    fn connect_pair() -> (NetServer, NetClient, PeerId) {
        let config = test_config();
        let mut server = NetServer::bind_local(Arc::clone(&config)).unwrap();
        let addr = server.local_addr().unwrap();

        let client_config = Arc::clone(&config);
        let joiner = std::thread::spawn(move || {
            let mut client = NetClient::bind(client_config).unwrap();
            let peer = client.connect(addr);
            (client, peer)
        });

        pump(
            |events: &mut Vec<ServerEvent>| events.extend(server.poll()),
            |events| {
                events
                    .iter()
                    .any(|e| matches!(e, ServerEvent::PeerConnected(_)))
            },
            "peer to connect",
        );
        let (client, peer) = joiner.join().unwrap();
        (server, client, peer.expect("join accepted"))
    }

    #[test]
    fn discovery_roundtrip() {
        let config = test_config();
        let mut server = NetServer::bind_local(Arc::clone(&config)).unwrap();
        let addr = server.local_addr().unwrap();
        let mut client = NetClient::bind(config).unwrap();
        client.discover_at(addr).unwrap();

        let events = pump(
            |events: &mut Vec<ClientEvent>| {
                server.poll();
                events.extend(client.poll());
            },
            |events| !events.is_empty(),
            "discovery reply",
        );
        match &events[0] {
            ClientEvent::ServerDiscovered { addr: from, info } => {
                assert_eq!(*from, addr);
                assert_eq!(info.name, "gravwell");
                assert_eq!(info.players, 0);
            }
            other => panic!("expected discovery, got {other:?}"),
        }
    }

    #[test]
    fn connect_timeout_resolves_to_failure() {
        let config = test_config();
        // A socket that receives and never answers.
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = silent.local_addr().unwrap();
        let mut client = NetClient::bind(config).unwrap();
        let started = Instant::now();
        match client.connect(addr) {
            Err(NetError::ConnectTimeout) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(!client.is_connected());
    }

    #[test]
    fn snapshot_is_delivered_and_acked() {
        let (mut server, mut client, peer) = connect_pair();

        let mut world = World::new();
        level::build_level(&mut world);
        level::spawn_player(&mut world, 1);
        let snapshot = crate::snapshot::Snapshot::capture(&world, 7777);

        server.send_snapshot(peer, &snapshot).unwrap();
        assert_eq!(server.pending_snapshots(), 1);

        let events = pump(
            |events: &mut Vec<ClientEvent>| {
                server.poll();
                events.extend(client.poll());
            },
            |events| {
                events
                    .iter()
                    .any(|e| matches!(e, ClientEvent::SnapshotReceived(_)))
            },
            "snapshot delivery",
        );
        let received = events
            .iter()
            .find_map(|e| match e {
                ClientEvent::SnapshotReceived(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(received.ids, snapshot.ids);
        assert_eq!(received.resume_at_ms, 7777);

        // The ack clears the retransmit slot.
        for _ in 0..300 {
            server.poll();
            if server.pending_snapshots() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(server.pending_snapshots(), 0);
    }

    #[test]
    fn inputs_flow_both_ways_sequenced() {
        let (mut server, mut client, peer) = connect_pair();

        client
            .send_inputs(2, vec![(5, InputSample::NEUTRAL)])
            .unwrap();
        let events = pump(
            |events: &mut Vec<ServerEvent>| events.extend(server.poll()),
            |events| {
                events
                    .iter()
                    .any(|e| matches!(e, ServerEvent::InputsReceived { .. }))
            },
            "client inputs",
        );
        let ServerEvent::InputsReceived { peer: from, inputs } = events
            .iter()
            .find(|e| matches!(e, ServerEvent::InputsReceived { .. }))
            .unwrap()
        else {
            unreachable!()
        };
        assert_eq!(*from, peer);
        assert_eq!(inputs.get(&2).map(Vec::len), Some(1));

        let mut merged = InputWindows::new();
        merged.insert(2, vec![(6, InputSample::NEUTRAL)]);
        server.broadcast_inputs(merged.clone());
        let events = pump(
            |events: &mut Vec<ClientEvent>| {
                server.poll();
                events.extend(client.poll());
            },
            |events| {
                events
                    .iter()
                    .any(|e| matches!(e, ClientEvent::InputsReceived(_)))
            },
            "broadcast inputs",
        );
        assert!(events.contains(&ClientEvent::InputsReceived(merged)));
    }

    #[test]
    fn graceful_disconnect_reaches_server() {
        let (mut server, mut client, peer) = connect_pair();
        client.disconnect();
        let events = pump(
            |events: &mut Vec<ServerEvent>| events.extend(server.poll()),
            |events| {
                events
                    .iter()
                    .any(|e| matches!(e, ServerEvent::PeerDisconnected(_)))
            },
            "disconnect",
        );
        assert!(events.contains(&ServerEvent::PeerDisconnected(peer)));
        assert_eq!(server.peer_count(), 0);
    }

    #[test]
    fn vanished_server_times_out_as_disconnect() {
        let (server, mut client, _peer) = connect_pair();
        drop(server);
        let events = pump(
            |events: &mut Vec<ClientEvent>| events.extend(client.poll()),
            |events| events.contains(&ClientEvent::ServerDisconnected),
            "server timeout",
        );
        assert!(events.contains(&ClientEvent::ServerDisconnected));
        assert!(!client.is_connected());
    }
}


//! Server role: discovery responder, join handshake, reliable snapshot
//! delivery and input rebroadcast.

use crate::snapshot::Snapshot;
use crate::socket::NetSocket;
use crate::wire::{
    self, FullGameState, InputWindows, JoinGameResponse, Message, NetError, PlayerInputs,
    ServerInfo,
};
use gravwell_common::{GameConfig, PeerId};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Inbound events, drained once per step by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
    InputsReceived { peer: PeerId, inputs: InputWindows },
}

struct Peer {
    addr: SocketAddr,
    last_recv: Instant,
    last_send: Instant,
    /// The one in-flight reliable message: retransmitted until acked.
    pending_snapshot: Option<PendingSnapshot>,
    snapshot_seq: u32,
    last_input_seq: Option<u32>,
}

struct PendingSnapshot {
    sequence: u32,
    bytes: Vec<u8>,
    last_sent: Instant,
}

/// The authoritative endpoint. Always accepts join requests (up to the
/// player cap) and answers unconnected discovery probes.
pub struct NetServer {
    socket: NetSocket,
    config: Arc<GameConfig>,
    peers: BTreeMap<PeerId, Peer>,
    next_peer: u64,
    input_seq: u32,
}

const KEEPALIVE: Duration = Duration::from_millis(1_000);

impl NetServer {
    /// Bind the configured server port.
    pub fn bind(config: Arc<GameConfig>) -> Result<Self, NetError> {
        let socket = NetSocket::bind(("0.0.0.0", config.server_port))?;
        tracing::info!(port = config.server_port, "server listening");
        Ok(Self {
            socket,
            config,
            peers: BTreeMap::new(),
            next_peer: 1,
            input_seq: 0,
        })
    }

    /// Bind an ephemeral local port (tests).
    pub fn bind_local(config: Arc<GameConfig>) -> Result<Self, NetError> {
        let socket = NetSocket::bind("127.0.0.1:0")?;
        Ok(Self {
            socket,
            config,
            peers: BTreeMap::new(),
            next_peer: 1,
            input_seq: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        self.socket.local_addr()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.keys().copied()
    }

    /// Snapshots still awaiting acknowledgement.
    pub fn pending_snapshots(&self) -> usize {
        self.peers
            .values()
            .filter(|p| p.pending_snapshot.is_some())
            .count()
    }

    /// Drain the inbound queue, service the protocol, and surface events.
    pub fn poll(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        let now = Instant::now();

        for (addr, message) in self.socket.drain() {
            if let Some(peer) = self.peer_by_addr(addr) {
                if let Some(p) = self.peers.get_mut(&peer) {
                    p.last_recv = now;
                }
            }
            self.dispatch(addr, message, now, &mut events);
        }

        self.retransmit_snapshots(now);
        self.expire_peers(now, &mut events);
        self.keepalive(now);

        events
    }

    fn dispatch(
        &mut self,
        addr: SocketAddr,
        message: Message,
        now: Instant,
        events: &mut Vec<ServerEvent>,
    ) {
        match message {
            Message::ListServersRequest => {
                // Unconnected probe; anyone may ask.
                let info = ServerInfo {
                    name: self.config.server_name.clone(),
                    players: self.peers.len() as u8,
                    max_players: self.config.sim.max_players,
                };
                self.send(addr, &Message::ListServersResponse(info));
            }
            Message::JoinGameRequest => self.handle_join(addr, now, events),
            Message::FullGameStateAck { sequence } => {
                if let Some(peer) = self.peer_by_addr(addr)
                    && let Some(p) = self.peers.get_mut(&peer)
                    && p.pending_snapshot
                        .as_ref()
                        .is_some_and(|pending| pending.sequence == sequence)
                {
                    p.pending_snapshot = None;
                    tracing::debug!(?peer, sequence, "snapshot acknowledged");
                }
            }
            Message::PlayerInputs(PlayerInputs { sequence, inputs }) => {
                let Some(peer) = self.peer_by_addr(addr) else {
                    tracing::debug!(%addr, "inputs from unknown peer dropped");
                    return;
                };
                let Some(p) = self.peers.get_mut(&peer) else {
                    return;
                };
                // Sequenced channel: only ever move forward.
                if p.last_input_seq.is_some_and(|last| sequence <= last) {
                    return;
                }
                p.last_input_seq = Some(sequence);
                events.push(ServerEvent::InputsReceived { peer, inputs });
            }
            Message::Ping => self.send(addr, &Message::Pong),
            Message::Pong => {}
            Message::Disconnect => {
                if let Some(peer) = self.peer_by_addr(addr) {
                    self.peers.remove(&peer);
                    tracing::info!(?peer, %addr, "peer disconnected");
                    events.push(ServerEvent::PeerDisconnected(peer));
                }
            }
            other => {
                tracing::warn!(%addr, tag = other.tag(), "unexpected message dropped");
            }
        }
    }

    fn handle_join(&mut self, addr: SocketAddr, now: Instant, events: &mut Vec<ServerEvent>) {
        // Duplicate join (our response was lost): re-acknowledge.
        if let Some(peer) = self.peer_by_addr(addr) {
            self.send(
                addr,
                &Message::JoinGameResponse(JoinGameResponse {
                    accepted: true,
                    peer,
                }),
            );
            return;
        }

        if self.peers.len() >= usize::from(self.config.sim.max_players) {
            tracing::info!(%addr, "join refused: server full");
            self.send(
                addr,
                &Message::JoinGameResponse(JoinGameResponse {
                    accepted: false,
                    peer: PeerId(0),
                }),
            );
            return;
        }

        let peer = PeerId(self.next_peer);
        self.next_peer += 1;
        self.peers.insert(
            peer,
            Peer {
                addr,
                last_recv: now,
                last_send: now,
                pending_snapshot: None,
                snapshot_seq: 0,
                last_input_seq: None,
            },
        );
        self.send(
            addr,
            &Message::JoinGameResponse(JoinGameResponse {
                accepted: true,
                peer,
            }),
        );
        tracing::info!(?peer, %addr, "peer connected");
        events.push(ServerEvent::PeerConnected(peer));
    }

    /// Send one full snapshot to a peer, reliable-ordered: kept and
    /// retransmitted until the matching ack arrives.
    pub fn send_snapshot(&mut self, peer: PeerId, snapshot: &Snapshot) -> Result<(), NetError> {
        let p = self.peers.get_mut(&peer).ok_or(NetError::NotConnected)?;
        p.snapshot_seq += 1;
        let sequence = p.snapshot_seq;
        let bytes = wire::encode(&Message::FullGameState(FullGameState {
            sequence,
            snapshot: snapshot.clone(),
        }))?;
        let addr = p.addr;
        let now = Instant::now();
        p.last_send = now;
        tracing::debug!(?peer, sequence, size = bytes.len(), "snapshot sent");
        self.socket.send_bytes(&bytes, addr)?;
        p.pending_snapshot = Some(PendingSnapshot {
            sequence,
            bytes,
            last_sent: now,
        });
        Ok(())
    }

    /// Broadcast the merged input windows to every peer (sequenced,
    /// fire-and-forget).
    pub fn broadcast_inputs(&mut self, inputs: InputWindows) {
        if self.peers.is_empty() {
            return;
        }
        self.input_seq += 1;
        let message = Message::PlayerInputs(PlayerInputs {
            sequence: self.input_seq,
            inputs,
        });
        let now = Instant::now();
        let addrs: Vec<SocketAddr> = self.peers.values().map(|p| p.addr).collect();
        for p in self.peers.values_mut() {
            p.last_send = now;
        }
        for addr in addrs {
            self.send(addr, &message);
        }
    }

    fn retransmit_snapshots(&mut self, now: Instant) {
        let retry = Duration::from_millis(self.config.sim.snapshot_retry_ms);
        let mut resends: Vec<(SocketAddr, Vec<u8>)> = Vec::new();
        for p in self.peers.values_mut() {
            if let Some(pending) = &mut p.pending_snapshot
                && now.duration_since(pending.last_sent) >= retry
            {
                pending.last_sent = now;
                p.last_send = now;
                resends.push((p.addr, pending.bytes.clone()));
            }
        }
        for (addr, bytes) in resends {
            tracing::debug!(%addr, "retransmitting unacknowledged snapshot");
            if let Err(e) = self.socket.send_bytes(&bytes, addr) {
                tracing::warn!(%addr, error = %e, "snapshot retransmit failed");
            }
        }
    }

    fn expire_peers(&mut self, now: Instant, events: &mut Vec<ServerEvent>) {
        let timeout = Duration::from_millis(self.config.sim.peer_timeout_ms);
        let expired: Vec<PeerId> = self
            .peers
            .iter()
            .filter(|(_, p)| now.duration_since(p.last_recv) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        for peer in expired {
            self.peers.remove(&peer);
            tracing::info!(?peer, "peer timed out");
            events.push(ServerEvent::PeerDisconnected(peer));
        }
    }

    fn keepalive(&mut self, now: Instant) {
        let idle: Vec<SocketAddr> = self
            .peers
            .values_mut()
            .filter(|p| now.duration_since(p.last_send) >= KEEPALIVE)
            .map(|p| {
                p.last_send = now;
                p.addr
            })
            .collect();
        for addr in idle {
            self.send(addr, &Message::Ping);
        }
    }

    fn peer_by_addr(&self, addr: SocketAddr) -> Option<PeerId> {
        self.peers
            .iter()
            .find(|(_, p)| p.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Best-effort send; a socket error is logged, never propagated into
    /// the simulation.
    fn send(&self, addr: SocketAddr, message: &Message) {
        if let Err(e) = self.socket.send_to(message, addr) {
            tracing::warn!(%addr, error = %e, "send failed");
        }
    }
}

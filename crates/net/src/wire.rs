//! Wire format: one tag byte followed by a CBOR payload.
//!
//! Game messages travel alongside a handful of transport control frames
//! (join response, snapshot ack, ping/pong, disconnect) that implement the
//! delivery guarantees. An unknown tag or a truncated payload is an error
//! the caller logs and drops; it never tears down the connection.

use crate::snapshot::Snapshot;
use gravwell_common::{PeerId, PlayerNumber};
use gravwell_input::InputSample;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Errors from encoding or decoding a single datagram.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty datagram")]
    Empty,
    #[error("unknown message tag {0:#04x}")]
    UnknownTag(u8),
    #[error("CBOR encode error: {0}")]
    Encode(String),
    #[error("CBOR decode error: {0}")]
    Decode(String),
}

/// Errors surfaced to callers of transport operations.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("connection attempt timed out")]
    ConnectTimeout,
    #[error("server refused the join request")]
    JoinDenied,
    #[error("not connected")]
    NotConnected,
}

/// Per-player input windows: frame number -> sample, newest last.
pub type InputWindows = BTreeMap<PlayerNumber, Vec<(u64, InputSample)>>;

/// Discovery reply payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub players: u8,
    pub max_players: u8,
}

/// Handshake reply. A duplicate join is re-acknowledged with the same peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameResponse {
    pub accepted: bool,
    pub peer: PeerId,
}

/// Reliable-ordered snapshot carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullGameState {
    pub sequence: u32,
    pub snapshot: Snapshot,
}

/// Best-effort sequenced input carrier; a receiver keeps only the newest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInputs {
    pub sequence: u32,
    pub inputs: InputWindows,
}

/// Every message that can appear on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    ListServersRequest,
    ListServersResponse(ServerInfo),
    JoinGameRequest,
    JoinGameResponse(JoinGameResponse),
    FullGameState(FullGameState),
    FullGameStateAck { sequence: u32 },
    PlayerInputs(PlayerInputs),
    Ping,
    Pong,
    Disconnect,
}

mod tag {
    pub const LIST_SERVERS_REQUEST: u8 = 0x01;
    pub const LIST_SERVERS_RESPONSE: u8 = 0x02;
    pub const JOIN_GAME_REQUEST: u8 = 0x03;
    pub const JOIN_GAME_RESPONSE: u8 = 0x04;
    pub const FULL_GAME_STATE: u8 = 0x05;
    pub const FULL_GAME_STATE_ACK: u8 = 0x06;
    pub const PLAYER_INPUTS: u8 = 0x07;
    pub const PING: u8 = 0x08;
    pub const PONG: u8 = 0x09;
    pub const DISCONNECT: u8 = 0x0a;
}

impl Message {
    pub fn tag(&self) -> u8 {
        match self {
            Message::ListServersRequest => tag::LIST_SERVERS_REQUEST,
            Message::ListServersResponse(_) => tag::LIST_SERVERS_RESPONSE,
            Message::JoinGameRequest => tag::JOIN_GAME_REQUEST,
            Message::JoinGameResponse(_) => tag::JOIN_GAME_RESPONSE,
            Message::FullGameState(_) => tag::FULL_GAME_STATE,
            Message::FullGameStateAck { .. } => tag::FULL_GAME_STATE_ACK,
            Message::PlayerInputs(_) => tag::PLAYER_INPUTS,
            Message::Ping => tag::PING,
            Message::Pong => tag::PONG,
            Message::Disconnect => tag::DISCONNECT,
        }
    }
}

/// Encode a message: tag byte, then the CBOR payload (empty for tags that
/// carry none).
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![message.tag()];
    match message {
        Message::ListServersRequest
        | Message::JoinGameRequest
        | Message::Ping
        | Message::Pong
        | Message::Disconnect => {}
        Message::ListServersResponse(p) => write_payload(p, &mut buf)?,
        Message::JoinGameResponse(p) => write_payload(p, &mut buf)?,
        Message::FullGameState(p) => write_payload(p, &mut buf)?,
        Message::FullGameStateAck { sequence } => write_payload(sequence, &mut buf)?,
        Message::PlayerInputs(p) => write_payload(p, &mut buf)?,
    }
    Ok(buf)
}

/// Decode a datagram into a message.
pub fn decode(data: &[u8]) -> Result<Message, ProtocolError> {
    let (&tag, payload) = data.split_first().ok_or(ProtocolError::Empty)?;
    Ok(match tag {
        tag::LIST_SERVERS_REQUEST => Message::ListServersRequest,
        tag::LIST_SERVERS_RESPONSE => Message::ListServersResponse(read_payload(payload)?),
        tag::JOIN_GAME_REQUEST => Message::JoinGameRequest,
        tag::JOIN_GAME_RESPONSE => Message::JoinGameResponse(read_payload(payload)?),
        tag::FULL_GAME_STATE => Message::FullGameState(read_payload(payload)?),
        tag::FULL_GAME_STATE_ACK => Message::FullGameStateAck {
            sequence: read_payload(payload)?,
        },
        tag::PLAYER_INPUTS => Message::PlayerInputs(read_payload(payload)?),
        tag::PING => Message::Ping,
        tag::PONG => Message::Pong,
        tag::DISCONNECT => Message::Disconnect,
        other => return Err(ProtocolError::UnknownTag(other)),
    })
}

fn write_payload<T: Serialize>(value: &T, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
    ciborium::into_writer(value, buf).map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn read_payload<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    ciborium::from_reader(data).map_err(|e| ProtocolError::Decode(e.to_string()))
}

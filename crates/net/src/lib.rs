//! Snapshot serialization and the UDP transport.
//!
//! # Invariants
//! - Snapshot maps are keyed by the stable [`gravwell_common::NetId`],
//!   never by local arena handles.
//! - All inbound traffic is queued by a background reader thread and
//!   drained synchronously from `poll`; nothing touches simulation state
//!   from the reader thread.
//! - Full snapshots are delivered reliable-and-ordered (ack + retransmit);
//!   input updates are best-effort sequenced (newer overwrites older).
//! - Protocol errors drop the offending datagram and keep the connection.

pub mod client;
pub mod server;
pub mod snapshot;
pub mod socket;
pub mod wire;

pub use client::{ClientEvent, NetClient};
pub use server::{NetServer, ServerEvent};
pub use snapshot::Snapshot;
pub use socket::NetSocket;
pub use wire::{Message, NetError, ProtocolError};

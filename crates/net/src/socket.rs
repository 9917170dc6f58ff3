//! UDP socket with a background reader thread.
//!
//! The reader thread does nothing but push raw datagrams into a channel;
//! decoding and all state changes happen on the thread that calls
//! [`NetSocket::drain`], once per simulation step.

use crate::wire::{self, Message, NetError};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Largest datagram we accept. Snapshots for this game are a few KiB;
/// anything larger than this is not ours.
const MAX_DATAGRAM: usize = 64 * 1024;

/// How often the reader thread re-checks the shutdown flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub struct NetSocket {
    socket: UdpSocket,
    incoming: Receiver<(SocketAddr, Vec<u8>)>,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl NetSocket {
    /// Bind a socket and start its reader thread. Broadcast is enabled so
    /// the same socket can serve discovery.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self, NetError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_broadcast(true)?;

        let reader_socket = socket.try_clone()?;
        reader_socket.set_read_timeout(Some(READ_TIMEOUT))?;
        let (tx, rx) = channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let reader = std::thread::spawn({
            let shutdown = Arc::clone(&shutdown);
            move || read_loop(reader_socket, tx, shutdown)
        });

        Ok(Self {
            socket,
            incoming: rx,
            shutdown,
            reader: Some(reader),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn send_to(&self, message: &Message, addr: SocketAddr) -> Result<(), NetError> {
        let bytes = wire::encode(message)?;
        self.send_bytes(&bytes, addr)
    }

    /// Send a pre-encoded datagram (retransmit path).
    pub fn send_bytes(&self, bytes: &[u8], addr: SocketAddr) -> Result<(), NetError> {
        self.socket.send_to(bytes, addr)?;
        Ok(())
    }

    /// Everything received since the last drain, decoded. Datagrams that
    /// fail to decode are logged and dropped; the rest of the queue is
    /// unaffected.
    pub fn drain(&self) -> Vec<(SocketAddr, Message)> {
        let mut out = Vec::new();
        while let Ok((addr, bytes)) = self.incoming.try_recv() {
            match wire::decode(&bytes) {
                Ok(message) => out.push((addr, message)),
                Err(e) => {
                    tracing::warn!(%addr, error = %e, "dropping undecodable datagram");
                }
            }
        }
        out
    }
}

impl Drop for NetSocket {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

fn read_loop(socket: UdpSocket, tx: Sender<(SocketAddr, Vec<u8>)>, shutdown: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_DATAGRAM];
    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((len, addr)) => {
                if tx.send((addr, buf[..len].to_vec())).is_err() {
                    break;
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                tracing::debug!(error = %e, "socket read error");
            }
        }
    }
}

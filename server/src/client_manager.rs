//! Connection registry for the arena server
//!
//! This module tracks every open WebSocket connection, independent of whether
//! it has joined the game yet:
//! - Connection id assignment (ids double as player ids once joined)
//! - The outbound queue feeding each connection's writer task
//! - Connection capacity, separate from the in-game player limit
//! - Resolving broadcast targets to concrete recipients
//!
//! Delivery is fire-and-forget. A full or closed queue never blocks the
//! server loop; the reader side of that connection reports the disconnect.

use crate::session::Target;
use log::{debug, info};
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Connection ids share the player id space.
pub type ClientId = PlayerId;

/// An open connection and the queue its writer task drains.
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ClientId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// When the connection registered, for the session length in the
    /// disconnect log
    pub connected_at: Instant,
    sender: mpsc::UnboundedSender<String>,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues an encoded frame. Returns false if the writer has gone away.
    pub fn send(&self, frame: String) -> bool {
        self.sender.send(frame).is_ok()
    }
}

/// Manages all open connections.
///
/// Ids start at 1 and are never reused for the lifetime of the process.
pub struct ClientManager {
    /// Open connections indexed by id
    clients: HashMap<ClientId, Client>,
    /// Next id handed to a new connection
    next_client_id: ClientId,
    /// Maximum number of concurrent connections
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry accepting at most `max_clients` open
    /// connections at once.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection and assigns it the next id.
    ///
    /// The id also becomes the player id if the connection joins the game.
    /// Returns `None` when the connection cap is reached; the caller is
    /// expected to close the socket.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<String>,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Forgets a connection and drops its outbound queue, which ends the
    /// writer task. Returns true if the client was found and removed.
    pub fn remove_client(&mut self, client_id: &ClientId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} ({}) disconnected after {:.1}s",
                client.id,
                client.addr,
                client.connected_at.elapsed().as_secs_f32()
            );
            true
        } else {
            false
        }
    }

    /// Connection ids an event for `target` should reach, in ascending order.
    pub fn recipients(&self, target: Target) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self
            .clients
            .keys()
            .copied()
            .filter(|id| target.includes(*id))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Queues `frame` for every connection in `target`. Returns how many
    /// queues accepted it.
    ///
    /// Closed queues are skipped. The connection's reader notices the closed
    /// socket and reports the disconnect, so nothing is removed here.
    pub fn deliver(&self, target: Target, frame: &str) -> usize {
        let mut delivered = 0;
        for id in self.recipients(target) {
            if let Some(client) = self.clients.get(&id) {
                if client.send(frame.to_string()) {
                    delivered += 1;
                } else {
                    debug!("Dropping frame for closed client {}", id);
                }
            }
        }
        delivered
    }

    /// Number of open connections, joined or not.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

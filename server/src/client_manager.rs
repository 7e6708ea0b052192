//! Connection bookkeeping for the game server
//!
//! This module tracks every open WebSocket connection, including:
//! - Client ID assignment and capacity limits
//! - The outbound channel each connection's writer task drains
//! - Which room, if any, a connection currently belongs to
//!
//! Outbound delivery never blocks the simulation: events are pushed onto an
//! unbounded channel and a closed channel simply means the client is on its
//! way out.

use log::{debug, info};
use shared::{ClientId, ServerEvent};
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::mpsc;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// A connected client and the room they are in
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: ClientId,
    /// Queue drained by the connection's writer task
    pub sender: EventSender,
    /// Code of the room the client has joined, if any
    pub room_code: Option<String>,
    /// When the connection was accepted
    pub connected_at: Instant,
}

impl Client {
    pub fn new(id: ClientId, sender: EventSender) -> Self {
        Self {
            id,
            sender,
            room_code: None,
            connected_at: Instant::now(),
        }
    }

    /// Queues an event for delivery. Returns false if the connection has
    /// already closed.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Manages all connected clients
///
/// Enforces the connection limit and hands out monotonically increasing IDs,
/// starting from 1, that are never reused while the server runs.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ClientId, Client>,
    /// Next available client ID for new connections
    next_client_id: ClientId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection
    ///
    /// Returns Some(client_id) if successful, None if the server is at
    /// capacity.
    pub fn add_client(&mut self, sender: EventSender) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        self.clients.insert(client_id, Client::new(client_id, sender));
        info!("Client {} connected ({} online)", client_id, self.clients.len());

        Some(client_id)
    }

    /// Forgets a connection and returns it, room membership included, so the
    /// caller can clean up the room.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!(
            "Client {} disconnected after {:.1}s ({} online)",
            client.id,
            client.connected_at.elapsed().as_secs_f32(),
            self.clients.len()
        );
        Some(client)
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn room_of(&self, client_id: ClientId) -> Option<&str> {
        self.clients
            .get(&client_id)
            .and_then(|client| client.room_code.as_deref())
    }

    /// Records room membership. Returns false for unknown clients.
    pub fn set_room(&mut self, client_id: ClientId, room_code: Option<String>) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.room_code = room_code;
                true
            }
            None => false,
        }
    }

    /// Clears and returns the client's room membership.
    pub fn take_room(&mut self, client_id: ClientId) -> Option<String> {
        self.clients
            .get_mut(&client_id)
            .and_then(|client| client.room_code.take())
    }

    /// Sends an event to one client
    ///
    /// Returns false if the client is unknown or its connection has closed.
    pub fn send(&self, client_id: ClientId, event: ServerEvent) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => {
                let delivered = client.send(event);
                if !delivered {
                    debug!("Dropped event for closing client {}", client_id);
                }
                delivered
            }
            None => false,
        }
    }

    /// Sends the same event to every connected client
    pub fn broadcast(&self, event: &ServerEvent) {
        for client in self.clients.values() {
            client.send(event.clone());
        }
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sender() -> (EventSender, mpsc::UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new(5);
        assert_eq!(manager.max_clients, 5);
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = ClientManager::new(3);
        let (tx1, _rx1) = test_sender();
        let (tx2, _rx2) = test_sender();

        assert_eq!(manager.add_client(tx1), Some(1));
        assert_eq!(manager.add_client(tx2), Some(2));
        assert_eq!(manager.len(), 2);
        assert!(manager.contains(2));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = test_sender();
        let (tx2, _rx2) = test_sender();

        assert!(manager.add_client(tx1).is_some());
        assert!(manager.add_client(tx2).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut manager = ClientManager::new(1);
        let (tx1, _rx1) = test_sender();
        let (tx2, _rx2) = test_sender();

        let first = manager.add_client(tx1).unwrap();
        assert!(manager.remove_client(first).is_some());
        assert_eq!(manager.add_client(tx2), Some(first + 1));
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new(2);
        assert!(manager.remove_client(999).is_none());
    }

    #[test]
    fn test_room_membership() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = test_sender();
        let id = manager.add_client(tx).unwrap();

        assert_eq!(manager.room_of(id), None);
        assert!(manager.set_room(id, Some("ABCD".to_string())));
        assert_eq!(manager.room_of(id), Some("ABCD"));

        assert_eq!(manager.take_room(id), Some("ABCD".to_string()));
        assert_eq!(manager.room_of(id), None);
        assert!(!manager.set_room(42, Some("ABCD".to_string())));

        manager.set_room(id, Some("WXYZ".to_string()));
        let removed = manager.remove_client(id).unwrap();
        assert_eq!(removed.room_code.as_deref(), Some("WXYZ"));
    }

    #[test]
    fn test_send_and_broadcast() {
        let mut manager = ClientManager::new(3);
        let (tx1, mut rx1) = test_sender();
        let (tx2, mut rx2) = test_sender();
        let a = manager.add_client(tx1).unwrap();
        manager.add_client(tx2).unwrap();

        assert!(manager.send(a, ServerEvent::Error("hi".to_string())));
        assert_eq!(rx1.try_recv().unwrap(), ServerEvent::Error("hi".to_string()));
        assert!(rx2.try_recv().is_err());

        manager.broadcast(&ServerEvent::Error("all".to_string()));
        assert_eq!(rx1.try_recv().unwrap(), ServerEvent::Error("all".to_string()));
        assert_eq!(rx2.try_recv().unwrap(), ServerEvent::Error("all".to_string()));

        assert!(!manager.send(99, ServerEvent::Error("nobody".to_string())));
    }

    #[test]
    fn test_send_to_closed_connection() {
        let mut manager = ClientManager::new(1);
        let (tx, rx) = test_sender();
        let id = manager.add_client(tx).unwrap();
        drop(rx);

        assert!(!manager.send(id, ServerEvent::Error("gone".to_string())));
    }
}

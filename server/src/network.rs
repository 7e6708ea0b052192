//! Server network layer handling WebSocket connections and game loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::leaderboard::Leaderboard;
use crate::registry::RoomRegistry;
use crate::session::GameSession;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ClientId, ServerEvent};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<ServerEvent>,
        reply: oneshot::Sender<Option<ClientId>>,
    },
    Event {
        client_id: ClientId,
        event: ClientEvent,
    },
    Disconnected {
        client_id: ClientId,
    },
    Shutdown,
}

/// Main server coordinating connections and game simulation
pub struct Server {
    listener: TcpListener,
    session: GameSession,
    tick_duration: Duration,
    tick_dt: f32,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let leaderboard = match &config.leaderboard_path {
            Some(path) => Leaderboard::load(path),
            None => Leaderboard::in_memory(),
        };
        let session = GameSession::new(
            RoomRegistry::new(),
            ClientManager::new(config.max_connections),
            leaderboard,
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            session,
            tick_duration: config.tick_duration(),
            tick_dt: config.tick_dt_ms(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Channel into the main loop; sending `Shutdown` stops `run`.
    pub fn handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tokio::spawn(handle_connection(stream, addr, self.server_tx.clone()));
                        }
                        Err(e) => error!("Failed to accept connection: {}", e),
                    }
                },

                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Connected { addr, sender, reply }) => {
                            let client_id = self.session.connect(sender);
                            if client_id.is_none() {
                                warn!("Rejected connection from {}: server full", addr);
                            }
                            let _ = reply.send(client_id);
                        },
                        Some(ServerMessage::Event { client_id, event }) => {
                            self.session.handle_event(client_id, event, Instant::now());
                        },
                        Some(ServerMessage::Disconnected { client_id }) => {
                            self.session.disconnect(client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.session.tick(self.tick_dt, Instant::now());
                    tick += 1;

                    if tick % 300 == 0 {
                        let stats = self.session.stats();
                        debug!("Tick {}: {} clients, {} rooms", tick, stats.online_players, stats.active_rooms);
                    }
                },
            }
        }

        Ok(())
    }
}

/// Upgrades one TCP stream and pumps frames between it and the main loop
/// until either side closes.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (reply_tx, reply_rx) = oneshot::channel();
    if server_tx
        .send(ServerMessage::Connected {
            addr,
            sender: event_tx,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }

    let client_id = match reply_rx.await {
        Ok(Some(id)) => id,
        _ => {
            if let Ok(text) = serde_json::to_string(&ServerEvent::Error("Server full".to_string())) {
                let _ = write.send(Message::Text(text)).await;
            }
            let _ = write.close().await;
            return;
        }
    };
    info!("Client {} connected from {}", client_id, addr);

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode event for client {}: {}", client_id, e);
                    continue;
                }
            };
            if write.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let inbound_tx = server_tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        if inbound_tx
                            .send(ServerMessage::Event { client_id, event })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => warn!("Malformed frame from client {}: {}", client_id, e),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Connection error for client {}: {}", client_id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = server_tx.send(ServerMessage::Disconnected { client_id });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            leaderboard_path: None,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = Server::new(&test_config()).await.unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.tick_dt, 1000.0 / 30.0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let mut server = Server::new(&test_config()).await.unwrap();
        let handle = server.handle();
        handle.send(ServerMessage::Shutdown).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), server.run()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }

    #[test]
    fn test_event_message_creation() {
        let msg = ServerMessage::Event {
            client_id: 7,
            event: ClientEvent::PlaceBomb,
        };

        match msg {
            ServerMessage::Event { client_id, event } => {
                assert_eq!(client_id, 7);
                assert_eq!(event, ClientEvent::PlaceBomb);
            }
            _ => panic!("Unexpected message type"),
        }
    }
}

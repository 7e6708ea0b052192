//! Event dispatch and fan-out between connections and rooms.
//!
//! `GameSession` is the single owner of all mutable server state. The network
//! loop feeds it connection events, client commands and ticks one at a time,
//! so no room ever sees two mutations concurrently.

use crate::client_manager::{ClientManager, EventSender};
use crate::error::JoinError;
use crate::leaderboard::Leaderboard;
use crate::registry::{normalize_code, RoomRegistry};
use crate::room::{Room, RoomSettings};
use log::{debug, error, info, warn};
use shared::{
    ClientEvent, ClientId, RoomSettingsRequest, RoomStatus, ServerEvent, ServerStats,
    LEADERBOARD_SIZE,
};
use std::time::Instant;

pub const KICKED_MESSAGE: &str = "You have been kicked from the room.";

pub struct GameSession {
    rooms: RoomRegistry,
    clients: ClientManager,
    leaderboard: Leaderboard,
}

impl GameSession {
    pub fn new(rooms: RoomRegistry, clients: ClientManager, leaderboard: Leaderboard) -> Self {
        Self {
            rooms,
            clients,
            leaderboard,
        }
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn clients(&self) -> &ClientManager {
        &self.clients
    }

    pub fn leaderboard(&self) -> &Leaderboard {
        &self.leaderboard
    }

    /// Registers a connection and announces the new head count. `None` when
    /// the server is full.
    pub fn connect(&mut self, sender: EventSender) -> Option<ClientId> {
        let id = self.clients.add_client(sender)?;
        self.publish_stats();
        Some(id)
    }

    pub fn disconnect(&mut self, id: ClientId) {
        let Some(client) = self.clients.remove_client(id) else {
            return;
        };
        if let Some(code) = client.room_code {
            self.remove_from_room(id, &code);
        }
        self.publish_stats();
    }

    pub fn handle_event(&mut self, id: ClientId, event: ClientEvent, now: Instant) {
        if !self.clients.contains(id) {
            warn!("Event from unknown client {}: {:?}", id, event);
            return;
        }

        match event {
            ClientEvent::CreateRoom {
                player_name,
                avatar,
                settings,
            } => self.create_room(id, player_name, avatar, &settings.unwrap_or_default()),
            ClientEvent::JoinRoom {
                room_code,
                player_name,
                avatar,
            } => self.join_room(id, &room_code, player_name, avatar),
            ClientEvent::StartGame => {
                if let Some(code) = self.apply(id, |room| room.start_game(id, now)) {
                    self.broadcast_room(&code);
                }
            }
            ClientEvent::Move(direction) => {
                self.apply(id, |room| room.move_player(id, direction));
            }
            ClientEvent::PlaceBomb => {
                self.apply(id, |room| room.place_bomb(id));
            }
            ClientEvent::ToggleReady => {
                if let Some(code) = self.apply(id, |room| room.toggle_ready(id)) {
                    self.broadcast_room(&code);
                }
            }
            ClientEvent::KickPlayer(target) => self.kick_player(id, target),
            ClientEvent::RestartMatch => {
                if let Some(code) = self.apply(id, |room| room.restart_match(id)) {
                    self.broadcast_room(&code);
                    self.publish_stats();
                }
            }
            ClientEvent::NextRound => {
                if let Some(code) = self.apply(id, |room| room.next_round(id)) {
                    self.broadcast_room(&code);
                }
            }
            ClientEvent::LeaveRoom => self.leave_current_room(id),
        }
    }

    /// Advances every room that is mid-round and pushes the new state out.
    pub fn tick(&mut self, dt: f32, now: Instant) {
        for code in self.rooms.playing_codes() {
            let Some(room) = self.rooms.get_mut(&code) else {
                continue;
            };
            room.update(dt, now);
            let ended = room.status() == RoomStatus::Ended;

            self.broadcast_room(&code);
            if ended {
                self.record_match(&code);
            }
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            online_players: self.clients.len(),
            active_rooms: self.rooms.len(),
            leaderboard: self.leaderboard.top(LEADERBOARD_SIZE),
        }
    }

    fn create_room(
        &mut self,
        id: ClientId,
        player_name: Option<String>,
        avatar: Option<String>,
        request: &RoomSettingsRequest,
    ) {
        self.leave_current_room(id);

        let code = self.rooms.create_room(RoomSettings::from_request(request));
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        if let Err(e) = room.add_player(id, player_name, avatar) {
            warn!("Client {} could not enter new room {}: {}", id, code, e);
            self.rooms.remove_if_empty(&code);
            self.clients.send(id, ServerEvent::Error(e.to_string()));
            return;
        }

        let snapshot = room.snapshot();
        self.clients.set_room(id, Some(code));
        self.clients.send(id, ServerEvent::Init(snapshot));
        self.publish_stats();
    }

    fn join_room(
        &mut self,
        id: ClientId,
        room_code: &str,
        player_name: Option<String>,
        avatar: Option<String>,
    ) {
        let code = normalize_code(room_code);

        if self.clients.room_of(id) == Some(code.as_str()) {
            if let Some(room) = self.rooms.get(&code) {
                self.clients.send(id, ServerEvent::Init(room.snapshot()));
            }
            return;
        }

        let joined = match self.rooms.get_mut(&code) {
            Some(room) => room.add_player(id, player_name, avatar),
            None => Err(JoinError::RoomNotFound),
        };
        if let Err(e) = joined {
            warn!("Client {} failed to join room {}: {}", id, code, e);
            self.clients.send(id, ServerEvent::Error(e.to_string()));
            return;
        }

        self.leave_current_room(id);
        self.clients.set_room(id, Some(code.clone()));
        if let Some(room) = self.rooms.get(&code) {
            self.clients.send(id, ServerEvent::Init(room.snapshot()));
        }
        self.broadcast_room(&code);
    }

    fn kick_player(&mut self, id: ClientId, target: ClientId) {
        let Some(code) = self.clients.room_of(id).map(str::to_string) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };

        let was_ended = room.status() == RoomStatus::Ended;
        let Some(kicked) = room.kick_player(id, target) else {
            debug!("Ignored kick of {} by {} in room {}", target, id, code);
            return;
        };
        let now_ended = room.status() == RoomStatus::Ended;

        info!("Room {}: {} ({}) was kicked", code, kicked.name, target);
        self.clients.send(target, ServerEvent::Error(KICKED_MESSAGE.to_string()));
        self.clients.set_room(target, None);
        self.broadcast_room(&code);
        if !was_ended && now_ended {
            self.record_match(&code);
        }
    }

    fn leave_current_room(&mut self, id: ClientId) {
        if let Some(code) = self.clients.take_room(id) {
            self.remove_from_room(id, &code);
        }
    }

    /// Takes a player out of a room, closing the room if that emptied it.
    fn remove_from_room(&mut self, id: ClientId, code: &str) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };

        let was_ended = room.status() == RoomStatus::Ended;
        room.remove_player(id);
        let now_ended = room.status() == RoomStatus::Ended;

        if self.rooms.remove_if_empty(code) {
            self.publish_stats();
            return;
        }

        self.broadcast_room(code);
        if !was_ended && now_ended {
            self.record_match(code);
        }
    }

    /// Runs `f` against the sender's room and returns the room code when it
    /// reports a change.
    fn apply<F>(&mut self, id: ClientId, f: F) -> Option<String>
    where
        F: FnOnce(&mut Room) -> bool,
    {
        let code = self.clients.room_of(id)?.to_string();
        let room = self.rooms.get_mut(&code)?;
        f(room).then_some(code)
    }

    fn broadcast_room(&self, code: &str) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let event = ServerEvent::StateUpdate(room.snapshot());
        for player in room.players() {
            self.clients.send(player.id, event.clone());
        }
    }

    /// Credits a finished match, persists the board and republishes stats.
    fn record_match(&mut self, code: &str) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };

        let winner = room
            .match_winner()
            .and_then(|id| room.player(id))
            .map(|p| p.name.as_str());
        self.leaderboard.record_match(
            winner,
            room.players().iter().map(|p| (p.name.as_str(), p.kills)),
        );
        info!("Room {}: match recorded, winner {:?}", code, winner);

        if let Err(e) = self.leaderboard.save() {
            error!("Failed to save leaderboard: {}", e);
        }
        self.publish_stats();
    }

    fn publish_stats(&self) {
        self.clients.broadcast(&ServerEvent::ServerStats(self.stats()));
    }
}

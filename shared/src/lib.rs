use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ClientId = u32;

pub const GRID_WIDTH: usize = 15;
pub const GRID_HEIGHT: usize = 13;
pub const TICK_RATE: u32 = 30;
pub const MOVE_STEP: f32 = 0.15;
pub const BOMB_FUSE_MS: f32 = 3000.0;
/// A bomb turns solid for its owner once its fuse drops below this.
pub const BOMB_ARMED_BELOW_MS: f32 = 2500.0;
pub const EXPLOSION_LIFETIME_MS: f32 = 500.0;
pub const EXPLOSION_FADE_MS: f32 = 100.0;
pub const DEFAULT_MAX_BOMBS: u32 = 1;
pub const DEFAULT_BOMB_RANGE: u32 = 2;
pub const DEFAULT_MAX_PLAYERS: usize = 4;
pub const MAX_PLAYERS_LIMIT: usize = 8;
pub const DEFAULT_SUDDEN_DEATH_DELAY_MS: u64 = 120_000;
pub const SUDDEN_DEATH_INTERVAL_MS: u64 = 500;
pub const SOFT_BLOCK_DENSITY: f64 = 0.7;
pub const LEADERBOARD_SIZE: usize = 10;

/// Rounds a continuous grid coordinate to its cell, halves rounding up.
pub fn cell_of(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cell {
    Empty = 0,
    Wall = 1,
    SoftBlock = 2,
}

impl Cell {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn delta(self) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -1.0),
            Direction::Down => (0.0, 1.0),
            Direction::Left => (-1.0, 0.0),
            Direction::Right => (1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    Lobby,
    Playing,
    RoundEnd,
    Ended,
}

/// Commands whose validity depends on the room status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Join,
    Start,
    ToggleReady,
    Move,
    PlaceBomb,
    Tick,
    NextRound,
    Restart,
}

impl RoomStatus {
    /// Transition table: which actions a room accepts in each status.
    pub fn permits(self, action: Action) -> bool {
        matches!(
            (self, action),
            (RoomStatus::Lobby, Action::Join | Action::Start | Action::ToggleReady)
                | (
                    RoomStatus::Playing,
                    Action::Move | Action::PlaceBomb | Action::Tick
                )
                | (RoomStatus::RoundEnd, Action::NextRound)
                | (RoomStatus::Ended, Action::Restart)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: ClientId,
    pub name: String,
    pub avatar: Option<String>,
    pub x: f32,
    pub y: f32,
    pub color: String,
    pub alive: bool,
    pub ready: bool,
    pub max_bombs: u32,
    pub active_bombs: u32,
    pub bomb_range: u32,
    pub kills: u32,
    pub is_host: bool,
}

impl Player {
    pub fn new(
        id: ClientId,
        name: String,
        avatar: Option<String>,
        spawn: (i32, i32),
        color: &str,
    ) -> Self {
        Self {
            id,
            name,
            avatar,
            x: spawn.0 as f32,
            y: spawn.1 as f32,
            color: color.to_string(),
            alive: true,
            ready: false,
            max_bombs: DEFAULT_MAX_BOMBS,
            active_bombs: 0,
            bomb_range: DEFAULT_BOMB_RANGE,
            kills: 0,
            is_host: false,
        }
    }

    pub fn cell(&self) -> (i32, i32) {
        (cell_of(self.x), cell_of(self.y))
    }

    pub fn occupies(&self, x: i32, y: i32) -> bool {
        self.cell() == (x, y)
    }

    pub fn can_place_bomb(&self) -> bool {
        self.alive && self.active_bombs < self.max_bombs
    }

    pub fn respawn(&mut self, spawn: (i32, i32)) {
        self.x = spawn.0 as f32;
        self.y = spawn.1 as f32;
        self.alive = true;
        self.ready = false;
        self.active_bombs = 0;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bomb {
    pub x: i32,
    pub y: i32,
    /// `None` once the player who placed it has left the room.
    pub owner_id: Option<ClientId>,
    pub timer: f32,
    pub range: u32,
}

impl Bomb {
    pub fn new(x: i32, y: i32, owner_id: ClientId, range: u32) -> Self {
        Self {
            x,
            y,
            owner_id: Some(owner_id),
            timer: BOMB_FUSE_MS,
            range,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer < BOMB_ARMED_BELOW_MS
    }

    /// Burns `dt` milliseconds of fuse and reports whether it went off.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.timer -= dt;
        self.timer <= 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Explosion {
    pub x: i32,
    pub y: i32,
    pub timer: f32,
    pub owner_id: Option<ClientId>,
}

impl Explosion {
    pub fn new(x: i32, y: i32, owner_id: Option<ClientId>) -> Self {
        Self {
            x,
            y,
            timer: EXPLOSION_LIFETIME_MS,
            owner_id,
        }
    }

    /// Ages the blast cell and reports whether it has faded out.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.timer -= dt;
        self.timer <= EXPLOSION_FADE_MS
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Rewards {
    pub first: Option<String>,
    pub second: Option<String>,
    pub third: Option<String>,
}

impl Rewards {
    pub fn is_empty(&self) -> bool {
        [&self.first, &self.second, &self.third]
            .iter()
            .all(|reward| reward.as_deref().map_or(true, |r| r.trim().is_empty()))
    }
}

/// Room options a client may ask for; the server clamps every field.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettingsRequest {
    pub max_players: Option<usize>,
    pub match_format: Option<u32>,
    pub sudden_death_timer: Option<u64>,
    pub require_ready: Option<bool>,
    pub rewards: Option<Rewards>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub grid: Vec<Vec<u8>>,
    pub players: Vec<Player>,
    pub bombs: Vec<Bomb>,
    pub explosions: Vec<Explosion>,
    pub game_state: RoomStatus,
    pub host_id: Option<ClientId>,
    pub winner: Option<ClientId>,
    pub room_code: String,
    pub max_players: usize,
    pub match_format: u32,
    pub current_round: u32,
    pub round_wins: BTreeMap<ClientId, u32>,
    pub match_winner: Option<ClientId>,
    pub rewards: Option<Rewards>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub wins: u32,
    pub kills: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub online_players: usize,
    pub active_rooms: usize,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        #[serde(default)]
        player_name: Option<String>,
        #[serde(default)]
        avatar: Option<String>,
        #[serde(default)]
        settings: Option<RoomSettingsRequest>,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        #[serde(default)]
        player_name: Option<String>,
        #[serde(default)]
        avatar: Option<String>,
    },
    StartGame,
    Move(Direction),
    PlaceBomb,
    ToggleReady,
    KickPlayer(ClientId),
    RestartMatch,
    NextRound,
    LeaveRoom,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Init(RoomSnapshot),
    StateUpdate(RoomSnapshot),
    Error(String),
    ServerStats(ServerStats),
}

//! Authoritative simulation of a single room.
//!
//! A `Room` owns everything about one match: the tile map, the players in
//! join order, live bombs and blast cells, and the lobby/round state
//! machine. Every command handler consults [`RoomStatus::permits`] before
//! touching state, and every rejection is a silent no-op reported through
//! the return value. Nothing in here performs I/O.

use crate::error::JoinError;
use crate::grid::{spiral_cell, Grid};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{
    Action, Bomb, Cell, ClientId, Direction, Explosion, Player, RoomSettingsRequest,
    RoomSnapshot, RoomStatus, Rewards, DEFAULT_MAX_PLAYERS, DEFAULT_SUDDEN_DEATH_DELAY_MS,
    GRID_HEIGHT, GRID_WIDTH, MAX_PLAYERS_LIMIT, MOVE_STEP, SOFT_BLOCK_DENSITY,
    SUDDEN_DEATH_INTERVAL_MS,
};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Spawn cells. A joiner takes the first free one; resets hand them out by
/// join order.
pub const SPAWN_POINTS: [(i32, i32); 8] = [
    (1, 1),
    (13, 11),
    (1, 11),
    (13, 1),
    (7, 1),
    (7, 11),
    (1, 6),
    (13, 6),
];

pub const PLAYER_COLORS: [&str; 8] = [
    "#a855f7", "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#ec4899", "#06b6d4", "#84cc16",
];

const MATCH_FORMATS: [u32; 4] = [1, 3, 5, 7];

const CARDINALS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, PartialEq)]
pub struct RoomSettings {
    pub max_players: usize,
    /// Best-of-N; one round when 1.
    pub match_format: u32,
    pub sudden_death_delay: Duration,
    pub soft_block_density: f64,
    /// Non-host players must all be ready before the host can start.
    pub require_ready: bool,
    pub rewards: Option<Rewards>,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            match_format: 1,
            sudden_death_delay: Duration::from_millis(DEFAULT_SUDDEN_DEATH_DELAY_MS),
            soft_block_density: SOFT_BLOCK_DENSITY,
            require_ready: false,
            rewards: None,
        }
    }
}

impl RoomSettings {
    /// Applies a client's requested options, clamping each to what the
    /// server supports and falling back to defaults for anything missing.
    pub fn from_request(request: &RoomSettingsRequest) -> Self {
        let defaults = Self::default();

        let max_players = request
            .max_players
            .map_or(defaults.max_players, |n| n.clamp(2, MAX_PLAYERS_LIMIT));
        let match_format = request
            .match_format
            .filter(|n| MATCH_FORMATS.contains(n))
            .unwrap_or(defaults.match_format);
        let sudden_death_delay = request
            .sudden_death_timer
            .map_or(defaults.sudden_death_delay, Duration::from_millis);

        Self {
            max_players,
            match_format,
            sudden_death_delay,
            require_ready: request.require_ready.unwrap_or(false),
            rewards: request.rewards.clone().filter(|r| !r.is_empty()),
            ..defaults
        }
    }

    fn wins_needed(&self) -> u32 {
        self.match_format / 2 + 1
    }
}

pub struct Room {
    code: String,
    settings: RoomSettings,
    grid: Grid,
    /// Join order; the first entry is next in line for host.
    players: Vec<Player>,
    bombs: Vec<Bomb>,
    explosions: Vec<Explosion>,
    status: RoomStatus,
    host_id: Option<ClientId>,
    winner: Option<ClientId>,
    match_winner: Option<ClientId>,
    current_round: u32,
    round_wins: BTreeMap<ClientId, u32>,
    /// Players present when the round started.
    round_population: usize,
    match_started_at: Option<Instant>,
    sudden_death_index: usize,
    last_sudden_death_at: Option<Instant>,
    rng: StdRng,
}

impl Room {
    pub fn new(code: String, settings: RoomSettings) -> Self {
        Self::with_rng(code, settings, StdRng::from_entropy())
    }

    pub fn with_rng(code: String, settings: RoomSettings, mut rng: StdRng) -> Self {
        let grid = Grid::generate(GRID_WIDTH, GRID_HEIGHT, settings.soft_block_density, &mut rng);
        debug!(
            "Room {}: map generated with {} soft blocks",
            code,
            grid.count(Cell::SoftBlock)
        );
        Self {
            code,
            settings,
            grid,
            players: Vec::new(),
            bombs: Vec::new(),
            explosions: Vec::new(),
            status: RoomStatus::Lobby,
            host_id: None,
            winner: None,
            match_winner: None,
            current_round: 1,
            round_wins: BTreeMap::new(),
            round_population: 0,
            match_started_at: None,
            sudden_death_index: 0,
            last_sudden_death_at: None,
            rng,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: ClientId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: ClientId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn bombs(&self) -> &[Bomb] {
        &self.bombs
    }

    pub fn explosions(&self) -> &[Explosion] {
        &self.explosions
    }

    pub fn host_id(&self) -> Option<ClientId> {
        self.host_id
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn match_winner(&self) -> Option<ClientId> {
        self.match_winner
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn round_wins(&self, id: ClientId) -> u32 {
        self.round_wins.get(&id).copied().unwrap_or(0)
    }

    pub fn sudden_death_index(&self) -> usize {
        self.sudden_death_index
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn add_player(
        &mut self,
        id: ClientId,
        name: Option<String>,
        avatar: Option<String>,
    ) -> Result<Player, JoinError> {
        if !self.status.permits(Action::Join)
            || self.players.len() >= self.settings.max_players
            || self.player(id).is_some()
        {
            return Err(JoinError::NotJoinable);
        }

        let slot = self.free_spawn_slot();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Player {}", slot + 1));
        let spawn = SPAWN_POINTS[slot];
        let color = PLAYER_COLORS
            .iter()
            .copied()
            .find(|c| self.players.iter().all(|p| p.color != *c))
            .unwrap_or(PLAYER_COLORS[slot % PLAYER_COLORS.len()]);

        let mut player = Player::new(id, name, avatar, spawn, color);
        if self.players.is_empty() {
            player.is_host = true;
            self.host_id = Some(id);
        }

        info!(
            "Room {}: {} ({}) joined at {:?}",
            self.code, player.name, id, spawn
        );
        self.players.push(player.clone());
        Ok(player)
    }

    /// First spawn point nobody is standing on.
    fn free_spawn_slot(&self) -> usize {
        (0..SPAWN_POINTS.len())
            .find(|&i| {
                let (x, y) = SPAWN_POINTS[i];
                !self.players.iter().any(|p| p.occupies(x, y))
            })
            .unwrap_or(self.players.len() % SPAWN_POINTS.len())
    }

    /// Removes a player, hands host to the earliest remaining joiner and
    /// disowns any bombs still on the map so they explode without credit.
    pub fn remove_player(&mut self, id: ClientId) -> Option<Player> {
        let position = self.players.iter().position(|p| p.id == id)?;
        let removed = self.players.remove(position);

        for bomb in self.bombs.iter_mut().filter(|b| b.owner_id == Some(id)) {
            bomb.owner_id = None;
        }
        for explosion in self.explosions.iter_mut().filter(|e| e.owner_id == Some(id)) {
            explosion.owner_id = None;
        }
        self.round_wins.remove(&id);

        if self.host_id == Some(id) {
            self.host_id = self.players.first().map(|p| p.id);
            if let Some(next) = self.players.first_mut() {
                next.is_host = true;
                info!("Room {}: host passed to {}", self.code, next.id);
            }
        }

        info!("Room {}: {} ({}) left", self.code, removed.name, id);

        if self.status == RoomStatus::Playing {
            self.check_win_condition();
        }
        Some(removed)
    }

    /// Host-only removal of another player.
    pub fn kick_player(&mut self, requester: ClientId, target: ClientId) -> Option<Player> {
        if self.host_id != Some(requester) || requester == target {
            return None;
        }
        self.remove_player(target)
    }

    pub fn start_game(&mut self, requester: ClientId, now: Instant) -> bool {
        if !self.status.permits(Action::Start) || self.host_id != Some(requester) {
            return false;
        }
        if self.settings.require_ready && !self.players.iter().all(|p| p.is_host || p.ready) {
            return false;
        }

        self.status = RoomStatus::Playing;
        self.match_started_at = Some(now);
        self.last_sudden_death_at = None;
        self.round_population = self.players.len();
        info!(
            "Room {}: round {} started with {} players",
            self.code, self.current_round, self.round_population
        );
        true
    }

    pub fn toggle_ready(&mut self, id: ClientId) -> bool {
        if !self.status.permits(Action::ToggleReady) {
            return false;
        }
        match self.player_mut(id) {
            Some(player) => {
                player.ready = !player.ready;
                true
            }
            None => false,
        }
    }

    /// Attempts one fixed step. Returns whether the player actually moved.
    pub fn move_player(&mut self, id: ClientId, direction: Direction) -> bool {
        if !self.status.permits(Action::Move) {
            return false;
        }
        let Some(player) = self.player(id).filter(|p| p.alive) else {
            return false;
        };

        let (dx, dy) = direction.delta();
        let new_x = player.x + dx * MOVE_STEP;
        let new_y = player.y + dy * MOVE_STEP;

        if self.is_blocked_for(new_x, new_y, id) {
            return false;
        }

        if let Some(player) = self.player_mut(id) {
            player.x = new_x;
            player.y = new_y;
        }
        true
    }

    /// Collision test for a continuous position. A player may stand on its
    /// own bomb until it arms; any other bomb is solid.
    fn is_blocked_for(&self, x: f32, y: f32, mover: ClientId) -> bool {
        let (cx, cy) = (shared::cell_of(x), shared::cell_of(y));
        if self.grid.is_blocked(cx, cy) {
            return true;
        }
        self.bombs
            .iter()
            .find(|b| b.x == cx && b.y == cy)
            .map_or(false, |bomb| bomb.owner_id != Some(mover) || bomb.is_armed())
    }

    pub fn place_bomb(&mut self, id: ClientId) -> bool {
        if !self.status.permits(Action::PlaceBomb) {
            return false;
        }
        let Some(player) = self.player(id).filter(|p| p.can_place_bomb()) else {
            return false;
        };

        let (x, y) = player.cell();
        let range = player.bomb_range;
        if self.bombs.iter().any(|b| b.x == x && b.y == y) {
            return false;
        }

        self.bombs.push(Bomb::new(x, y, id, range));
        if let Some(player) = self.player_mut(id) {
            player.active_bombs += 1;
        }
        true
    }

    /// Advances the round by `dt` milliseconds of fuse/blast time. `now`
    /// drives the sudden-death clock.
    pub fn update(&mut self, dt: f32, now: Instant) {
        if !self.status.permits(Action::Tick) {
            return;
        }

        let mut due = Vec::new();
        self.bombs.retain_mut(|bomb| {
            if bomb.tick(dt) {
                due.push(bomb.clone());
                false
            } else {
                true
            }
        });

        // Every expired fuse fires before the round is judged.
        let exploded = !due.is_empty();
        for bomb in due {
            if let Some(owner) = bomb.owner_id.and_then(|id| self.player_mut(id)) {
                owner.active_bombs = owner.active_bombs.saturating_sub(1);
            }
            self.detonate(&bomb);
        }
        if exploded {
            self.check_win_condition();
        }

        self.explosions.retain_mut(|explosion| !explosion.tick(dt));

        if self.status == RoomStatus::Playing {
            self.apply_explosion_hazards();
        }

        let elapsed = self
            .match_started_at
            .map(|start| now.saturating_duration_since(start));
        if self.status == RoomStatus::Playing
            && elapsed.map_or(false, |e| e > self.settings.sudden_death_delay)
        {
            self.apply_sudden_death(now);
        }
    }

    fn detonate(&mut self, bomb: &Bomb) {
        debug!(
            "Room {}: bomb at ({}, {}) detonated, range {}",
            self.code, bomb.x, bomb.y, bomb.range
        );
        self.ignite(bomb.x, bomb.y, bomb.owner_id);

        for (dx, dy) in CARDINALS {
            for step in 1..=bomb.range as i32 {
                let (x, y) = (bomb.x + dx * step, bomb.y + dy * step);
                if self.grid.is_wall(x, y) {
                    break;
                }
                self.ignite(x, y, bomb.owner_id);
                if self.grid.is_soft_block(x, y) {
                    self.grid.set(x, y, Cell::Empty);
                    break;
                }
            }
        }
    }

    fn ignite(&mut self, x: i32, y: i32, owner: Option<ClientId>) {
        self.explosions.push(Explosion::new(x, y, owner));
        self.kill_players_at(x, y, owner);
    }

    /// Blast cells stay lethal until they fade, so walking into one kills.
    fn apply_explosion_hazards(&mut self) {
        let cells: Vec<(i32, i32, Option<ClientId>)> = self
            .explosions
            .iter()
            .map(|e| (e.x, e.y, e.owner_id))
            .collect();
        let before = self.alive_count();

        for (x, y, owner) in cells {
            self.kill_players_at(x, y, owner);
        }

        if self.alive_count() != before {
            self.check_win_condition();
        }
    }

    fn kill_players_at(&mut self, x: i32, y: i32, killer: Option<ClientId>) {
        let victims: Vec<ClientId> = self
            .players
            .iter()
            .filter(|p| p.alive && p.occupies(x, y))
            .map(|p| p.id)
            .collect();

        for victim in victims {
            self.kill_player(victim, killer);
        }
    }

    fn kill_player(&mut self, victim: ClientId, killer: Option<ClientId>) {
        let Some(player) = self.player_mut(victim).filter(|p| p.alive) else {
            return;
        };
        player.alive = false;
        info!("Room {}: player {} eliminated", self.code, victim);

        if let Some(killer) = killer.filter(|k| *k != victim) {
            if let Some(credited) = self.player_mut(killer) {
                credited.kills += 1;
            }
        }
    }

    /// Walls in one more cell of the spiral, at most once per interval.
    fn apply_sudden_death(&mut self, now: Instant) {
        let interval = Duration::from_millis(SUDDEN_DEATH_INTERVAL_MS);
        if let Some(last) = self.last_sudden_death_at {
            if now.saturating_duration_since(last) < interval {
                return;
            }
        }
        self.last_sudden_death_at = Some(now);

        let Some((x, y)) = spiral_cell(self.grid.width(), self.grid.height(), self.sudden_death_index)
        else {
            return;
        };
        let (x, y) = (x as i32, y as i32);
        self.grid.set(x, y, Cell::Wall);
        self.kill_players_at(x, y, None);
        self.sudden_death_index += 1;

        self.check_win_condition();
    }

    /// Ends the round once at most one player is left standing out of a
    /// starting population larger than one.
    fn check_win_condition(&mut self) {
        if self.status != RoomStatus::Playing || self.round_population <= 1 {
            return;
        }

        let mut alive = self.players.iter().filter(|p| p.alive);
        let survivor = alive.next().map(|p| p.id);
        if alive.next().is_some() {
            return;
        }

        self.finish_round(survivor);
    }

    fn finish_round(&mut self, survivor: Option<ClientId>) {
        self.winner = survivor;

        let mut decided = self.settings.match_format <= 1
            || self.current_round >= self.settings.match_format;
        if let Some(id) = survivor {
            let wins = self.round_wins.entry(id).or_insert(0);
            *wins += 1;
            decided |= *wins >= self.settings.wins_needed();
        }

        if decided {
            self.status = RoomStatus::Ended;
            self.match_winner = self.leading_player();
            info!(
                "Room {}: match over after round {}, winner {:?}",
                self.code, self.current_round, self.match_winner
            );
        } else {
            self.status = RoomStatus::RoundEnd;
            info!(
                "Room {}: round {} over, survivor {:?}",
                self.code, self.current_round, survivor
            );
        }
    }

    /// Most round wins, earliest joiner on ties; nobody without a win.
    fn leading_player(&self) -> Option<ClientId> {
        self.players
            .iter()
            .map(|p| (p.id, self.round_wins(p.id)))
            .filter(|(_, wins)| *wins > 0)
            .fold(None, |best: Option<(ClientId, u32)>, (id, wins)| match best {
                Some((_, best_wins)) if best_wins >= wins => best,
                _ => Some((id, wins)),
            })
            .map(|(id, _)| id)
    }

    /// Host-only: ROUND_END back to LOBBY keeping tallies and kills.
    pub fn next_round(&mut self, requester: ClientId) -> bool {
        if self.host_id != Some(requester) {
            return false;
        }
        self.reset_for_next_round()
    }

    /// Host-only: ENDED back to LOBBY with every score cleared.
    pub fn restart_match(&mut self, requester: ClientId) -> bool {
        if self.host_id != Some(requester) {
            return false;
        }
        self.reset_for_restart()
    }

    pub fn reset_for_next_round(&mut self) -> bool {
        if !self.status.permits(Action::NextRound) {
            return false;
        }
        self.current_round += 1;
        self.reset_round();
        true
    }

    pub fn reset_for_restart(&mut self) -> bool {
        if !self.status.permits(Action::Restart) {
            return false;
        }
        self.current_round = 1;
        self.round_wins.clear();
        for player in &mut self.players {
            player.kills = 0;
        }
        self.reset_round();
        true
    }

    fn reset_round(&mut self) {
        self.grid = Grid::generate(
            GRID_WIDTH,
            GRID_HEIGHT,
            self.settings.soft_block_density,
            &mut self.rng,
        );
        self.bombs.clear();
        self.explosions.clear();
        self.sudden_death_index = 0;
        self.last_sudden_death_at = None;
        self.match_started_at = None;
        self.round_population = 0;
        self.winner = None;
        self.match_winner = None;
        self.status = RoomStatus::Lobby;

        for (index, player) in self.players.iter_mut().enumerate() {
            player.respawn(SPAWN_POINTS[index % SPAWN_POINTS.len()]);
        }
        info!("Room {}: back in lobby for round {}", self.code, self.current_round);
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            grid: self.grid.to_rows(),
            players: self.players.clone(),
            bombs: self.bombs.clone(),
            explosions: self.explosions.clone(),
            game_state: self.status,
            host_id: self.host_id,
            winner: self.winner,
            room_code: self.code.clone(),
            max_players: self.settings.max_players,
            match_format: self.settings.match_format,
            current_round: self.current_round,
            round_wins: self.round_wins.clone(),
            match_winner: self.match_winner,
            rewards: self.settings.rewards.clone(),
        }
    }
}

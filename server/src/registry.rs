//! Room lookup by join code.

use crate::room::{Room, RoomSettings};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::RoomStatus;
use std::collections::HashMap;

const CODE_LENGTH: usize = 4;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Owns every live room. Codes are stored uppercase and matched
/// case-insensitively.
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    rng: StdRng,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeds code generation and every room's map generation from `rng`.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rooms: HashMap::new(),
            rng,
        }
    }

    /// Opens an empty room in LOBBY and returns its code.
    pub fn create_room(&mut self, settings: RoomSettings) -> String {
        let code = self.unused_code();
        let room_rng = StdRng::seed_from_u64(self.rng.gen());
        self.rooms
            .insert(code.clone(), Room::with_rng(code.clone(), settings, room_rng));
        info!("Room {} created ({} open)", code, self.rooms.len());
        code
    }

    fn unused_code(&mut self) -> String {
        loop {
            let code: String = (0..CODE_LENGTH)
                .map(|_| CODE_ALPHABET[self.rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(&normalize_code(code))
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(&normalize_code(code))
    }

    /// Drops the room once its last player has gone. Returns whether it was
    /// removed.
    pub fn remove_if_empty(&mut self, code: &str) -> bool {
        let code = normalize_code(code);
        if self.rooms.get(&code).map_or(false, Room::is_empty) {
            self.rooms.remove(&code);
            info!("Room {} closed ({} open)", code, self.rooms.len());
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Rooms the tick loop needs to advance.
    pub fn playing_codes(&self) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|(_, room)| room.status() == RoomStatus::Playing)
            .map(|(code, _)| code.clone())
            .collect()
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

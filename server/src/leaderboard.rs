//! Cross-match leaderboard keyed by display name.
//!
//! The board lives in memory and is written back to a JSON object of
//! `name -> {wins, kills}` whenever a match ends. Load and save failures are
//! logged by the caller and never reach clients; a board that cannot be read
//! starts out empty.

use crate::error::LeaderboardError;
use log::{error, info};
use serde::{Deserialize, Serialize};
use shared::LeaderboardEntry;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub wins: u32,
    pub kills: u32,
}

#[derive(Debug, Default)]
pub struct Leaderboard {
    path: Option<PathBuf>,
    records: BTreeMap<String, PlayerRecord>,
}

impl Leaderboard {
    /// A board that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Reads the board from `path`. A missing file is a fresh board; an
    /// unreadable or malformed one is logged and replaced by an empty board
    /// that will overwrite it on the next save.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match Self::read(&path) {
            Ok(records) => {
                info!("Loaded {} leaderboard entries from {}", records.len(), path.display());
                records
            }
            Err(LeaderboardError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!("No leaderboard at {}, starting fresh", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                error!("Error loading leaderboard from {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            records,
        }
    }

    fn read(path: &Path) -> Result<BTreeMap<String, PlayerRecord>, LeaderboardError> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Writes the board atomically: a sibling temp file renamed over the
    /// target. A no-op for in-memory boards.
    pub fn save(&self) -> Result<(), LeaderboardError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(&self.records)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Credits a finished match: one win for the winner and every
    /// participant's kills. Players with nothing to add get no entry.
    pub fn record_match<'a>(
        &mut self,
        winner: Option<&str>,
        kills: impl IntoIterator<Item = (&'a str, u32)>,
    ) {
        if let Some(name) = winner {
            self.records.entry(name.to_string()).or_default().wins += 1;
        }
        for (name, count) in kills {
            if count > 0 {
                self.records.entry(name.to_string()).or_default().kills += count;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<PlayerRecord> {
        self.records.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Best `n` players by wins, then kills, then name.
    pub fn top(&self, n: usize) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .records
            .iter()
            .map(|(name, record)| LeaderboardEntry {
                name: name.clone(),
                wins: record.wins,
                kills: record.kills,
            })
            .collect();

        entries.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then(b.kills.cmp(&a.kills))
                .then_with(|| a.name.cmp(&b.name))
        });
        entries.truncate(n);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_match() {
        let mut board = Leaderboard::in_memory();
        board.record_match(Some("Ada"), [("Ada", 2), ("Bo", 0), ("Cy", 1)]);
        board.record_match(Some("Cy"), [("Cy", 1)]);

        assert_eq!(board.get("Ada"), Some(PlayerRecord { wins: 1, kills: 2 }));
        assert_eq!(board.get("Cy"), Some(PlayerRecord { wins: 1, kills: 2 }));
        assert_eq!(board.get("Bo"), None);
        assert_eq!(board.len(), 2);
    }

    #[test]
    fn test_draw_records_kills_only() {
        let mut board = Leaderboard::in_memory();
        board.record_match(None, [("Ada", 1)]);
        assert_eq!(board.get("Ada"), Some(PlayerRecord { wins: 0, kills: 1 }));
    }

    #[test]
    fn test_top_ordering() {
        let mut board = Leaderboard::in_memory();
        board.record_match(Some("Bo"), [("Bo", 1)]);
        board.record_match(Some("Ada"), [("Ada", 3)]);
        board.record_match(Some("Ada"), []);
        board.record_match(Some("Cy"), [("Cy", 1)]);
        board.record_match(None, [("Dee", 9)]);

        let names: Vec<String> = board.top(10).into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Ada", "Bo", "Cy", "Dee"]);

        assert_eq!(board.top(2).len(), 2);
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut board = Leaderboard::in_memory();
        board.record_match(Some("Ada"), []);
        assert!(board.save().is_ok());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaderboard.json");

        let mut board = Leaderboard::load(&path);
        assert!(board.is_empty());
        board.record_match(Some("Ada"), [("Ada", 4)]);
        board.save().unwrap();

        let reloaded = Leaderboard::load(&path);
        assert_eq!(reloaded.get("Ada"), Some(PlayerRecord { wins: 1, kills: 4 }));
        assert!(!dir.path().join("leaderboard.json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Ada"]["wins"], 1);
        assert_eq!(raw["Ada"]["kills"], 4);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaderboard.json");
        fs::write(&path, "{ not json").unwrap();

        let mut board = Leaderboard::load(&path);
        assert!(board.is_empty());

        board.record_match(Some("Ada"), []);
        board.save().unwrap();
        assert_eq!(Leaderboard::load(&path).get("Ada").map(|r| r.wins), Some(1));
    }

    #[test]
    fn test_save_failure_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("leaderboard.json");

        let board = Leaderboard::load(&path);
        assert!(matches!(board.save(), Err(LeaderboardError::Io(_))));
    }
}

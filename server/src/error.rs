//! Error types surfaced by the room and persistence layers.
//!
//! Rejected gameplay commands are not errors: they are no-ops that return
//! `false`. Only failures a client must be told about (joining) or an
//! operator must see in the logs (leaderboard persistence) get a type here.

use thiserror::Error;

/// Reasons a connection cannot enter a room. The `Display` text is sent to
/// the client verbatim in an `error` event.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("Coordinates not found")]
    RoomNotFound,
    #[error("Zone saturated or operation in progress")]
    NotJoinable,
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("leaderboard I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("leaderboard file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

//! Server configuration shared by the binary and the library.

use shared::TICK_RATE;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the WebSocket listener to
    pub host: String,
    pub port: u16,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Upper bound on simultaneous connections
    pub max_connections: usize,
    /// Where the leaderboard is persisted; `None` keeps it in memory only
    pub leaderboard_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            tick_rate: TICK_RATE,
            max_connections: 512,
            leaderboard_path: Some(PathBuf::from("leaderboard.json")),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    /// Milliseconds of simulated time advanced by every tick.
    pub fn tick_dt_ms(&self) -> f32 {
        1000.0 / self.tick_rate.max(1) as f32
    }
}

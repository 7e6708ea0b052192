//! # Bomb Arena Server Library
//!
//! This library provides the authoritative server for the room-based bomb
//! arena game. Players connect over WebSocket, create or join rooms by a short
//! code, and the server simulates every room and streams its state back.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Each room runs its own grid, bombs, blasts, sudden death and best-of-N
//! scoring. Clients only send intents (move one step, place a bomb)
//! and render whatever snapshot the server sends next.
//!
//! ### Room Lifecycle
//! Rooms move through LOBBY, PLAYING, ROUND_END and ENDED. The host starts
//! rounds, advances to the next one and restarts finished matches. Host duty
//! passes to the earliest remaining joiner when the host leaves, and a room is
//! closed as soon as its last player is gone.
//!
//! ### State Broadcasting
//! After every tick, and after every command that changes a lobby, the room's
//! full snapshot goes to its members. Server-wide statistics and the
//! leaderboard go to every connection whenever they change.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Connection tasks only parse frames and forward them; every mutation happens
//! on one loop that interleaves inbound messages with the fixed-rate tick. No
//! room needs a lock and two commands never race.
//!
//! ## Module Organization
//!
//! - `grid`: map generation, cell queries and the sudden-death spiral
//! - `room`: the per-room simulation and state machine
//! - `registry`: room creation and lookup by code
//! - `client_manager`: connections, outbound channels and room membership
//! - `session`: dispatch of client events and fan-out of results
//! - `leaderboard`: cross-match wins and kills, persisted as JSON
//! - `network`: the WebSocket listener and the main loop
//! - `config`, `error`: server settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 3000,
//!         leaderboard_path: None,
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(&config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod grid;
pub mod leaderboard;
pub mod network;
pub mod registry;
pub mod room;
pub mod session;

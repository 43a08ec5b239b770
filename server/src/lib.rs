//! # Brainrot Arena Server Library
//!
//! This library provides the authoritative server for the brainrot arena, a
//! browser shooter where players fight each other and race to collect
//! brainrots and powerups. The server owns the canonical world state, applies
//! client events to it and keeps every browser synchronized.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Players, brainrots, powerups and bullets live only here. Clients render
//! what the server broadcasts; health, ammo, scoring and powerup timers are
//! enforced server-side.
//!
//! ### Session Management
//! Handles the lifecycle of players in the arena:
//! - Joining with a capacity limit and a randomized spawn point
//! - Starting a round once enough players are present
//! - Departure announcements and stopping the round when the arena empties
//!
//! ### State Broadcasting
//! A fixed-period tick pushes a full snapshot of the world to every
//! connection, while individual actions (shots, deaths, pickups, chat) are
//! announced immediately.
//!
//! ## Trust Boundary
//!
//! Movement and hit detection are resolved by the clients. The server accepts
//! reported positions and reported damage as-is and only enforces the bounds
//! on health, ammo and powerups. Hardening this needs server-side collision.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Event Loop
//! One task owns the [`session::GameSession`] and the
//! [`client_manager::ClientManager`]. Connection tasks, the tick timer and
//! respawn timers all feed a single channel, so every mutation runs to
//! completion before the next one starts and no locking is needed.
//!
//! ### WebSocket Transport
//! Each browser holds one WebSocket. Frames are JSON objects of the form
//! `{"event": ..., "data": ...}`; see the `shared` crate for the protocol.
//!
//! ## Module Organization
//!
//! - `config` - game rules and server settings
//! - `ids` - injectable entity id source
//! - `game` - the entity store and its mutations
//! - `session` - join/leave, event routing, tick and respawn completion
//! - `spawner` - cancellable respawn timers
//! - `client_manager` - open connections and broadcast fan-out
//! - `network` - WebSocket accept loop and the server loop
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
//!         bind_addr: "127.0.0.1:3000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod ids;
pub mod network;
pub mod session;
pub mod spawner;
pub mod utils;

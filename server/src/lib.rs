//! # World Server Library
//!
//! Authoritative server for a top-down multiplayer action game. Each world is
//! a procedurally generated map of biomes, landmarks and exits, populated by
//! monsters and roaming bosses. Players join over UDP, send commands, and
//! receive a snapshot plus events after every tick.
//!
//! ## Simulation
//!
//! A world is a [`game::GameState`]: ordered maps of players, creatures,
//! items and projectiles that every subsystem receives explicitly. One tick
//! drains the world's [`game::CommandInbox`], advances players, runs creature
//! AI, moves projectiles, resolves combat and pickups, then fires timed
//! events (respawns, boss spawns, item expiry). All randomness flows through
//! a single [`rng::SimRng`], so a seeded world replays exactly.
//!
//! ## Networking
//!
//! The [`network`] module adapts worlds to async UDP. Incoming packets feed
//! per-world [`client_manager::ClientManager`]s, the tick loop runs every
//! world in turn, and a sender task delivers the results so a slow socket
//! never stalls a tick. Joining players fill the first world with room; new
//! worlds are generated on demand and torn down once empty.
//!
//! ## Module Organization
//!
//! - [`game`]: world state, tick order, events and snapshots
//! - [`commands`] and [`skills`]: player command handling
//! - [`ai`]: creature state machine and boss phases
//! - [`combat`], [`collision`], [`projectiles`]: damage and hit detection
//! - [`generator`] and [`loot`]: procedural worlds and item drops
//! - [`config`]: static world configuration
//! - [`client_manager`] and [`network`]: sessions and the UDP server
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::WorldConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", WorldConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod client_manager;
pub mod collision;
pub mod combat;
pub mod commands;
pub mod config;
pub mod entity;
pub mod error;
pub mod game;
pub mod generator;
pub mod loot;
pub mod network;
pub mod projectiles;
pub mod rng;
pub mod skills;

//! Types shared between the world server and its clients: spatial math, the
//! static world layout and the wire protocol.

pub mod layout;
pub mod math;
pub mod protocol;

pub use layout::*;
pub use math::*;
pub use protocol::*;

pub const PROTOCOL_VERSION: u32 = 1;

/// Fixed simulation step (20 Hz).
pub const TICK_INTERVAL_MS: u64 = 50;

pub const DEFAULT_WORLD_WIDTH: f32 = 2000.0;
pub const DEFAULT_WORLD_HEIGHT: f32 = 2000.0;

pub const PLAYER_SIZE: f32 = 32.0;
pub const INVENTORY_CAPACITY: usize = 20;

/// Items within this distance of a player (inclusive) can be picked up.
pub const PICKUP_RADIUS: f32 = 30.0;

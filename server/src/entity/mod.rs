//! Simulated entities: players, creatures, world items and projectiles.

pub mod creature;
pub mod item;
pub mod player;
pub mod projectile;

pub use creature::{BossState, Creature};
pub use item::Item;
pub use player::Player;
pub use projectile::Projectile;

use shared::{EntityId, Rect, Vec2};

/// Shape shared by everything that occupies space in a world.
pub trait Entity {
    fn id(&self) -> EntityId;
    fn position(&self) -> Vec2;
    /// Width and height of the bounding box centered on [`Entity::position`].
    fn size(&self) -> (f32, f32);

    fn bounds(&self) -> Rect {
        let (width, height) = self.size();
        Rect::centered(self.position(), width, height)
    }
}

/// Per-world id source. Ids are never reused, even after an entity is gone.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: EntityId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

use super::Entity;
use shared::{EntityId, ProjectileKind, ProjectileView, Vec2};
use std::collections::BTreeSet;

pub const FIREBALL_SPEED: f32 = 400.0;
pub const ARROW_SPEED: f32 = 600.0;
pub const PROJECTILE_LIFESPAN_MS: u64 = 2000;
pub const EXPLOSION_RADIUS: f32 = 50.0;
pub const ARROW_MAX_PIERCE: u32 = 2;

const FIREBALL_SIZE: f32 = 16.0;
const ARROW_SIZE: f32 = 8.0;

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub owner_id: EntityId,
    pub kind: ProjectileKind,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    /// Owner's primary stat when fired, added on direct hits.
    pub primary_stat: u32,
    pub active: bool,
    pub created_at: u64,
    pub lifespan: u64,
    pub explodes: bool,
    pub explosion_radius: f32,
    pub piercing: bool,
    pub max_pierce_count: u32,
    pub pierce_count: u32,
    /// Creatures and players already struck.
    pub hit: BTreeSet<EntityId>,
}

impl Projectile {
    fn new(
        id: EntityId,
        owner_id: EntityId,
        kind: ProjectileKind,
        position: Vec2,
        velocity: Vec2,
        damage: f32,
        now: u64,
    ) -> Self {
        Self {
            id,
            owner_id,
            kind,
            position,
            velocity,
            damage,
            primary_stat: 0,
            active: true,
            created_at: now,
            lifespan: PROJECTILE_LIFESPAN_MS,
            explodes: false,
            explosion_radius: 0.0,
            piercing: false,
            max_pierce_count: 1,
            pierce_count: 0,
            hit: BTreeSet::new(),
        }
    }

    /// `direction` need not be normalized.
    pub fn fireball(
        id: EntityId,
        owner_id: EntityId,
        position: Vec2,
        direction: Vec2,
        damage: f32,
        now: u64,
    ) -> Self {
        let velocity = direction.normalize() * FIREBALL_SPEED;
        let mut fireball = Self::new(
            id,
            owner_id,
            ProjectileKind::Fireball,
            position,
            velocity,
            damage,
            now,
        );
        fireball.explodes = true;
        fireball.explosion_radius = EXPLOSION_RADIUS;
        fireball
    }

    pub fn arrow(
        id: EntityId,
        owner_id: EntityId,
        position: Vec2,
        direction: Vec2,
        damage: f32,
        now: u64,
    ) -> Self {
        let velocity = direction.normalize() * ARROW_SPEED;
        let mut arrow = Self::new(
            id,
            owner_id,
            ProjectileKind::Arrow,
            position,
            velocity,
            damage,
            now,
        );
        arrow.piercing = true;
        arrow.max_pierce_count = ARROW_MAX_PIERCE;
        arrow
    }

    pub fn advance(&mut self, dt_ms: u32) {
        self.position += self.velocity * (dt_ms as f32 / 1000.0);
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.created_at) > self.lifespan
    }

    /// Records a pierce through `target`. Deactivates the projectile once it
    /// has used up its pierces.
    pub fn register_hit(&mut self, target: EntityId) {
        self.hit.insert(target);
        self.pierce_count = (self.pierce_count + 1).min(self.max_pierce_count);
        if self.pierce_count >= self.max_pierce_count {
            self.active = false;
        }
    }

    pub fn to_view(&self) -> ProjectileView {
        ProjectileView {
            id: self.id,
            owner_id: self.owner_id,
            kind: self.kind,
            position: self.position,
            velocity: self.velocity,
        }
    }
}

impl Entity for Projectile {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn size(&self) -> (f32, f32) {
        match self.kind {
            ProjectileKind::Fireball => (FIREBALL_SIZE, FIREBALL_SIZE),
            ProjectileKind::Arrow => (ARROW_SIZE, ARROW_SIZE),
        }
    }
}

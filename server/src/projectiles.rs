//! Ranged attacks: spawning, flight, direct hits and explosions.

use crate::combat::{self, Combatant};
use crate::entity::{Entity, Projectile};
use crate::game::GameState;
use log::debug;
use shared::{distance, EntityId, Event, ProjectileKind, Vec2};

pub const FIREBALL_MULTIPLIER: f32 = 1.5;
pub const ARROW_MULTIPLIER: f32 = 1.2;

/// Launches a projectile from the owner's position. A zero `direction` fires
/// along the owner's facing. `damage_factor` scales the kind's usual damage.
pub fn fire(
    state: &mut GameState,
    owner_id: EntityId,
    kind: ProjectileKind,
    direction: Vec2,
    damage_factor: f32,
) -> Option<EntityId> {
    let now = state.now_ms;
    let id = {
        let owner = state.players.get(&owner_id).filter(|p| p.is_alive())?;
        let direction = if direction == Vec2::ZERO {
            owner.facing.to_vec()
        } else {
            direction
        };
        let base = owner.base_damage() as f32 * damage_factor;
        let (position, primary_stat) = (owner.position, owner.primary_stat());
        let id = state.ids.next_id();
        let mut projectile = match kind {
            ProjectileKind::Fireball => Projectile::fireball(
                id,
                owner_id,
                position,
                direction,
                base * FIREBALL_MULTIPLIER,
                now,
            ),
            ProjectileKind::Arrow => Projectile::arrow(
                id,
                owner_id,
                position,
                direction,
                base * ARROW_MULTIPLIER,
                now,
            ),
        };
        projectile.primary_stat = primary_stat;
        state.projectiles.insert(id, projectile);
        id
    };
    if let Some(owner) = state.players.get_mut(&owner_id) {
        owner.projectiles.push(id);
    }
    Some(id)
}

/// `floor(damage * (1 - distance / radius))`, zero at or beyond the radius.
pub fn explosion_damage(damage: f32, distance: f32, radius: f32) -> u32 {
    if radius <= 0.0 || distance >= radius {
        return 0;
    }
    (damage * (1.0 - distance / radius)).floor().max(0.0) as u32
}

/// Detonates a projectile where it is, damaging everything hostile within
/// its explosion radius. Targets the projectile already struck directly are
/// spared.
pub fn explode(state: &mut GameState, projectile_id: EntityId) {
    let Some(projectile) = state.projectiles.get_mut(&projectile_id) else {
        return;
    };
    projectile.active = false;
    let (owner_id, center, damage, radius) = (
        projectile.owner_id,
        projectile.position,
        projectile.damage,
        projectile.explosion_radius,
    );
    let struck = projectile.hit.clone();
    state.emit(Event::Explosion {
        position: center,
        radius,
    });

    let mut victims: Vec<(Combatant, u32)> = state
        .creatures
        .values()
        .filter(|c| c.is_alive() && !struck.contains(&c.id))
        .map(|c| {
            let dealt = explosion_damage(damage, distance(center, c.position), radius);
            (Combatant::Creature(c.id), dealt)
        })
        .collect();
    if state.config.pvp_projectiles {
        victims.extend(
            state
                .players
                .values()
                .filter(|p| p.id != owner_id && p.is_alive() && !struck.contains(&p.id))
                .filter(|p| !state.layout.in_safe_zone(p.position))
                .map(|p| {
                    let dealt = explosion_damage(damage, distance(center, p.position), radius);
                    (Combatant::Player(p.id), dealt)
                }),
        );
    }

    let attacker = Combatant::Player(owner_id);
    for (target, dealt) in victims {
        if dealt > 0 {
            combat::apply_damage(state, attacker, target, dealt);
        }
    }
}

/// Targets currently overlapping the projectile that it has not struck yet.
fn contacts(state: &GameState, projectile: &Projectile) -> Vec<Combatant> {
    let bounds = projectile.bounds();
    let mut found: Vec<Combatant> = state
        .creatures
        .values()
        .filter(|c| c.is_alive() && !projectile.hit.contains(&c.id))
        .filter(|c| bounds.intersects(&c.bounds()))
        .map(|c| Combatant::Creature(c.id))
        .collect();
    if state.config.pvp_projectiles {
        found.extend(
            state
                .players
                .values()
                .filter(|p| p.id != projectile.owner_id && p.is_alive())
                .filter(|p| !projectile.hit.contains(&p.id))
                .filter(|p| !state.layout.in_safe_zone(p.position))
                .filter(|p| bounds.intersects(&p.bounds()))
                .map(|p| Combatant::Player(p.id)),
        );
    }
    found
}

fn defense_of(state: &GameState, target: Combatant) -> u32 {
    match target {
        Combatant::Creature(id) => state.creatures.get(&id).map_or(0, |c| c.defense()),
        Combatant::Player(id) => state.players.get(&id).map_or(0, |p| p.defense()),
    }
}

/// Moves every live projectile, resolves hits and expiry, then sweeps out
/// inactive ones.
pub fn advance(state: &mut GameState, dt_ms: u32) {
    let now = state.now_ms;
    let ids: Vec<EntityId> = state.projectiles.keys().copied().collect();

    for id in ids {
        let Some(projectile) = state.projectiles.get_mut(&id) else {
            continue;
        };
        if !projectile.active {
            continue;
        }
        projectile.advance(dt_ms);

        if projectile.is_expired(now) {
            if projectile.explodes {
                explode(state, id);
            } else {
                projectile.active = false;
            }
            continue;
        }

        let Some(projectile) = state.projectiles.get(&id) else {
            continue;
        };
        let kind = projectile.kind;
        let targets = contacts(state, projectile);
        if targets.is_empty() {
            continue;
        }
        match kind {
            ProjectileKind::Fireball => {
                strike_directly(state, id, targets);
                explode(state, id);
            }
            ProjectileKind::Arrow => strike_with_arrow(state, id, targets),
        }
    }

    sweep(state);
}

fn direct_hit(state: &mut GameState, projectile: &Projectile, target: Combatant) {
    let defense = defense_of(state, target);
    let dealt = combat::compute_damage(projectile.damage, projectile.primary_stat, defense);
    combat::apply_damage(state, Combatant::Player(projectile.owner_id), target, dealt);
}

/// Full projectile damage on every contacted target, each marked as struck.
fn strike_directly(state: &mut GameState, projectile_id: EntityId, targets: Vec<Combatant>) {
    for target in targets {
        let Some(projectile) = state.projectiles.get_mut(&projectile_id) else {
            return;
        };
        projectile.hit.insert(target.id());
        let projectile = projectile.clone();
        direct_hit(state, &projectile, target);
    }
}

fn strike_with_arrow(state: &mut GameState, arrow_id: EntityId, targets: Vec<Combatant>) {
    for target in targets {
        let Some(arrow) = state.projectiles.get_mut(&arrow_id) else {
            return;
        };
        if !arrow.active {
            break;
        }
        arrow.register_hit(target.id());
        let arrow = arrow.clone();
        direct_hit(state, &arrow, target);
    }
}

/// Removes inactive projectiles and forgets them on their owners.
fn sweep(state: &mut GameState) {
    let spent: Vec<(EntityId, EntityId)> = state
        .projectiles
        .values()
        .filter(|p| !p.active)
        .map(|p| (p.id, p.owner_id))
        .collect();
    for (id, owner_id) in spent {
        state.projectiles.remove(&id);
        if let Some(owner) = state.players.get_mut(&owner_id) {
            owner.projectiles.retain(|p| *p != id);
        }
    }
    if !state.projectiles.is_empty() {
        debug!("{} projectiles in flight", state.projectiles.len());
    }
}

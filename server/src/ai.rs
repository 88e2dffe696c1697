//! Creature behavior: a five-state machine run once per tick for every living
//! creature, plus boss phase escalation.
//!
//! Allowed transitions:
//!
//! ```text
//! idle   -> patrol | chase | attack | flee
//! patrol -> idle   | chase | attack | flee
//! chase  -> attack | idle  | flee
//! attack -> chase  | flee
//! flee   -> idle
//! ```
//!
//! Attack never drops straight to idle. When an attacking creature loses its
//! target or breaks its leash it hands over to chase, which settles back to
//! idle within the same tick.

use crate::entity::Creature;
use crate::game::GameState;
use crate::rng::SimRng;
use log::info;
use shared::{direction_to, distance, CreatureState, Direction, EntityId, Event, Vec2};

pub const IDLE_DURATION_MS: u32 = 3000;
pub const PATROL_CHANCE: f64 = 0.7;
pub const PATROL_RADIUS: f32 = 100.0;
pub const PATROL_ARRIVAL_DISTANCE: f32 = 10.0;
pub const PATROL_REST_CHANCE: f64 = 0.3;
/// Fleeing stops beyond this multiple of the aggro range.
pub const FLEE_RECOVERY_FACTOR: f32 = 1.5;

pub fn is_legal_transition(from: CreatureState, to: CreatureState) -> bool {
    use CreatureState::*;
    matches!(
        (from, to),
        (Idle, Patrol | Chase | Attack | Flee)
            | (Patrol, Idle | Chase | Attack | Flee)
            | (Chase, Attack | Idle | Flee)
            | (Attack, Chase | Flee)
            | (Flee, Idle)
    )
}

/// What a creature knows about a player during one tick.
#[derive(Debug, Clone, Copy)]
struct Quarry {
    id: EntityId,
    position: Vec2,
    /// Alive and outside every safe zone.
    targetable: bool,
}

struct Surroundings {
    quarry: Vec<Quarry>,
    width: f32,
    height: f32,
}

impl Surroundings {
    fn find(&self, player_id: EntityId) -> Option<&Quarry> {
        self.quarry.iter().find(|q| q.id == player_id)
    }

    fn target(&self, player_id: Option<EntityId>) -> Option<&Quarry> {
        player_id
            .and_then(|id| self.find(id))
            .filter(|q| q.targetable)
    }
}

pub fn update(state: &mut GameState, dt_ms: u32) {
    let surroundings = Surroundings {
        quarry: state
            .players
            .values()
            .map(|p| Quarry {
                id: p.id,
                position: p.position,
                targetable: p.is_alive() && !state.layout.in_safe_zone(p.position),
            })
            .collect(),
        width: state.layout.width,
        height: state.layout.height,
    };

    let ids: Vec<EntityId> = state.creatures.keys().copied().collect();
    let mut phase_changes = Vec::new();
    for id in ids {
        let Some(creature) = state.creatures.get_mut(&id) else {
            continue;
        };
        if !creature.is_alive() {
            continue;
        }

        creature.tick_timers(dt_ms);
        if let Some(phase) = creature.update_phase() {
            info!(
                "{} (boss {}) entered phase {}",
                creature.species.name(),
                id,
                phase
            );
            phase_changes.push((id, phase));
        }

        think(creature, &surroundings, &mut state.rng, dt_ms);
    }

    for (boss_id, phase) in phase_changes {
        state.emit(Event::BossPhase { boss_id, phase });
    }
}

fn think(creature: &mut Creature, world: &Surroundings, rng: &mut SimRng, dt_ms: u32) {
    match creature.state {
        CreatureState::Idle => idle(creature, world, rng, dt_ms),
        CreatureState::Patrol => patrol(creature, world, rng, dt_ms),
        CreatureState::Chase => chase(creature, world, dt_ms),
        CreatureState::Attack => attack(creature, world, rng, dt_ms),
        CreatureState::Flee => flee(creature, world, dt_ms),
    }
}

fn leashed(creature: &Creature) -> bool {
    distance(creature.position, creature.spawn_position) > creature.stats.leash_range
}

/// Nearest targetable player inside the aggro range. Creatures beyond their
/// leash do not pick up new targets.
fn acquire(creature: &Creature, world: &Surroundings) -> Option<Quarry> {
    if leashed(creature) {
        return None;
    }
    world
        .quarry
        .iter()
        .filter(|q| q.targetable)
        .map(|q| (distance(creature.position, q.position), q))
        .filter(|(d, _)| *d <= creature.stats.aggro_range)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, q)| *q)
}

/// Switches to chase or attack if a player is in aggro range.
fn check_aggro(creature: &mut Creature, world: &Surroundings) -> bool {
    let Some(quarry) = acquire(creature, world) else {
        return false;
    };
    creature.target = Some(quarry.id);
    creature.velocity = Vec2::ZERO;
    if distance(creature.position, quarry.position) <= creature.stats.attack_range {
        face(creature, quarry.position - creature.position);
        creature.set_state(CreatureState::Attack);
    } else {
        creature.set_state(CreatureState::Chase);
    }
    true
}

fn idle(creature: &mut Creature, world: &Surroundings, rng: &mut SimRng, dt_ms: u32) {
    creature.velocity = Vec2::ZERO;
    if check_aggro(creature, world) {
        creature.idle_timer = 0;
        return;
    }

    creature.idle_timer += dt_ms;
    if creature.idle_timer < IDLE_DURATION_MS {
        return;
    }
    creature.idle_timer = 0;
    if rng.chance(PATROL_CHANCE) {
        creature.patrol_point = Some(patrol_point(creature, world, rng));
        creature.set_state(CreatureState::Patrol);
    }
}

fn patrol_point(creature: &Creature, world: &Surroundings, rng: &mut SimRng) -> Vec2 {
    rng.point_in_circle(creature.spawn_position, PATROL_RADIUS)
        .clamp_to(world.width, world.height)
}

fn patrol(creature: &mut Creature, world: &Surroundings, rng: &mut SimRng, dt_ms: u32) {
    if check_aggro(creature, world) {
        creature.patrol_point = None;
        return;
    }

    let point = match creature.patrol_point {
        Some(point) => point,
        None => {
            let point = patrol_point(creature, world, rng);
            creature.patrol_point = Some(point);
            point
        }
    };

    if distance(creature.position, point) < PATROL_ARRIVAL_DISTANCE {
        creature.velocity = Vec2::ZERO;
        if rng.chance(PATROL_REST_CHANCE) {
            creature.patrol_point = None;
            creature.idle_timer = 0;
            creature.set_state(CreatureState::Idle);
        } else {
            creature.patrol_point = Some(patrol_point(creature, world, rng));
        }
        return;
    }
    move_towards(creature, point, world, dt_ms);
}

fn lose_target(creature: &mut Creature) {
    creature.target = None;
    creature.velocity = Vec2::ZERO;
    creature.idle_timer = 0;
    creature.set_state(CreatureState::Idle);
}

fn chase(creature: &mut Creature, world: &Surroundings, dt_ms: u32) {
    let Some(target) = world.target(creature.target).copied() else {
        lose_target(creature);
        return;
    };
    if leashed(creature) {
        lose_target(creature);
        return;
    }

    if distance(creature.position, target.position) <= creature.stats.attack_range {
        creature.velocity = Vec2::ZERO;
        face(creature, target.position - creature.position);
        creature.set_state(CreatureState::Attack);
        return;
    }
    move_towards(creature, target.position, world, dt_ms);
}

fn attack(creature: &mut Creature, world: &Surroundings, rng: &mut SimRng, dt_ms: u32) {
    let target = world.target(creature.target).copied();
    let in_reach = target.map_or(false, |t| {
        distance(creature.position, t.position) <= creature.stats.attack_range
    });
    let Some(target) = target.filter(|_| in_reach && !leashed(creature)) else {
        creature.set_state(CreatureState::Chase);
        chase(creature, world, dt_ms);
        return;
    };

    creature.velocity = Vec2::ZERO;
    face(creature, target.position - creature.position);
    if creature.attack_cooldown > 0 {
        return;
    }

    let special = match &creature.boss {
        Some(boss) if boss.special_attack_cooldown == 0 => rng.chance(boss.special_attack_chance()),
        _ => false,
    };
    creature.begin_attack(special);
}

fn flee(creature: &mut Creature, world: &Surroundings, dt_ms: u32) {
    let threat = creature
        .last_attacker
        .and_then(|id| world.find(id))
        .map(|q| q.position);
    let Some(threat) = threat else {
        lose_target(creature);
        return;
    };
    if distance(creature.position, threat) > creature.stats.aggro_range * FLEE_RECOVERY_FACTOR {
        lose_target(creature);
        return;
    }

    let mut away = direction_to(threat, creature.position);
    if away == Vec2::ZERO {
        away = creature.facing.to_vec();
    }
    creature.velocity = away * creature.stats.movement_speed;
    face(creature, away);
    let step = creature.velocity * (dt_ms as f32 / 1000.0);
    creature.position = (creature.position + step).clamp_to(world.width, world.height);
}

/// Moves toward `point` at movement speed without overshooting it.
fn move_towards(creature: &mut Creature, point: Vec2, world: &Surroundings, dt_ms: u32) {
    let direction = direction_to(creature.position, point);
    let step = creature.stats.movement_speed * dt_ms as f32 / 1000.0;
    creature.velocity = direction * creature.stats.movement_speed;
    face(creature, direction);

    let next = if distance(creature.position, point) <= step {
        point
    } else {
        creature.position + direction * step
    };
    creature.position = next.clamp_to(world.width, world.height);
}

fn face(creature: &mut Creature, towards: Vec2) {
    if let Some(facing) = Direction::from_vector(towards) {
        creature.facing = facing;
    }
}

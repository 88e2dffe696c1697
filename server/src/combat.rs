//! Damage, kills and their consequences.

use crate::game::GameState;
use crate::entity::Item;
use crate::loot;
use log::{debug, info, warn};
use shared::{CreatureState, EntityId, Event, Vec2};

/// Base damage of every creature swing; the species damage stat is added on top.
pub const CREATURE_BASE_DAMAGE: u32 = 5;
/// Flat experience for killing another player.
pub const PVP_KILL_XP: u32 = 50;

const FLEE_HEALTH_FRACTION: f32 = 0.2;
const FLEE_CHANCE: f64 = 0.3;

/// Either side of an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combatant {
    Player(EntityId),
    Creature(EntityId),
}

impl Combatant {
    pub fn id(self) -> EntityId {
        match self {
            Combatant::Player(id) | Combatant::Creature(id) => id,
        }
    }
}

/// `max(1, floor(base + primary * 0.5 - defense))`
pub fn compute_damage(base: f32, primary_stat: u32, defense: u32) -> u32 {
    let raw = (base + primary_stat as f32 * 0.5 - defense as f32).floor();
    if raw < 1.0 {
        1
    } else {
        raw as u32
    }
}

fn defense_of(state: &GameState, target: Combatant) -> Option<u32> {
    match target {
        Combatant::Player(id) => state.players.get(&id).map(|p| p.defense()),
        Combatant::Creature(id) => state.creatures.get(&id).map(|c| c.defense()),
    }
}

/// Melee damage `attacker` would deal to `target`. `multiplier` scales the
/// attacker's base damage.
pub fn attack_damage(
    state: &GameState,
    attacker: Combatant,
    target: Combatant,
    multiplier: f32,
) -> Option<u32> {
    let defense = defense_of(state, target)?;
    match attacker {
        Combatant::Player(id) => {
            let player = state.players.get(&id)?;
            Some(compute_damage(
                player.base_damage() as f32 * multiplier,
                player.primary_stat(),
                defense,
            ))
        }
        Combatant::Creature(id) => {
            let creature = state.creatures.get(&id)?;
            let damage = compute_damage(
                CREATURE_BASE_DAMAGE as f32 * multiplier,
                creature.stats.damage,
                defense,
            );
            if creature.is_using_special_attack() {
                Some(damage * 2)
            } else {
                Some(damage)
            }
        }
    }
}

/// Resolves one melee hit. Returns the target's remaining health, or `None`
/// when no damage was dealt.
pub fn strike(
    state: &mut GameState,
    attacker: Combatant,
    target: Combatant,
    multiplier: f32,
) -> Option<u32> {
    if !can_damage(state, attacker, target) {
        return None;
    }
    let damage = attack_damage(state, attacker, target, multiplier)?;
    apply_damage(state, attacker, target, damage)
}

/// Whether `attacker` may hurt `target` at all: both alive, no self damage,
/// and no player damage inside a safe zone.
pub fn can_damage(state: &GameState, attacker: Combatant, target: Combatant) -> bool {
    let attacker_alive = match attacker {
        Combatant::Player(id) => state.players.get(&id).map_or(false, |p| p.is_alive()),
        Combatant::Creature(id) => state.creatures.get(&id).map_or(false, |c| c.is_alive()),
    };
    if !attacker_alive {
        return false;
    }
    match target {
        Combatant::Creature(id) => state.creatures.get(&id).map_or(false, |c| c.is_alive()),
        Combatant::Player(id) => {
            let Some(victim) = state.players.get(&id) else {
                return false;
            };
            if !victim.is_alive() {
                return false;
            }
            match attacker {
                Combatant::Player(attacker_id) => {
                    attacker_id != id && !state.layout.in_safe_zone(victim.position)
                }
                Combatant::Creature(_) => true,
            }
        }
    }
}

/// Subtracts `damage` from the target, emits the combat event and runs kill
/// handling at zero health. Returns the health left.
pub fn apply_damage(
    state: &mut GameState,
    attacker: Combatant,
    target: Combatant,
    damage: u32,
) -> Option<u32> {
    if damage == 0 || !can_damage(state, attacker, target) {
        return None;
    }
    let now = state.now_ms;
    let killer = match attacker {
        Combatant::Player(id) => Some(id),
        Combatant::Creature(_) => None,
    };

    let remaining = match target {
        Combatant::Creature(id) => {
            let creature = state.creatures.get_mut(&id)?;
            if killer.is_some() {
                creature.last_attacker = killer;
            }
            creature.take_damage(damage, now)
        }
        Combatant::Player(id) => state.players.get_mut(&id)?.take_damage(damage),
    };

    debug!(
        "{:?} hit {:?} for {} ({} left)",
        attacker, target, damage, remaining
    );
    state.emit(Event::Combat {
        attacker_id: attacker.id(),
        target_id: target.id(),
        damage,
        target_health: remaining,
    });

    match target {
        Combatant::Creature(id) if remaining == 0 => creature_killed(state, id, killer),
        Combatant::Creature(id) => react_to_damage(state, id, killer),
        Combatant::Player(id) if remaining == 0 => player_killed(state, id, attacker),
        Combatant::Player(_) => {}
    }
    Some(remaining)
}

/// A wounded creature may break off and flee; an idle or patrolling one turns
/// on whoever hit it.
fn react_to_damage(state: &mut GameState, creature_id: EntityId, attacker: Option<EntityId>) {
    let Some(creature) = state.creatures.get(&creature_id) else {
        return;
    };
    let state_now = creature.state;
    let wounded = creature.health_fraction() < FLEE_HEALTH_FRACTION;

    if wounded && state_now != CreatureState::Flee && state.rng.chance(FLEE_CHANCE) {
        if let Some(creature) = state.creatures.get_mut(&creature_id) {
            creature.target = None;
            creature.set_state(CreatureState::Flee);
        }
        return;
    }

    if let (Some(player_id), CreatureState::Idle | CreatureState::Patrol) = (attacker, state_now) {
        if let Some(creature) = state.creatures.get_mut(&creature_id) {
            creature.target = Some(player_id);
            creature.set_state(CreatureState::Chase);
        }
    }
}

/// Grants experience and announces any level-ups.
pub fn award_experience(state: &mut GameState, player_id: EntityId, amount: u32) {
    let Some(player) = state.players.get_mut(&player_id) else {
        return;
    };
    if player.add_experience(amount) > 0 {
        let level = player.level;
        info!("Player {} ({}) reached level {}", player_id, player.name, level);
        state.emit(Event::LevelUp { player_id, level });
    }
}

fn drop_loot(state: &mut GameState, items: Vec<Item>, at: Vec2) {
    for item in items {
        state.drop_item(item, at);
    }
}

fn creature_killed(state: &mut GameState, creature_id: EntityId, killer: Option<EntityId>) {
    let Some(creature) = state.creatures.get(&creature_id) else {
        return;
    };
    let (species, position, level, xp) = (
        creature.species,
        creature.position,
        creature.level,
        creature.stats.xp_reward,
    );
    let is_boss = creature.is_boss();

    let killer_level = killer
        .and_then(|id| state.players.get(&id))
        .map_or(1, |p| p.level);
    if let Some(player_id) = killer {
        award_experience(state, player_id, xp);
    }

    let loot_level = level.max(killer_level);
    let drops = if is_boss {
        loot::boss_loot(&mut state.rng, &mut state.ids, loot_level)
    } else {
        loot::monster_loot(&mut state.rng, &mut state.ids, loot_level)
    };
    debug!(
        "{} {} died, dropping {} items",
        species.name(),
        creature_id,
        drops.len()
    );
    drop_loot(state, drops, position);

    if !is_boss {
        return;
    }
    state.creatures.remove(&creature_id);
    let Some((killer_id, killer_name)) = killer
        .and_then(|id| state.players.get(&id))
        .map(|p| (p.id, p.name.clone()))
    else {
        warn!("Boss {} died without a known killer", creature_id);
        return;
    };
    info!("{} (boss {}) slain by {}", species.name(), creature_id, killer_name);
    state.emit(Event::BossKill {
        boss_id: creature_id,
        species,
        killer_id,
        killer_name,
    });
}

/// Drops the victim's gear, rewards a player killer and respawns the victim
/// at a fresh spawn point.
fn player_killed(state: &mut GameState, victim_id: EntityId, killer: Combatant) {
    let pvp = matches!(killer, Combatant::Player(id) if id != victim_id);
    let Some(victim) = state.players.get_mut(&victim_id) else {
        return;
    };
    let position = victim.position;
    let mut drops = victim.take_equipment();
    if pvp {
        drops.extend(victim.take_inventory());
    }
    info!(
        "Player {} ({}) was killed by {:?}",
        victim_id, victim.name, killer
    );

    drop_loot(state, drops, position);
    if let Combatant::Player(killer_id) = killer {
        if pvp {
            award_experience(state, killer_id, PVP_KILL_XP);
        }
    }
    state.emit(Event::PlayerDeath {
        player_id: victim_id,
        killer_id: Some(killer.id()),
        position,
    });

    let spawn = state.spawn_point();
    let Some(victim) = state.players.get_mut(&victim_id) else {
        return;
    };
    victim.respawn(spawn);
    let health = victim.health;
    state.emit(Event::PlayerRespawn {
        player_id: victim_id,
        position: spawn,
        health,
    });
    state.emit_inventory(victim_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{test_state, Audience};
    use crate::loot;
    use crate::rng::SimRng;
    use proptest::prelude::*;
    use shared::{CharacterClass, EquipSlot, Rarity, Species};

    const WILDS: Vec2 = Vec2::new(1000.0, 1000.0);

    fn events(state: &mut GameState) -> Vec<Event> {
        state
            .tick(&mut crate::game::LocalInbox::new())
            .events
            .into_iter()
            .filter(|e| e.audience == Audience::Everyone)
            .map(|e| e.event)
            .collect()
    }

    #[test]
    fn test_damage_formula() {
        assert_eq!(compute_damage(10.0, 5, 1), 11);
        assert_eq!(compute_damage(12.0, 6, 3), 12);
        assert_eq!(compute_damage(1.0, 0, 50), 1);
    }

    #[test]
    fn test_warrior_hits_wolf() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        state.players.get_mut(&warrior).unwrap().position = WILDS;
        let wolf = state.spawn_monster(Species::Wolf, WILDS + Vec2::new(20.0, 0.0), 1);

        let left = strike(
            &mut state,
            Combatant::Player(warrior),
            Combatant::Creature(wolf),
            1.0,
        );
        assert_eq!(left, Some(29));
        assert_eq!(state.creatures[&wolf].last_attacker, Some(warrior));
    }

    #[test]
    fn test_creature_hits_player() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        let wolf = state.spawn_monster(Species::Wolf, WILDS, 1);

        // 5 + 8 * 0.5 - 3
        let damage = attack_damage(
            &state,
            Combatant::Creature(wolf),
            Combatant::Player(warrior),
            1.0,
        );
        assert_eq!(damage, Some(6));
    }

    #[test]
    fn test_boss_special_attack_doubles_damage() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        let boss = state.spawn_boss(Species::AncientTreant, WILDS, 5);
        let target = Combatant::Player(warrior);

        let normal = attack_damage(&state, Combatant::Creature(boss), target, 1.0).unwrap();
        state.creatures.get_mut(&boss).unwrap().begin_attack(true);
        let special = attack_damage(&state, Combatant::Creature(boss), target, 1.0).unwrap();
        assert_eq!(special, normal * 2);
    }

    #[test]
    fn test_pvp_blocked_in_safe_zone() {
        let mut state = test_state();
        let a = state.add_player("A", CharacterClass::Warrior);
        let b = state.add_player("B", CharacterClass::Warrior);
        let gate = state.layout.exits[0].position;
        state.players.get_mut(&a).unwrap().position = gate;
        state.players.get_mut(&b).unwrap().position = gate + Vec2::new(10.0, 0.0);

        assert_eq!(
            strike(&mut state, Combatant::Player(a), Combatant::Player(b), 1.0),
            None
        );
        assert_eq!(state.players[&b].health, state.players[&b].max_health);
    }

    #[test]
    fn test_pvp_outside_safe_zone_and_no_self_damage() {
        let mut state = test_state();
        let a = state.add_player("A", CharacterClass::Warrior);
        let b = state.add_player("B", CharacterClass::Warrior);
        state.players.get_mut(&a).unwrap().position = WILDS;
        state.players.get_mut(&b).unwrap().position = WILDS + Vec2::new(10.0, 0.0);

        assert_eq!(
            strike(&mut state, Combatant::Player(a), Combatant::Player(a), 1.0),
            None
        );
        // 10 + 2.5 - 3
        assert_eq!(
            strike(&mut state, Combatant::Player(a), Combatant::Player(b), 1.0),
            Some(111)
        );
    }

    #[test]
    fn test_monster_kill_awards_xp_and_loot() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        state.players.get_mut(&warrior).unwrap().position = WILDS;
        let wolf = state.spawn_monster(Species::Wolf, WILDS, 1);
        // drop roll, rarity roll, item kind
        state.rng = SimRng::scripted([0.1, 0.9, 0.0]);

        apply_damage(
            &mut state,
            Combatant::Player(warrior),
            Combatant::Creature(wolf),
            100,
        );
        let wolf = &state.creatures[&wolf];
        assert!(!wolf.is_alive());
        assert!(wolf.death_time > 0);
        assert_eq!(state.players[&warrior].experience, wolf.stats.xp_reward);
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn test_boss_kill_removes_boss() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        let boss = state.spawn_boss(Species::AncientTreant, WILDS, 5);

        apply_damage(
            &mut state,
            Combatant::Player(warrior),
            Combatant::Creature(boss),
            100_000,
        );
        assert!(!state.creatures.contains_key(&boss));
        assert!(state.items.len() >= 3);
        assert!(state.items.values().all(|item| item.rarity != Rarity::Common));

        let kills: Vec<_> = events(&mut state)
            .into_iter()
            .filter(|e| matches!(e, Event::BossKill { .. }))
            .collect();
        match kills.as_slice() {
            [Event::BossKill {
                boss_id,
                killer_name,
                species,
                ..
            }] => {
                assert_eq!(*boss_id, boss);
                assert_eq!(killer_name, "Brann");
                assert_eq!(*species, Species::AncientTreant);
            }
            _ => panic!("Expected exactly one boss kill event"),
        }
    }

    #[test]
    fn test_pvp_kill_drops_everything_and_respawns() {
        let mut state = test_state();
        let a = state.add_player("A", CharacterClass::Warrior);
        let b = state.add_player("B", CharacterClass::Ranger);
        state.players.get_mut(&a).unwrap().position = WILDS;
        state.players.get_mut(&b).unwrap().position = WILDS;

        let sword = loot::generate_item(
            &mut SimRng::scripted([0.0]),
            &mut state.ids,
            Rarity::Common,
            1,
        );
        let potion = loot::healing_potion(&mut state.ids, Rarity::Common);
        let victim = state.players.get_mut(&b).unwrap();
        victim.add_to_inventory(sword).unwrap();
        let sword_id = victim.inventory[0].id;
        victim.equip(sword_id, Some(EquipSlot::Weapon)).unwrap();
        victim.add_to_inventory(potion).unwrap();

        apply_damage(&mut state, Combatant::Player(a), Combatant::Player(b), 1000);

        let victim = &state.players[&b];
        assert_eq!(victim.health, victim.max_health);
        assert!(victim.inventory.is_empty());
        assert!(victim.equipment.is_empty());
        assert!(state.layout.in_safe_zone(victim.position));
        assert_eq!(state.items.len(), 2);
        assert!(state.items.values().all(|item| item.position == WILDS));
        assert_eq!(state.players[&a].experience, PVP_KILL_XP);

        let events = events(&mut state);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::PlayerDeath { player_id, killer_id: Some(k), .. } if *player_id == b && *k == a
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PlayerRespawn { player_id, .. } if *player_id == b)));
    }

    #[test]
    fn test_creature_kill_keeps_inventory() {
        let mut state = test_state();
        let wolf = state.spawn_monster(Species::Wolf, WILDS, 1);
        let b = state.add_player("B", CharacterClass::Mage);
        state.players.get_mut(&b).unwrap().position = WILDS;
        let potion = loot::healing_potion(&mut state.ids, Rarity::Common);
        state.players.get_mut(&b).unwrap().add_to_inventory(potion).unwrap();

        apply_damage(&mut state, Combatant::Creature(wolf), Combatant::Player(b), 1000);
        assert_eq!(state.players[&b].inventory.len(), 1);
        assert!(state.items.is_empty());
    }

    #[test]
    fn test_hit_idle_creature_gives_chase() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        let wolf = state.spawn_monster(Species::Wolf, WILDS, 1);

        apply_damage(
            &mut state,
            Combatant::Player(warrior),
            Combatant::Creature(wolf),
            5,
        );
        let wolf = &state.creatures[&wolf];
        assert_eq!(wolf.state, CreatureState::Chase);
        assert_eq!(wolf.target, Some(warrior));
    }

    #[test]
    fn test_badly_wounded_creature_may_flee() {
        let mut state = test_state();
        let warrior = state.add_player("Brann", CharacterClass::Warrior);
        let wolf = state.spawn_monster(Species::Wolf, WILDS, 1);
        state.rng = SimRng::scripted([0.1]);

        apply_damage(
            &mut state,
            Combatant::Player(warrior),
            Combatant::Creature(wolf),
            35,
        );
        assert_eq!(state.creatures[&wolf].state, CreatureState::Flee);
    }

    proptest! {
        #[test]
        fn prop_damage_is_at_least_one(base in 0.0f32..500.0, primary in 0u32..200, defense in 0u32..1000) {
            prop_assert!(compute_damage(base, primary, defense) >= 1);
        }

        #[test]
        fn prop_health_stays_in_bounds(hits in proptest::collection::vec(0u32..200, 1..20)) {
            let mut state = test_state();
            let a = state.add_player("A", CharacterClass::Warrior);
            let b = state.add_player("B", CharacterClass::Mage);
            state.players.get_mut(&a).unwrap().position = WILDS;
            state.players.get_mut(&b).unwrap().position = WILDS;
            let wolf = state.spawn_monster(Species::Wolf, WILDS, 1);

            for damage in hits {
                apply_damage(&mut state, Combatant::Player(a), Combatant::Player(b), damage);
                apply_damage(&mut state, Combatant::Player(a), Combatant::Creature(wolf), damage);
                let victim = &state.players[&b];
                prop_assert!(victim.health <= victim.max_health);
                let creature = &state.creatures[&wolf];
                prop_assert!(creature.health <= creature.max_health);
            }
        }
    }
}

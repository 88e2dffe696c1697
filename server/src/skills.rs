//! Class skills. Each class has two, addressed by id 1 and 2.

use crate::combat::{self, Combatant};
use crate::error::CommandError;
use crate::game::GameState;
use crate::projectiles;
use log::debug;
use shared::{direction_to, distance, CharacterClass, Direction, EntityId, ProjectileKind, Vec2};

pub const WHIRLWIND_RADIUS: f32 = 80.0;
pub const WHIRLWIND_MULTIPLIER: f32 = 1.2;
pub const BATTLE_CRY_HEAL_FRACTION: f32 = 0.25;
pub const BLINK_DISTANCE: f32 = 150.0;
pub const VOLLEY_SPREAD_DEGREES: f32 = 15.0;
pub const POWER_SHOT_MULTIPLIER: f32 = 2.0;
pub const POWER_SHOT_PIERCE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    Whirlwind,
    BattleCry,
    Fireball,
    Blink,
    Volley,
    PowerShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillSpec {
    pub skill: Skill,
    pub name: &'static str,
    pub cooldown_ms: u32,
}

pub fn skill_spec(class: CharacterClass, skill_id: u8) -> Option<SkillSpec> {
    let (skill, name, cooldown_ms) = match (class, skill_id) {
        (CharacterClass::Warrior, 1) => (Skill::Whirlwind, "Whirlwind", 4000),
        (CharacterClass::Warrior, 2) => (Skill::BattleCry, "Battle Cry", 10_000),
        (CharacterClass::Mage, 1) => (Skill::Fireball, "Fireball", 1500),
        (CharacterClass::Mage, 2) => (Skill::Blink, "Blink", 6000),
        (CharacterClass::Ranger, 1) => (Skill::Volley, "Volley", 3000),
        (CharacterClass::Ranger, 2) => (Skill::PowerShot, "Power Shot", 5000),
        _ => return None,
    };
    Some(SkillSpec {
        skill,
        name,
        cooldown_ms,
    })
}

/// Uses a skill. The target point, when given, sets the aim; otherwise the
/// player's facing does.
pub fn cast(
    state: &mut GameState,
    player_id: EntityId,
    skill_id: u8,
    target: Option<Vec2>,
) -> Result<(), CommandError> {
    let player = state
        .players
        .get_mut(&player_id)
        .filter(|p| p.is_alive())
        .ok_or(CommandError::PlayerDead)?;
    let spec = skill_spec(player.class, skill_id)
        .ok_or(CommandError::UnknownSkill(skill_id, player.class))?;
    if player.skill_remaining(skill_id) > 0 {
        return Err(CommandError::SkillOnCooldown(skill_id));
    }

    let origin = player.position;
    let aim = target
        .map(|point| direction_to(origin, point))
        .filter(|direction| *direction != Vec2::ZERO)
        .unwrap_or_else(|| player.facing.to_vec());
    if let Some(facing) = Direction::from_vector(aim) {
        player.facing = facing;
    }
    player.start_skill_cooldown(skill_id, spec.cooldown_ms);
    debug!("Player {} used {}", player_id, spec.name);

    match spec.skill {
        Skill::Whirlwind => whirlwind(state, player_id, origin),
        Skill::BattleCry => {
            if let Some(player) = state.players.get_mut(&player_id) {
                let amount = (player.max_health as f32 * BATTLE_CRY_HEAL_FRACTION).round() as u32;
                player.heal(amount);
            }
        }
        Skill::Fireball => {
            projectiles::fire(state, player_id, ProjectileKind::Fireball, aim, 1.0);
        }
        Skill::Blink => {
            let reach = target.map_or(BLINK_DISTANCE, |point| {
                distance(origin, point).min(BLINK_DISTANCE)
            });
            let (width, height) = (state.layout.width, state.layout.height);
            if let Some(player) = state.players.get_mut(&player_id) {
                player.position = (origin + aim * reach).clamp_to(width, height);
            }
        }
        Skill::Volley => {
            let spread = VOLLEY_SPREAD_DEGREES.to_radians();
            for angle in [-spread, 0.0, spread] {
                projectiles::fire(state, player_id, ProjectileKind::Arrow, aim.rotate(angle), 1.0);
            }
        }
        Skill::PowerShot => {
            let arrow = projectiles::fire(
                state,
                player_id,
                ProjectileKind::Arrow,
                aim,
                POWER_SHOT_MULTIPLIER,
            );
            if let Some(arrow) = arrow.and_then(|id| state.projectiles.get_mut(&id)) {
                arrow.max_pierce_count = POWER_SHOT_PIERCE;
            }
        }
    }
    Ok(())
}

/// Strikes every creature and player within reach of the warrior.
fn whirlwind(state: &mut GameState, player_id: EntityId, origin: Vec2) {
    let in_reach = |position: Vec2| distance(origin, position) <= WHIRLWIND_RADIUS;
    let mut targets: Vec<Combatant> = state
        .creatures
        .values()
        .filter(|c| c.is_alive() && in_reach(c.position))
        .map(|c| Combatant::Creature(c.id))
        .collect();
    targets.extend(
        state
            .players
            .values()
            .filter(|p| p.id != player_id && in_reach(p.position))
            .map(|p| Combatant::Player(p.id)),
    );

    let attacker = Combatant::Player(player_id);
    for target in targets {
        combat::strike(state, attacker, target, WHIRLWIND_MULTIPLIER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_state;
    use assert_approx_eq::assert_approx_eq;
    use shared::Species;

    const WILDS: Vec2 = Vec2::new(1000.0, 1000.0);

    fn hero(state: &mut GameState, class: CharacterClass) -> EntityId {
        let id = state.add_player("Hero", class);
        let player = state.players.get_mut(&id).unwrap();
        player.position = WILDS;
        player.facing = Direction::Right;
        id
    }

    #[test]
    fn test_every_class_has_two_skills() {
        for class in [
            CharacterClass::Warrior,
            CharacterClass::Mage,
            CharacterClass::Ranger,
        ] {
            assert!(skill_spec(class, 1).is_some());
            assert!(skill_spec(class, 2).is_some());
            assert!(skill_spec(class, 3).is_none());
        }
    }

    #[test]
    fn test_unknown_skill_rejected() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Mage);
        assert_eq!(
            cast(&mut state, id, 7, None),
            Err(CommandError::UnknownSkill(7, CharacterClass::Mage))
        );
    }

    #[test]
    fn test_cooldown_blocks_recast() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Mage);
        assert_eq!(cast(&mut state, id, 1, None), Ok(()));
        assert_eq!(
            cast(&mut state, id, 1, None),
            Err(CommandError::SkillOnCooldown(1))
        );
        assert_eq!(state.players[&id].skill_remaining(1), 1500);
        assert_eq!(state.projectiles.len(), 1);
    }

    #[test]
    fn test_whirlwind_hits_everything_around() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Warrior);
        let behind = state.spawn_monster(Species::Wolf, WILDS - Vec2::new(60.0, 0.0), 1);
        let far = state.spawn_monster(Species::Wolf, WILDS + Vec2::new(120.0, 0.0), 1);

        cast(&mut state, id, 1, None).unwrap();
        // 10 * 1.2 + 2.5 - 1
        assert_eq!(state.creatures[&behind].health, 27);
        assert_eq!(state.creatures[&far].health, 40);
    }

    #[test]
    fn test_battle_cry_heals_a_quarter() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Warrior);
        state.players.get_mut(&id).unwrap().health = 50;
        cast(&mut state, id, 2, None).unwrap();
        assert_eq!(state.players[&id].health, 80);
    }

    #[test]
    fn test_blink_toward_target_point() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Mage);
        cast(&mut state, id, 2, Some(WILDS + Vec2::new(0.0, 400.0))).unwrap();
        let player = &state.players[&id];
        assert_approx_eq!(player.position.x, 1000.0, 1e-3);
        assert_approx_eq!(player.position.y, 1150.0, 1e-3);
        assert_eq!(player.facing, Direction::Down);
    }

    #[test]
    fn test_short_blink_stops_at_target() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Mage);
        cast(&mut state, id, 2, Some(WILDS + Vec2::new(40.0, 0.0))).unwrap();
        assert_approx_eq!(state.players[&id].position.x, 1040.0, 1e-3);
    }

    #[test]
    fn test_volley_fires_three_arrows() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Ranger);
        cast(&mut state, id, 1, None).unwrap();
        assert_eq!(state.projectiles.len(), 3);
        assert_eq!(state.players[&id].projectiles.len(), 3);
        let mut ys: Vec<f32> = state.projectiles.values().map(|p| p.velocity.y).collect();
        ys.sort_by(|a, b| a.total_cmp(b));
        assert!(ys[0] < 0.0 && ys[2] > 0.0);
        assert_approx_eq!(ys[1], 0.0, 1e-3);
    }

    #[test]
    fn test_power_shot_pierces_further() {
        let mut state = test_state();
        let id = hero(&mut state, CharacterClass::Ranger);
        cast(&mut state, id, 2, None).unwrap();
        let arrow = state.projectiles.values().next().unwrap();
        assert_eq!(arrow.max_pierce_count, POWER_SHOT_PIERCE);
        assert_approx_eq!(arrow.damage, 24.0, 1e-3);
    }
}

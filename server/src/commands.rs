//! Applies player commands to the world.

use crate::error::CommandError;
use crate::game::GameState;
use crate::projectiles;
use crate::skills;
use log::info;
use shared::{
    distance, CharacterClass, Command, EntityId, EquipSlot, Event, ItemAction, ProjectileKind,
    Vec2,
};

pub fn apply(
    state: &mut GameState,
    player_id: EntityId,
    command: Command,
) -> Result<(), CommandError> {
    match command {
        Command::Movement {
            direction_x,
            direction_y,
        } => movement(state, player_id, direction_x, direction_y),
        Command::Attack => attack(state, player_id),
        Command::Skill { skill_id, target } => skills::cast(state, player_id, skill_id, target),
        Command::Item {
            action,
            item_id,
            slot,
        } => item_action(state, player_id, action, item_id, slot),
        Command::Exit { exit_id } => exit(state, player_id, exit_id),
    }
}

fn movement(
    state: &mut GameState,
    player_id: EntityId,
    direction_x: i8,
    direction_y: i8,
) -> Result<(), CommandError> {
    if !(-1..=1).contains(&direction_x) || !(-1..=1).contains(&direction_y) {
        return Err(CommandError::InvalidDirection(direction_x, direction_y));
    }
    let player = state
        .players
        .get_mut(&player_id)
        .ok_or(CommandError::PlayerDead)?;
    player.set_movement(direction_x, direction_y);
    Ok(())
}

/// Starts a basic attack. Warriors swing; mages and rangers also loose a
/// projectile along their facing. Does nothing while on cooldown.
fn attack(state: &mut GameState, player_id: EntityId) -> Result<(), CommandError> {
    let player = state
        .players
        .get_mut(&player_id)
        .filter(|p| p.is_alive())
        .ok_or(CommandError::PlayerDead)?;
    if !player.can_attack() {
        return Ok(());
    }
    player.begin_attack();
    match player.class {
        CharacterClass::Warrior => {}
        CharacterClass::Mage => {
            projectiles::fire(state, player_id, ProjectileKind::Fireball, Vec2::ZERO, 1.0);
        }
        CharacterClass::Ranger => {
            projectiles::fire(state, player_id, ProjectileKind::Arrow, Vec2::ZERO, 1.0);
        }
    }
    Ok(())
}

fn item_action(
    state: &mut GameState,
    player_id: EntityId,
    action: ItemAction,
    item_id: EntityId,
    slot: Option<EquipSlot>,
) -> Result<(), CommandError> {
    let player = state
        .players
        .get_mut(&player_id)
        .ok_or(CommandError::PlayerDead)?;
    match action {
        ItemAction::Equip => {
            player.equip(item_id, slot)?;
        }
        ItemAction::Unequip => {
            player.unequip(item_id)?;
        }
        ItemAction::Use => {
            player.use_item(item_id)?;
        }
        ItemAction::Drop => {
            let item = player
                .remove_from_inventory(item_id)
                .ok_or(CommandError::ItemNotInInventory(item_id))?;
            let position = player.position;
            state.drop_item(item, position);
        }
    }
    state.emit_inventory(player_id);
    Ok(())
}

/// Leaves the world through an exit the player is standing at.
fn exit(state: &mut GameState, player_id: EntityId, exit_id: u32) -> Result<(), CommandError> {
    let exit = state
        .layout
        .exit(exit_id)
        .ok_or(CommandError::UnknownExit(exit_id))?;
    let player = state
        .players
        .get(&player_id)
        .ok_or(CommandError::PlayerDead)?;
    if distance(player.position, exit.position) > exit.interaction_radius {
        return Err(CommandError::TooFarFromExit(exit_id));
    }
    info!("Player {} leaving through {}", player_id, exit.name);
    state.remove_player(player_id);
    state.emit(Event::PlayerExited {
        player_id,
        exit_id,
    });
    Ok(())
}

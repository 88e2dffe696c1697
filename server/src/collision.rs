//! Melee hit detection and item pickup.

use crate::combat::{self, Combatant};
use crate::entity::Entity;
use crate::game::GameState;
use log::debug;
use shared::{distance, CharacterClass, Direction, EntityId, Event, Rect, Vec2, PICKUP_RADIUS};

/// Box swept by a melee swing: `range` deep in the facing direction, as wide
/// as the attacker but never narrower than `range`.
pub fn attack_box(position: Vec2, size: (f32, f32), facing: Direction, range: f32) -> Rect {
    let (width, height) = size;
    let across_x = width.max(range) / 2.0;
    let across_y = height.max(range) / 2.0;
    match facing {
        Direction::Right => Rect {
            left: position.x,
            right: position.x + range,
            top: position.y - across_y,
            bottom: position.y + across_y,
        },
        Direction::Left => Rect {
            left: position.x - range,
            right: position.x,
            top: position.y - across_y,
            bottom: position.y + across_y,
        },
        Direction::Down => Rect {
            left: position.x - across_x,
            right: position.x + across_x,
            top: position.y,
            bottom: position.y + range,
        },
        Direction::Up => Rect {
            left: position.x - across_x,
            right: position.x + across_x,
            top: position.y - range,
            bottom: position.y,
        },
    }
}

pub fn can_pickup(player_position: Vec2, item_position: Vec2) -> bool {
    distance(player_position, item_position) <= PICKUP_RADIUS
}

/// Applies every swing in progress. A swing strikes each target at most once.
pub fn resolve_melee(state: &mut GameState) {
    let swings: Vec<(EntityId, Rect)> = state
        .players
        .values()
        .filter(|p| p.is_alive() && p.is_attacking && p.class == CharacterClass::Warrior)
        .map(|p| {
            (
                p.id,
                attack_box(p.position, p.size(), p.facing, p.attack_range),
            )
        })
        .collect();

    for (player_id, hitbox) in swings {
        let creatures: Vec<EntityId> = state
            .creatures
            .values()
            .filter(|c| c.is_alive() && hitbox.intersects(&c.bounds()))
            .map(|c| c.id)
            .collect();
        let players: Vec<EntityId> = state
            .players
            .values()
            .filter(|p| p.id != player_id && p.is_alive() && hitbox.intersects(&p.bounds()))
            .map(|p| p.id)
            .collect();

        let attacker = Combatant::Player(player_id);
        let targets = creatures
            .into_iter()
            .map(Combatant::Creature)
            .chain(players.into_iter().map(Combatant::Player));
        for target in targets {
            if mark_hit(state, attacker, target.id()) {
                combat::strike(state, attacker, target, 1.0);
            }
        }
    }

    let swings: Vec<(EntityId, Rect)> = state
        .creatures
        .values()
        .filter(|c| c.is_alive() && c.is_attacking)
        .map(|c| {
            (
                c.id,
                attack_box(c.position, c.size(), c.facing, c.stats.attack_range),
            )
        })
        .collect();

    for (creature_id, hitbox) in swings {
        let players: Vec<EntityId> = state
            .players
            .values()
            .filter(|p| p.is_alive() && hitbox.intersects(&p.bounds()))
            .map(|p| p.id)
            .collect();
        let attacker = Combatant::Creature(creature_id);
        for player_id in players {
            if mark_hit(state, attacker, player_id) {
                combat::strike(state, attacker, Combatant::Player(player_id), 1.0);
            }
        }
    }
}

/// Records `target` as struck by the attacker's current swing. False if it
/// already was.
fn mark_hit(state: &mut GameState, attacker: Combatant, target: EntityId) -> bool {
    match attacker {
        Combatant::Player(id) => state
            .players
            .get_mut(&id)
            .map_or(false, |p| p.is_attacking && p.swing_hits.insert(target)),
        Combatant::Creature(id) => state
            .creatures
            .get_mut(&id)
            .map_or(false, |c| c.is_attacking && c.swing_hits.insert(target)),
    }
}

/// Moves items lying within reach into their finders' inventories. Items a
/// full inventory cannot take stay on the ground.
pub fn resolve_pickups(state: &mut GameState) {
    let finders: Vec<(EntityId, Vec2)> = state
        .players
        .values()
        .filter(|p| p.is_alive())
        .map(|p| (p.id, p.position))
        .collect();

    for (player_id, position) in finders {
        let reachable: Vec<EntityId> = state
            .items
            .values()
            .filter(|item| can_pickup(position, item.position))
            .map(|item| item.id)
            .collect();

        let mut picked_any = false;
        for item_id in reachable {
            let Some(player) = state.players.get_mut(&player_id) else {
                break;
            };
            if player.inventory_full() {
                debug!("Player {} inventory full, leaving item {}", player_id, item_id);
                break;
            }
            let Some(item) = state.items.remove(&item_id) else {
                continue;
            };
            let item_name = item.name.clone();
            if let Err(item) = player.add_to_inventory(item) {
                state.items.insert(item_id, item);
                break;
            }
            picked_any = true;
            state.emit(Event::ItemPickup {
                player_id,
                item_id,
                item_name,
            });
        }
        if picked_any {
            state.emit_inventory(player_id);
        }
    }
}

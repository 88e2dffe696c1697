//! Item generation for monster and boss drops.

use crate::entity::{IdAllocator, Item};
use crate::rng::SimRng;
use shared::{ItemKind, Rarity, Stat};
use std::collections::BTreeMap;

pub const MONSTER_DROP_CHANCE: f64 = 0.75;
const LEGENDARY_CHANCE: f64 = 0.01;
const RARE_CHANCE: f64 = 0.14;
const BOSS_LEGENDARY_CHANCE: f64 = 0.2;

const EQUIPMENT_KINDS: [ItemKind; 8] = [
    ItemKind::Weapon,
    ItemKind::Helmet,
    ItemKind::Chest,
    ItemKind::Legs,
    ItemKind::Boots,
    ItemKind::Gloves,
    ItemKind::Ring,
    ItemKind::Amulet,
];

const PRIMARY_STATS: [Stat; 3] = [Stat::Strength, Stat::Intelligence, Stat::Dexterity];

const POTION_HEALING: u32 = 30;

pub fn rarity_multiplier(rarity: Rarity) -> f32 {
    match rarity {
        Rarity::Common => 1.0,
        Rarity::Rare => 1.5,
        Rarity::Legendary => 2.5,
    }
}

pub fn level_factor(level: u32) -> f32 {
    1.0 + 0.1 * level.saturating_sub(1) as f32
}

/// 1% legendary, 14% rare, otherwise common.
pub fn roll_rarity(rng: &mut SimRng) -> Rarity {
    let roll = rng.unit();
    if roll < LEGENDARY_CHANCE {
        Rarity::Legendary
    } else if roll < LEGENDARY_CHANCE + RARE_CHANCE {
        Rarity::Rare
    } else {
        Rarity::Common
    }
}

/// Boss drops are never common.
pub fn roll_boss_rarity(rng: &mut SimRng) -> Rarity {
    if rng.chance(BOSS_LEGENDARY_CHANCE) {
        Rarity::Legendary
    } else {
        Rarity::Rare
    }
}

fn scaled(base: f32, rarity: Rarity, level: u32) -> u32 {
    ((base * rarity_multiplier(rarity) * level_factor(level)).round() as u32).max(1)
}

/// A random piece of equipment of the given rarity.
pub fn generate_item(rng: &mut SimRng, ids: &mut IdAllocator, rarity: Rarity, level: u32) -> Item {
    let kind = rng
        .pick(&EQUIPMENT_KINDS)
        .copied()
        .unwrap_or(ItemKind::Weapon);

    let mut stats = BTreeMap::new();
    match kind {
        ItemKind::Weapon => {
            stats.insert(Stat::Damage, scaled(12.0, rarity, level));
        }
        ItemKind::Helmet => {
            stats.insert(Stat::Defense, scaled(2.0, rarity, level));
        }
        ItemKind::Chest => {
            stats.insert(Stat::Defense, scaled(4.0, rarity, level));
        }
        ItemKind::Legs => {
            stats.insert(Stat::Defense, scaled(3.0, rarity, level));
        }
        ItemKind::Boots | ItemKind::Gloves => {
            stats.insert(Stat::Defense, scaled(1.0, rarity, level));
        }
        ItemKind::Ring | ItemKind::Amulet => {
            let base = if kind == ItemKind::Ring { 2.0 } else { 3.0 };
            let stat = rng.pick(&PRIMARY_STATS).copied().unwrap_or(Stat::Strength);
            stats.insert(stat, scaled(base, rarity, level));
        }
        ItemKind::Potion => {}
    }

    if rarity != Rarity::Common {
        let bonus = rng.pick(&PRIMARY_STATS).copied().unwrap_or(Stat::Strength);
        *stats.entry(bonus).or_insert(0) += scaled(1.0, rarity, level);
    }

    Item::new(ids.next_id(), kind, rarity, stats)
}

pub fn healing_potion(ids: &mut IdAllocator, rarity: Rarity) -> Item {
    let mut stats = BTreeMap::new();
    stats.insert(
        Stat::Health,
        (POTION_HEALING as f32 * rarity_multiplier(rarity)).round() as u32,
    );
    Item::new(ids.next_id(), ItemKind::Potion, rarity, stats)
}

/// Drop for a slain monster: one item with 75% probability.
pub fn monster_loot(rng: &mut SimRng, ids: &mut IdAllocator, level: u32) -> Vec<Item> {
    if !rng.chance(MONSTER_DROP_CHANCE) {
        return Vec::new();
    }
    let rarity = roll_rarity(rng);
    vec![generate_item(rng, ids, rarity, level)]
}

/// Drop for a slain boss: two to four rare-or-better items and a potion.
pub fn boss_loot(rng: &mut SimRng, ids: &mut IdAllocator, level: u32) -> Vec<Item> {
    let count = rng.range_inclusive(2, 4);
    let mut items: Vec<Item> = (0..count)
        .map(|_| {
            let rarity = roll_boss_rarity(rng);
            generate_item(rng, ids, rarity, level)
        })
        .collect();
    items.push(healing_potion(ids, Rarity::Rare));
    items
}

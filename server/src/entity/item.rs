use super::Entity;
use shared::{EntityId, EquipSlot, ItemKind, ItemView, Rarity, Stat, Vec2};
use std::collections::BTreeMap;

const ITEM_SIZE: f32 = 16.0;

/// An item, either lying in the world or held by a player.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: EntityId,
    pub kind: ItemKind,
    pub rarity: Rarity,
    pub stats: BTreeMap<Stat, u32>,
    pub name: String,
    /// Meaningful only while the item is in the world.
    pub position: Vec2,
    /// World time at which the item was last dropped.
    pub dropped_at: u64,
}

impl Item {
    pub fn new(id: EntityId, kind: ItemKind, rarity: Rarity, stats: BTreeMap<Stat, u32>) -> Self {
        let name = item_name(kind, rarity, &stats);
        Self {
            id,
            kind,
            rarity,
            stats,
            name,
            position: Vec2::ZERO,
            dropped_at: 0,
        }
    }

    /// Places the item in the world at `position`.
    pub fn drop_at(&mut self, position: Vec2, now: u64) {
        self.position = position;
        self.dropped_at = now;
    }

    pub fn stat(&self, stat: Stat) -> u32 {
        self.stats.get(&stat).copied().unwrap_or(0)
    }

    pub fn is_equippable(&self) -> bool {
        !slots_for(self.kind).is_empty()
    }

    pub fn fits(&self, slot: EquipSlot) -> bool {
        slots_for(self.kind).contains(&slot)
    }

    pub fn to_view(&self) -> ItemView {
        ItemView {
            id: self.id,
            kind: self.kind,
            rarity: self.rarity,
            name: self.name.clone(),
            stats: self.stats.clone(),
            position: self.position,
        }
    }
}

impl Entity for Item {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn size(&self) -> (f32, f32) {
        (ITEM_SIZE, ITEM_SIZE)
    }
}

/// Equipment slots an item kind may occupy, in preference order.
pub fn slots_for(kind: ItemKind) -> &'static [EquipSlot] {
    match kind {
        ItemKind::Weapon => &[EquipSlot::Weapon],
        ItemKind::Helmet => &[EquipSlot::Head],
        ItemKind::Chest => &[EquipSlot::Body],
        ItemKind::Legs => &[EquipSlot::Legs],
        ItemKind::Boots => &[EquipSlot::Feet],
        ItemKind::Gloves => &[EquipSlot::Hands],
        ItemKind::Ring => &[EquipSlot::Ring1, EquipSlot::Ring2],
        ItemKind::Amulet => &[EquipSlot::Amulet],
        ItemKind::Potion => &[],
    }
}

/// Highest-valued stat. Ties go to the stat declared first.
pub fn dominant_stat(stats: &BTreeMap<Stat, u32>) -> Option<Stat> {
    let mut best: Option<(Stat, u32)> = None;
    for (stat, value) in stats {
        if best.map_or(true, |(_, v)| *value > v) {
            best = Some((*stat, *value));
        }
    }
    best.map(|(stat, _)| stat)
}

pub fn item_name(kind: ItemKind, rarity: Rarity, stats: &BTreeMap<Stat, u32>) -> String {
    if kind == ItemKind::Potion {
        return match rarity {
            Rarity::Common => "Healing Potion".to_string(),
            Rarity::Rare => "Greater Healing Potion".to_string(),
            Rarity::Legendary => "Supreme Healing Potion".to_string(),
        };
    }

    let prefix = match rarity {
        Rarity::Common => "Plain",
        Rarity::Rare => "Fine",
        Rarity::Legendary => "Legendary",
    };
    let base = match kind {
        ItemKind::Weapon => "Sword",
        ItemKind::Helmet => "Helm",
        ItemKind::Chest => "Chestplate",
        ItemKind::Legs => "Greaves",
        ItemKind::Boots => "Boots",
        ItemKind::Gloves => "Gauntlets",
        ItemKind::Ring => "Ring",
        ItemKind::Amulet => "Amulet",
        ItemKind::Potion => "Potion",
    };
    let suffix = match dominant_stat(stats) {
        Some(Stat::Damage) => " of Slaying",
        Some(Stat::Defense) => " of Warding",
        Some(Stat::Strength) => " of Might",
        Some(Stat::Intelligence) => " of Wisdom",
        Some(Stat::Dexterity) => " of Agility",
        Some(Stat::Health) => " of Vitality",
        None => "",
    };
    format!("{} {}{}", prefix, base, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pairs: &[(Stat, u32)]) -> BTreeMap<Stat, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_item_names() {
        let sword = Item::new(1, ItemKind::Weapon, Rarity::Rare, stats(&[(Stat::Damage, 12)]));
        assert_eq!(sword.name, "Fine Sword of Slaying");

        let ring = Item::new(
            2,
            ItemKind::Ring,
            Rarity::Legendary,
            stats(&[(Stat::Strength, 3), (Stat::Dexterity, 5)]),
        );
        assert_eq!(ring.name, "Legendary Ring of Agility");

        let potion = Item::new(3, ItemKind::Potion, Rarity::Common, stats(&[(Stat::Health, 30)]));
        assert_eq!(potion.name, "Healing Potion");
    }

    #[test]
    fn test_dominant_stat_tie_prefers_first() {
        let s = stats(&[(Stat::Defense, 4), (Stat::Strength, 4)]);
        assert_eq!(dominant_stat(&s), Some(Stat::Defense));
        assert_eq!(dominant_stat(&BTreeMap::new()), None);
    }

    #[test]
    fn test_slot_mapping() {
        let ring = Item::new(1, ItemKind::Ring, Rarity::Common, BTreeMap::new());
        assert!(ring.fits(EquipSlot::Ring1));
        assert!(ring.fits(EquipSlot::Ring2));
        assert!(!ring.fits(EquipSlot::Amulet));

        let helmet = Item::new(2, ItemKind::Helmet, Rarity::Common, BTreeMap::new());
        assert!(helmet.fits(EquipSlot::Head));
        assert!(!helmet.fits(EquipSlot::Body));

        let potion = Item::new(3, ItemKind::Potion, Rarity::Common, BTreeMap::new());
        assert!(!potion.is_equippable());
    }
}

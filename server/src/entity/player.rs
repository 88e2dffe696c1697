use super::{Entity, Item};
use crate::config::{ClassStats, LevelGrowth};
use crate::error::CommandError;
use shared::{
    CharacterClass, Direction, EntityId, EquipSlot, Event, ItemKind, PlayerView, Stat, Vec2,
    INVENTORY_CAPACITY, PLAYER_SIZE,
};
use std::collections::{BTreeMap, BTreeSet};

/// Base damage of a player without a weapon.
pub const UNARMED_DAMAGE: u32 = 10;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: EntityId,
    pub name: String,
    pub class: CharacterClass,
    pub position: Vec2,
    pub velocity: Vec2,
    pub facing: Direction,

    pub health: u32,
    pub max_health: u32,
    pub level: u32,
    pub experience: u32,

    pub strength: u32,
    pub intelligence: u32,
    pub dexterity: u32,
    pub base_defense: u32,
    pub movement_speed: f32,
    pub attack_speed_ms: u32,
    pub attack_duration_ms: u32,
    pub attack_range: f32,

    pub is_attacking: bool,
    /// Remaining ms until the next basic attack is allowed.
    pub attack_cooldown: u32,
    /// Remaining ms of the current swing.
    pub attack_duration: u32,
    /// Targets already struck by the current swing.
    pub swing_hits: BTreeSet<EntityId>,
    pub skill_cooldowns: BTreeMap<u8, u32>,

    pub inventory: Vec<Item>,
    pub equipment: BTreeMap<EquipSlot, Item>,
    /// Live projectiles fired by this player.
    pub projectiles: Vec<EntityId>,

    growth: LevelGrowth,
}

impl Player {
    pub fn new(
        id: EntityId,
        name: String,
        class: CharacterClass,
        stats: &ClassStats,
        position: Vec2,
    ) -> Self {
        Self {
            id,
            name,
            class,
            position,
            velocity: Vec2::ZERO,
            facing: Direction::default(),
            health: stats.max_health,
            max_health: stats.max_health,
            level: 1,
            experience: 0,
            strength: stats.strength,
            intelligence: stats.intelligence,
            dexterity: stats.dexterity,
            base_defense: stats.defense,
            movement_speed: stats.movement_speed,
            attack_speed_ms: stats.attack_speed_ms,
            attack_duration_ms: stats.attack_duration_ms,
            attack_range: stats.attack_range,
            is_attacking: false,
            attack_cooldown: 0,
            attack_duration: 0,
            swing_hits: BTreeSet::new(),
            skill_cooldowns: BTreeMap::new(),
            inventory: Vec::new(),
            equipment: BTreeMap::new(),
            projectiles: Vec::new(),
            growth: stats.growth,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Sum of `stat` over all equipped items.
    pub fn equipment_bonus(&self, stat: Stat) -> u32 {
        self.equipment.values().map(|item| item.stat(stat)).sum()
    }

    /// Strength, intelligence or dexterity depending on class, including gear.
    pub fn primary_stat(&self) -> u32 {
        match self.class {
            CharacterClass::Warrior => self.strength + self.equipment_bonus(Stat::Strength),
            CharacterClass::Mage => self.intelligence + self.equipment_bonus(Stat::Intelligence),
            CharacterClass::Ranger => self.dexterity + self.equipment_bonus(Stat::Dexterity),
        }
    }

    pub fn defense(&self) -> u32 {
        self.base_defense + self.equipment_bonus(Stat::Defense)
    }

    /// Damage stat of the equipped weapon, or [`UNARMED_DAMAGE`].
    pub fn base_damage(&self) -> u32 {
        self.equipment
            .get(&EquipSlot::Weapon)
            .map(|weapon| weapon.stat(Stat::Damage))
            .filter(|damage| *damage > 0)
            .unwrap_or(UNARMED_DAMAGE)
    }

    /// Returns the health left.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.health = self.health.saturating_sub(amount);
        self.health
    }

    /// Returns the amount actually restored.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.health;
        self.health = (self.health + amount).min(self.max_health);
        self.health - before
    }

    pub fn xp_to_next_level(&self) -> u32 {
        100 * self.level
    }

    /// Adds experience and applies any level-ups. Returns the number of levels
    /// gained.
    pub fn add_experience(&mut self, amount: u32) -> u32 {
        self.experience += amount;
        let mut gained = 0;
        while self.experience >= self.xp_to_next_level() {
            self.experience -= self.xp_to_next_level();
            self.level += 1;
            self.strength += self.growth.strength;
            self.intelligence += self.growth.intelligence;
            self.dexterity += self.growth.dexterity;
            self.base_defense += self.growth.defense;
            self.max_health += self.growth.health;
            gained += 1;
        }
        if gained > 0 {
            self.health = self.max_health;
        }
        gained
    }

    pub fn set_movement(&mut self, direction_x: i8, direction_y: i8) {
        let direction = Vec2::new(direction_x as f32, direction_y as f32).normalize();
        self.velocity = direction * self.movement_speed;
        if let Some(facing) = Direction::from_vector(direction) {
            self.facing = facing;
        }
    }

    /// Moves the player and counts down its timers.
    pub fn advance(&mut self, dt_ms: u32, width: f32, height: f32) {
        let dt = dt_ms as f32 / 1000.0;
        self.position = (self.position + self.velocity * dt).clamp_to(width, height);

        self.attack_cooldown = self.attack_cooldown.saturating_sub(dt_ms);
        if self.attack_duration > 0 {
            self.attack_duration = self.attack_duration.saturating_sub(dt_ms);
            if self.attack_duration == 0 {
                self.is_attacking = false;
            }
        }

        for remaining in self.skill_cooldowns.values_mut() {
            *remaining = remaining.saturating_sub(dt_ms);
        }
        self.skill_cooldowns.retain(|_, remaining| *remaining > 0);
    }

    pub fn can_attack(&self) -> bool {
        self.is_alive() && self.attack_cooldown == 0
    }

    /// Starts a basic attack swing and its cooldown.
    pub fn begin_attack(&mut self) {
        self.is_attacking = true;
        self.attack_duration = self.attack_duration_ms;
        self.attack_cooldown = self.attack_speed_ms;
        self.swing_hits.clear();
    }

    pub fn skill_remaining(&self, skill_id: u8) -> u32 {
        self.skill_cooldowns.get(&skill_id).copied().unwrap_or(0)
    }

    pub fn start_skill_cooldown(&mut self, skill_id: u8, cooldown_ms: u32) {
        if cooldown_ms > 0 {
            self.skill_cooldowns.insert(skill_id, cooldown_ms);
        }
    }

    pub fn inventory_full(&self) -> bool {
        self.inventory.len() >= INVENTORY_CAPACITY
    }

    /// Hands the item back when the inventory is full.
    pub fn add_to_inventory(&mut self, item: Item) -> Result<(), Item> {
        if self.inventory_full() {
            return Err(item);
        }
        self.inventory.push(item);
        Ok(())
    }

    pub fn remove_from_inventory(&mut self, item_id: EntityId) -> Option<Item> {
        let index = self.inventory.iter().position(|item| item.id == item_id)?;
        Some(self.inventory.remove(index))
    }

    /// Moves an inventory item into an equipment slot. Whatever occupied the
    /// slot goes back into the inventory.
    pub fn equip(
        &mut self,
        item_id: EntityId,
        slot: Option<EquipSlot>,
    ) -> Result<EquipSlot, CommandError> {
        let index = self
            .inventory
            .iter()
            .position(|item| item.id == item_id)
            .ok_or(CommandError::ItemNotInInventory(item_id))?;
        let item = &self.inventory[index];
        if !item.is_equippable() {
            return Err(CommandError::NotEquippable(item_id));
        }

        let slot = match slot {
            Some(slot) if item.fits(slot) => slot,
            Some(slot) => {
                return Err(CommandError::InvalidSlot {
                    kind: item.kind,
                    slot,
                })
            }
            None => {
                let fitting = super::item::slots_for(item.kind);
                fitting
                    .iter()
                    .copied()
                    .find(|slot| !self.equipment.contains_key(slot))
                    .unwrap_or(fitting[0])
            }
        };

        let item = self.inventory.remove(index);
        if let Some(previous) = self.equipment.insert(slot, item) {
            self.inventory.push(previous);
        }
        Ok(slot)
    }

    pub fn unequip(&mut self, item_id: EntityId) -> Result<EquipSlot, CommandError> {
        let slot = self
            .equipment
            .iter()
            .find(|(_, item)| item.id == item_id)
            .map(|(slot, _)| *slot)
            .ok_or(CommandError::ItemNotEquipped(item_id))?;
        if self.inventory_full() {
            return Err(CommandError::InventoryFull);
        }
        if let Some(item) = self.equipment.remove(&slot) {
            self.inventory.push(item);
        }
        Ok(slot)
    }

    /// Consumes a potion. Returns the health restored.
    pub fn use_item(&mut self, item_id: EntityId) -> Result<u32, CommandError> {
        let item = self
            .inventory
            .iter()
            .find(|item| item.id == item_id)
            .ok_or(CommandError::ItemNotInInventory(item_id))?;
        if item.kind != ItemKind::Potion {
            return Err(CommandError::NotUsable(item_id));
        }
        let amount = item.stat(Stat::Health);
        self.remove_from_inventory(item_id);
        Ok(self.heal(amount))
    }

    pub fn take_equipment(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.equipment).into_values().collect()
    }

    pub fn take_inventory(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.inventory)
    }

    pub fn respawn(&mut self, position: Vec2) {
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.health = self.max_health;
        self.is_attacking = false;
        self.attack_cooldown = 0;
        self.attack_duration = 0;
        self.swing_hits.clear();
    }

    pub fn to_view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            class: self.class,
            position: self.position,
            facing: self.facing,
            health: self.health,
            max_health: self.max_health,
            level: self.level,
            experience: self.experience,
            is_attacking: self.is_attacking,
            skill_cooldowns: self
                .skill_cooldowns
                .iter()
                .map(|(id, remaining)| (*id, *remaining))
                .collect(),
        }
    }

    pub fn inventory_event(&self) -> Event {
        Event::InventoryUpdate {
            player_id: self.id,
            inventory: self.inventory.iter().map(Item::to_view).collect(),
            equipment: self
                .equipment
                .iter()
                .map(|(slot, item)| (*slot, item.to_view()))
                .collect(),
        }
    }
}

impl Entity for Player {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn size(&self) -> (f32, f32) {
        (PLAYER_SIZE, PLAYER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Rarity, Stat};

    fn warrior() -> Player {
        let stats = ClassStats::standard(CharacterClass::Warrior);
        Player::new(1, "Brak".to_string(), CharacterClass::Warrior, &stats, Vec2::new(100.0, 100.0))
    }

    fn item(id: EntityId, kind: ItemKind, stat: Stat, value: u32) -> Item {
        Item::new(id, kind, Rarity::Common, [(stat, value)].into_iter().collect())
    }

    #[test]
    fn test_new_player_uses_class_stats() {
        let player = warrior();
        assert_eq!(player.health, 120);
        assert_eq!(player.max_health, 120);
        assert_eq!(player.level, 1);
        assert_eq!(player.primary_stat(), 5);
        assert_eq!(player.base_damage(), UNARMED_DAMAGE);
    }

    #[test]
    fn test_damage_and_heal_stay_in_bounds() {
        let mut player = warrior();
        assert_eq!(player.take_damage(50), 70);
        assert_eq!(player.heal(500), 50);
        assert_eq!(player.health, player.max_health);
        assert_eq!(player.take_damage(1000), 0);
        assert!(!player.is_alive());
    }

    #[test]
    fn test_level_up_carries_remainder() {
        let mut player = warrior();
        player.take_damage(30);
        let gained = player.add_experience(130);
        assert_eq!(gained, 1);
        assert_eq!(player.level, 2);
        assert_eq!(player.experience, 30);
        assert_eq!(player.strength, 7);
        assert_eq!(player.max_health, 132);
        assert_eq!(player.health, 132);
    }

    #[test]
    fn test_multiple_level_ups() {
        let mut player = warrior();
        // 100 for level 2, 200 for level 3
        assert_eq!(player.add_experience(310), 2);
        assert_eq!(player.level, 3);
        assert_eq!(player.experience, 10);
    }

    #[test]
    fn test_movement_sets_velocity_and_facing() {
        let mut player = warrior();
        player.set_movement(-1, 0);
        assert_eq!(player.velocity, Vec2::new(-150.0, 0.0));
        assert_eq!(player.facing, Direction::Left);

        player.advance(1000, 2000.0, 2000.0);
        assert_eq!(player.position, Vec2::new(0.0, 100.0));

        player.set_movement(0, 0);
        assert_eq!(player.velocity, Vec2::ZERO);
        assert_eq!(player.facing, Direction::Left);
    }

    #[test]
    fn test_attack_timers() {
        let mut player = warrior();
        assert!(player.can_attack());
        player.begin_attack();
        assert!(player.is_attacking);
        assert!(!player.can_attack());

        player.advance(200, 2000.0, 2000.0);
        assert!(!player.is_attacking);
        assert!(!player.can_attack());

        player.advance(300, 2000.0, 2000.0);
        assert!(player.can_attack());
    }

    #[test]
    fn test_skill_cooldowns_expire() {
        let mut player = warrior();
        player.start_skill_cooldown(1, 100);
        assert_eq!(player.skill_remaining(1), 100);
        player.advance(50, 2000.0, 2000.0);
        assert_eq!(player.skill_remaining(1), 50);
        player.advance(50, 2000.0, 2000.0);
        assert_eq!(player.skill_remaining(1), 0);
        assert!(player.skill_cooldowns.is_empty());
    }

    #[test]
    fn test_inventory_capacity() {
        let mut player = warrior();
        for id in 0..INVENTORY_CAPACITY as u64 {
            assert!(player
                .add_to_inventory(item(id + 10, ItemKind::Boots, Stat::Defense, 1))
                .is_ok());
        }
        let rejected = player.add_to_inventory(item(99, ItemKind::Boots, Stat::Defense, 1));
        assert_eq!(rejected.unwrap_err().id, 99);
        assert_eq!(player.inventory.len(), INVENTORY_CAPACITY);
    }

    #[test]
    fn test_equip_weapon_changes_damage() {
        let mut player = warrior();
        player
            .add_to_inventory(item(5, ItemKind::Weapon, Stat::Damage, 18))
            .unwrap();
        assert_eq!(player.equip(5, None), Ok(EquipSlot::Weapon));
        assert_eq!(player.base_damage(), 18);
        assert!(player.inventory.is_empty());
    }

    #[test]
    fn test_equip_swaps_previous_item() {
        let mut player = warrior();
        player.add_to_inventory(item(5, ItemKind::Helmet, Stat::Defense, 2)).unwrap();
        player.add_to_inventory(item(6, ItemKind::Helmet, Stat::Defense, 4)).unwrap();
        player.equip(5, None).unwrap();
        player.equip(6, None).unwrap();
        assert_eq!(player.equipment[&EquipSlot::Head].id, 6);
        assert_eq!(player.inventory.len(), 1);
        assert_eq!(player.inventory[0].id, 5);
        assert_eq!(player.defense(), 3 + 4);
    }

    #[test]
    fn test_rings_fill_both_slots() {
        let mut player = warrior();
        player.add_to_inventory(item(5, ItemKind::Ring, Stat::Strength, 1)).unwrap();
        player.add_to_inventory(item(6, ItemKind::Ring, Stat::Strength, 2)).unwrap();
        assert_eq!(player.equip(5, None), Ok(EquipSlot::Ring1));
        assert_eq!(player.equip(6, None), Ok(EquipSlot::Ring2));
        assert_eq!(player.primary_stat(), 5 + 3);
    }

    #[test]
    fn test_equip_rejects_wrong_slot() {
        let mut player = warrior();
        player.add_to_inventory(item(5, ItemKind::Boots, Stat::Defense, 1)).unwrap();
        assert_eq!(
            player.equip(5, Some(EquipSlot::Head)),
            Err(CommandError::InvalidSlot {
                kind: ItemKind::Boots,
                slot: EquipSlot::Head
            })
        );
        assert_eq!(player.inventory.len(), 1);
        assert_eq!(player.equip(77, None), Err(CommandError::ItemNotInInventory(77)));
    }

    #[test]
    fn test_unequip_needs_room() {
        let mut player = warrior();
        player.add_to_inventory(item(5, ItemKind::Weapon, Stat::Damage, 12)).unwrap();
        player.equip(5, None).unwrap();
        for id in 0..INVENTORY_CAPACITY as u64 {
            player
                .add_to_inventory(item(id + 10, ItemKind::Boots, Stat::Defense, 1))
                .unwrap();
        }
        assert_eq!(player.unequip(5), Err(CommandError::InventoryFull));
        assert!(player.equipment.contains_key(&EquipSlot::Weapon));

        player.remove_from_inventory(10);
        assert_eq!(player.unequip(5), Ok(EquipSlot::Weapon));
        assert_eq!(player.base_damage(), UNARMED_DAMAGE);
    }

    #[test]
    fn test_use_potion() {
        let mut player = warrior();
        player.take_damage(50);
        player.add_to_inventory(item(5, ItemKind::Potion, Stat::Health, 30)).unwrap();
        player.add_to_inventory(item(6, ItemKind::Boots, Stat::Defense, 1)).unwrap();
        assert_eq!(player.use_item(5), Ok(30));
        assert_eq!(player.health, 100);
        assert_eq!(player.use_item(6), Err(CommandError::NotUsable(6)));
        assert_eq!(player.inventory.len(), 1);
    }

    #[test]
    fn test_respawn_restores_health() {
        let mut player = warrior();
        player.take_damage(500);
        player.respawn(Vec2::new(10.0, 10.0));
        assert!(player.is_alive());
        assert_eq!(player.health, player.max_health);
        assert_eq!(player.position, Vec2::new(10.0, 10.0));
    }
}

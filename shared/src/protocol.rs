//! Wire protocol: the commands a session may send, the events and snapshots
//! the world publishes, and the packets that carry them over UDP.

use crate::layout::WorldLayout;
use crate::math::{Direction, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type EntityId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Mage,
    Ranger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Wolf,
    Bear,
    Goblin,
    Spider,
    Slime,
    Zombie,
    Skeleton,
    Bandit,
    Troll,
    Harpy,
    AncientTreant,
    BogHydra,
    LichKing,
    FrostDragon,
}

impl Species {
    pub fn name(self) -> &'static str {
        match self {
            Species::Wolf => "Wolf",
            Species::Bear => "Bear",
            Species::Goblin => "Goblin",
            Species::Spider => "Spider",
            Species::Slime => "Slime",
            Species::Zombie => "Zombie",
            Species::Skeleton => "Skeleton",
            Species::Bandit => "Bandit",
            Species::Troll => "Troll",
            Species::Harpy => "Harpy",
            Species::AncientTreant => "Ancient Treant",
            Species::BogHydra => "Bog Hydra",
            Species::LichKing => "Lich King",
            Species::FrostDragon => "Frost Dragon",
        }
    }
}

/// Monster and boss share one record; this is the discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreatureKind {
    Monster,
    Boss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CreatureState {
    #[default]
    Idle,
    Patrol,
    Chase,
    Attack,
    Flee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    Weapon,
    Helmet,
    Chest,
    Legs,
    Boots,
    Gloves,
    Ring,
    Amulet,
    Potion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Head,
    Body,
    Legs,
    Feet,
    Hands,
    Ring1,
    Ring2,
    Amulet,
}

impl EquipSlot {
    pub const ALL: [EquipSlot; 9] = [
        EquipSlot::Weapon,
        EquipSlot::Head,
        EquipSlot::Body,
        EquipSlot::Legs,
        EquipSlot::Feet,
        EquipSlot::Hands,
        EquipSlot::Ring1,
        EquipSlot::Ring2,
        EquipSlot::Amulet,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stat {
    Damage,
    Defense,
    Strength,
    Intelligence,
    Dexterity,
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    Fireball,
    Arrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemAction {
    Equip,
    Unequip,
    Drop,
    Use,
}

/// Input a session submits to its world. Applied at the start of the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Movement {
        direction_x: i8,
        direction_y: i8,
    },
    Attack,
    Skill {
        skill_id: u8,
        target: Option<Vec2>,
    },
    Item {
        action: ItemAction,
        item_id: EntityId,
        slot: Option<EquipSlot>,
    },
    Exit {
        exit_id: u32,
    },
}

/// Discrete things that happened during a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Combat {
        attacker_id: EntityId,
        target_id: EntityId,
        damage: u32,
        target_health: u32,
    },
    ItemPickup {
        player_id: EntityId,
        item_id: EntityId,
        item_name: String,
    },
    InventoryUpdate {
        player_id: EntityId,
        inventory: Vec<ItemView>,
        equipment: Vec<(EquipSlot, ItemView)>,
    },
    LevelUp {
        player_id: EntityId,
        level: u32,
    },
    BossSpawn {
        boss_id: EntityId,
        species: Species,
        position: Vec2,
        landmark: String,
    },
    BossPhase {
        boss_id: EntityId,
        phase: u8,
    },
    BossKill {
        boss_id: EntityId,
        species: Species,
        killer_id: EntityId,
        killer_name: String,
    },
    CreatureRespawn {
        creature_id: EntityId,
        position: Vec2,
    },
    PlayerDeath {
        player_id: EntityId,
        killer_id: Option<EntityId>,
        position: Vec2,
    },
    PlayerRespawn {
        player_id: EntityId,
        position: Vec2,
        health: u32,
    },
    PlayerExited {
        player_id: EntityId,
        exit_id: u32,
    },
    Explosion {
        position: Vec2,
        radius: f32,
    },
    CommandRejected {
        player_id: EntityId,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: EntityId,
    pub name: String,
    pub class: CharacterClass,
    pub position: Vec2,
    pub facing: Direction,
    pub health: u32,
    pub max_health: u32,
    pub level: u32,
    pub experience: u32,
    pub is_attacking: bool,
    pub skill_cooldowns: Vec<(u8, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureView {
    pub id: EntityId,
    pub species: Species,
    pub kind: CreatureKind,
    pub position: Vec2,
    pub facing: Direction,
    pub health: u32,
    pub max_health: u32,
    pub state: CreatureState,
    pub is_attacking: bool,
    pub phase: Option<u8>,
    pub is_using_special_attack: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: EntityId,
    pub kind: ItemKind,
    pub rarity: Rarity,
    pub name: String,
    pub stats: BTreeMap<Stat, u32>,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub id: EntityId,
    pub owner_id: EntityId,
    pub kind: ProjectileKind,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Full world state after one tick. Dead creatures awaiting respawn are left
/// out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub world_time_ms: u64,
    pub players: Vec<PlayerView>,
    pub creatures: Vec<CreatureView>,
    pub items: Vec<ItemView>,
    pub projectiles: Vec<ProjectileView>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
        class: CharacterClass,
    },
    Command {
        sequence: u32,
        command: Command,
    },
    Heartbeat,
    Disconnect,

    Connected {
        player_id: EntityId,
        world_id: u32,
        layout: WorldLayout,
    },
    Snapshot {
        timestamp: u64,
        snapshot: Snapshot,
    },
    Events {
        tick: u64,
        events: Vec<Event>,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_serialization_command() {
        let packet = Packet::Command {
            sequence: 7,
            command: Command::Skill {
                skill_id: 1,
                target: Some(Vec2::new(10.0, 20.0)),
            },
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Command { sequence, command } => {
                assert_eq!(sequence, 7);
                assert_eq!(
                    command,
                    Command::Skill {
                        skill_id: 1,
                        target: Some(Vec2::new(10.0, 20.0)),
                    }
                );
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_snapshot() {
        let mut stats = BTreeMap::new();
        stats.insert(Stat::Damage, 12);

        let snapshot = Snapshot {
            tick: 42,
            world_time_ms: 2100,
            players: vec![PlayerView {
                id: 1,
                name: "Ayla".to_string(),
                class: CharacterClass::Ranger,
                position: Vec2::new(100.0, 200.0),
                facing: Direction::Left,
                health: 80,
                max_health: 100,
                level: 3,
                experience: 40,
                is_attacking: false,
                skill_cooldowns: vec![(1, 1500)],
            }],
            creatures: vec![],
            items: vec![ItemView {
                id: 9,
                kind: ItemKind::Weapon,
                rarity: Rarity::Rare,
                name: "Fine Sword of Slaying".to_string(),
                stats,
                position: Vec2::new(5.0, 5.0),
            }],
            projectiles: vec![],
        };

        let packet = Packet::Snapshot {
            timestamp: 123456789,
            snapshot: snapshot.clone(),
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Snapshot {
                timestamp,
                snapshot: decoded,
            } => {
                assert_eq!(timestamp, 123456789);
                assert_eq!(decoded, snapshot);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_species_names() {
        assert_eq!(Species::Wolf.name(), "Wolf");
        assert_eq!(Species::FrostDragon.name(), "Frost Dragon");
    }
}

//! Static world configuration.
//!
//! Everything a world needs to know at creation time lives in [`WorldConfig`]:
//! dimensions, tick rate, class and species tables, biome profiles, boss
//! settings and the world item policy. The defaults describe the standard game;
//! a JSON file can override any subset of fields.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use shared::{
    BiomeKind, CharacterClass, LandmarkKind, Species, DEFAULT_WORLD_HEIGHT, DEFAULT_WORLD_WIDTH,
    TICK_INTERVAL_MS,
};
use std::collections::BTreeMap;
use std::path::Path;

/// Upper bounds on generated features per world.
pub const MAX_BIOMES: usize = 256;
pub const MAX_LANDMARKS: usize = 1024;

/// Per-level stat gains of a class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelGrowth {
    pub health: u32,
    pub strength: u32,
    pub intelligence: u32,
    pub dexterity: u32,
    pub defense: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub max_health: u32,
    pub strength: u32,
    pub intelligence: u32,
    pub dexterity: u32,
    pub defense: u32,
    /// Pixels per second.
    pub movement_speed: f32,
    /// Minimum time between basic attacks.
    pub attack_speed_ms: u32,
    pub attack_duration_ms: u32,
    pub attack_range: f32,
    pub growth: LevelGrowth,
}

impl ClassStats {
    pub fn standard(class: CharacterClass) -> Self {
        match class {
            CharacterClass::Warrior => ClassStats {
                max_health: 120,
                strength: 5,
                intelligence: 1,
                dexterity: 2,
                defense: 3,
                movement_speed: 150.0,
                attack_speed_ms: 500,
                attack_duration_ms: 200,
                attack_range: 40.0,
                growth: LevelGrowth {
                    health: 12,
                    strength: 2,
                    intelligence: 0,
                    dexterity: 1,
                    defense: 1,
                },
            },
            CharacterClass::Mage => ClassStats {
                max_health: 80,
                strength: 1,
                intelligence: 6,
                dexterity: 2,
                defense: 1,
                movement_speed: 140.0,
                attack_speed_ms: 800,
                attack_duration_ms: 250,
                attack_range: 40.0,
                growth: LevelGrowth {
                    health: 6,
                    strength: 0,
                    intelligence: 2,
                    dexterity: 1,
                    defense: 0,
                },
            },
            CharacterClass::Ranger => ClassStats {
                max_health: 100,
                strength: 2,
                intelligence: 1,
                dexterity: 6,
                defense: 2,
                movement_speed: 160.0,
                attack_speed_ms: 600,
                attack_duration_ms: 200,
                attack_range: 40.0,
                growth: LevelGrowth {
                    health: 8,
                    strength: 1,
                    intelligence: 0,
                    dexterity: 2,
                    defense: 1,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesStats {
    pub max_health: u32,
    pub damage: u32,
    pub defense: u32,
    pub movement_speed: f32,
    pub aggro_range: f32,
    pub attack_range: f32,
    pub attack_speed_ms: u32,
    pub attack_duration_ms: u32,
    pub leash_range: f32,
    /// Zero for bosses, which never respawn.
    pub time_to_respawn_ms: u64,
    pub xp_reward: u32,
    pub size: f32,
}

impl SpeciesStats {
    pub fn standard(species: Species) -> Self {
        // health, damage, defense, speed, aggro, reach, attack speed, swing,
        // leash, respawn, xp, size
        let row: (u32, u32, u32, f32, f32, f32, u32, u32, f32, u64, u32, f32) = match species {
            Species::Wolf => (40, 8, 1, 110.0, 200.0, 30.0, 1000, 300, 400.0, 10_000, 20, 28.0),
            Species::Bear => (90, 14, 3, 80.0, 150.0, 35.0, 1500, 400, 350.0, 20_000, 45, 40.0),
            Species::Goblin => (50, 9, 2, 100.0, 180.0, 30.0, 1100, 300, 400.0, 12_000, 25, 28.0),
            Species::Spider => (35, 7, 0, 120.0, 160.0, 28.0, 900, 250, 350.0, 9_000, 18, 24.0),
            Species::Slime => (60, 6, 2, 60.0, 120.0, 25.0, 1200, 300, 300.0, 8_000, 15, 28.0),
            Species::Zombie => (70, 11, 2, 60.0, 140.0, 30.0, 1400, 400, 350.0, 15_000, 30, 32.0),
            Species::Skeleton => {
                (70, 12, 3, 90.0, 200.0, 32.0, 1100, 300, 400.0, 15_000, 35, 32.0)
            }
            Species::Bandit => (80, 13, 3, 105.0, 220.0, 32.0, 1000, 300, 450.0, 15_000, 40, 32.0),
            Species::Troll => (160, 18, 5, 70.0, 180.0, 40.0, 1800, 500, 350.0, 30_000, 80, 48.0),
            Species::Harpy => (55, 10, 1, 140.0, 240.0, 30.0, 900, 250, 500.0, 12_000, 35, 28.0),
            Species::AncientTreant => (500, 22, 6, 60.0, 300.0, 50.0, 1600, 500, 600.0, 0, 500, 64.0),
            Species::BogHydra => (550, 24, 5, 70.0, 300.0, 50.0, 1500, 500, 600.0, 0, 550, 64.0),
            Species::LichKing => (450, 28, 4, 80.0, 320.0, 50.0, 1400, 450, 600.0, 0, 600, 56.0),
            Species::FrostDragon => (650, 30, 7, 90.0, 350.0, 60.0, 1700, 600, 700.0, 0, 800, 72.0),
        };
        SpeciesStats {
            max_health: row.0,
            damage: row.1,
            defense: row.2,
            movement_speed: row.3,
            aggro_range: row.4,
            attack_range: row.5,
            attack_speed_ms: row.6,
            attack_duration_ms: row.7,
            leash_range: row.8,
            time_to_respawn_ms: row.9,
            xp_reward: row.10,
            size: row.11,
        }
    }
}

/// How a biome kind is populated and decorated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeProfile {
    /// Relative chance of this kind when rolling a biome.
    pub weight: f32,
    pub monster_table: Vec<Species>,
    /// Monsters per square pixel.
    pub monster_density: f32,
    pub danger_level: u32,
    pub landmarks: Vec<LandmarkKind>,
    pub boss: Species,
}

impl BiomeProfile {
    pub fn standard(kind: BiomeKind) -> Self {
        match kind {
            BiomeKind::Forest => BiomeProfile {
                weight: 0.4,
                monster_table: vec![Species::Wolf, Species::Bear, Species::Goblin],
                monster_density: 0.00004,
                danger_level: 1,
                landmarks: vec![
                    LandmarkKind::AncientTree,
                    LandmarkKind::HuntersCamp,
                    LandmarkKind::StoneCircle,
                ],
                boss: Species::AncientTreant,
            },
            BiomeKind::Swamp => BiomeProfile {
                weight: 0.3,
                monster_table: vec![Species::Spider, Species::Slime, Species::Zombie],
                monster_density: 0.00005,
                danger_level: 2,
                landmarks: vec![
                    LandmarkKind::WitchHut,
                    LandmarkKind::SunkenTemple,
                    LandmarkKind::BogShrine,
                ],
                boss: Species::BogHydra,
            },
            BiomeKind::Ruins => BiomeProfile {
                weight: 0.2,
                monster_table: vec![Species::Skeleton, Species::Bandit, Species::Zombie],
                monster_density: 0.00006,
                danger_level: 3,
                landmarks: vec![
                    LandmarkKind::BrokenTower,
                    LandmarkKind::Crypt,
                    LandmarkKind::Colosseum,
                ],
                boss: Species::LichKing,
            },
            BiomeKind::Mountains => BiomeProfile {
                weight: 0.1,
                monster_table: vec![Species::Troll, Species::Harpy, Species::Wolf],
                monster_density: 0.00003,
                danger_level: 4,
                landmarks: vec![
                    LandmarkKind::DragonPeak,
                    LandmarkKind::FrozenCave,
                    LandmarkKind::Watchtower,
                ],
                boss: Species::FrostDragon,
            },
        }
    }
}

/// Phase ladder and special attack tuning shared by all bosses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossProfile {
    /// Health fractions, strictly decreasing. Dropping below entry `i` moves
    /// the boss into phase `i + 1`.
    pub phase_thresholds: Vec<f32>,
    pub damage_buff_per_phase: f32,
    pub attack_speed_buff_per_phase: f32,
    pub movement_buff_per_phase: f32,
    pub defense_per_phase: u32,
    pub base_special_chance: f64,
    pub special_chance_per_phase: f64,
    pub special_cooldown_ms: u32,
}

impl Default for BossProfile {
    fn default() -> Self {
        BossProfile {
            phase_thresholds: vec![0.65, 0.4, 0.15],
            damage_buff_per_phase: 0.2,
            attack_speed_buff_per_phase: 0.1,
            movement_buff_per_phase: 0.1,
            defense_per_phase: 2,
            base_special_chance: 0.15,
            special_chance_per_phase: 0.1,
            special_cooldown_ms: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub tick_interval_ms: u64,
    pub max_players: usize,
    /// Fixed seed for world generation and simulation; random when absent.
    pub seed: Option<u64>,

    pub biome_area: f32,
    pub biome_radius: f32,
    pub landmark_density: f32,
    pub landmark_radius: f32,
    pub exit_margin: f32,
    pub safe_zone_radius: f32,
    pub exit_interaction_radius: f32,

    pub boss_spawn_interval_ms: u64,
    pub boss_spawn_chance: f64,
    pub max_bosses: usize,

    /// Whether player projectiles can hit other players.
    pub pvp_projectiles: bool,

    pub item_ttl_ms: u64,
    pub max_world_items: usize,

    pub classes: BTreeMap<CharacterClass, ClassStats>,
    pub species: BTreeMap<Species, SpeciesStats>,
    pub biomes: BTreeMap<BiomeKind, BiomeProfile>,
    pub boss: BossProfile,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let classes = [
            CharacterClass::Warrior,
            CharacterClass::Mage,
            CharacterClass::Ranger,
        ]
        .into_iter()
        .map(|class| (class, ClassStats::standard(class)))
        .collect();

        let species = [
            Species::Wolf,
            Species::Bear,
            Species::Goblin,
            Species::Spider,
            Species::Slime,
            Species::Zombie,
            Species::Skeleton,
            Species::Bandit,
            Species::Troll,
            Species::Harpy,
            Species::AncientTreant,
            Species::BogHydra,
            Species::LichKing,
            Species::FrostDragon,
        ]
        .into_iter()
        .map(|species| (species, SpeciesStats::standard(species)))
        .collect();

        let biomes = [
            BiomeKind::Forest,
            BiomeKind::Swamp,
            BiomeKind::Ruins,
            BiomeKind::Mountains,
        ]
        .into_iter()
        .map(|kind| (kind, BiomeProfile::standard(kind)))
        .collect();

        WorldConfig {
            width: DEFAULT_WORLD_WIDTH,
            height: DEFAULT_WORLD_HEIGHT,
            tick_interval_ms: TICK_INTERVAL_MS,
            max_players: 32,
            seed: None,
            biome_area: 250_000.0,
            biome_radius: 300.0,
            landmark_density: 0.000004,
            landmark_radius: 60.0,
            exit_margin: 50.0,
            safe_zone_radius: 150.0,
            exit_interaction_radius: 50.0,
            boss_spawn_interval_ms: 60_000,
            boss_spawn_chance: 0.3,
            max_bosses: 1,
            pvp_projectiles: false,
            item_ttl_ms: 120_000,
            max_world_items: 500,
            classes,
            species,
            biomes,
            boss: BossProfile::default(),
        }
    }
}

impl WorldConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            self.width,
            self.height,
            self.biome_area,
            self.biome_radius,
            self.landmark_density,
        ];
        if sizes.iter().any(|value| !value.is_finite()) {
            return Err(ConfigError::Invalid(
                "world dimensions and densities must be finite".to_string(),
            ));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "world size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick interval must be at least 1 ms".to_string(),
            ));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid(
                "a world must admit at least one player".to_string(),
            ));
        }
        if self.biome_area <= 0.0 {
            return Err(ConfigError::Invalid("biome area must be positive".to_string()));
        }
        let biomes = (self.width * self.height / self.biome_area).ceil();
        if biomes > MAX_BIOMES as f32 {
            return Err(ConfigError::Invalid(format!(
                "biome area {} yields {} biomes, at most {} allowed",
                self.biome_area, biomes, MAX_BIOMES
            )));
        }
        let landmarks = (self.width * self.height * self.landmark_density).floor();
        if self.landmark_density < 0.0 || landmarks > MAX_LANDMARKS as f32 {
            return Err(ConfigError::Invalid(format!(
                "landmark density {} must yield between 0 and {} landmarks",
                self.landmark_density, MAX_LANDMARKS
            )));
        }
        let thresholds = &self.boss.phase_thresholds;
        if thresholds.iter().any(|t| *t <= 0.0 || *t >= 1.0)
            || thresholds.windows(2).any(|pair| pair[1] >= pair[0])
        {
            return Err(ConfigError::Invalid(format!(
                "boss phase thresholds must be strictly decreasing fractions, got {:?}",
                thresholds
            )));
        }
        Ok(())
    }

    /// One biome per `biome_area` of map, capped at [`MAX_BIOMES`].
    pub fn biome_count(&self) -> usize {
        let count = (self.width * self.height / self.biome_area).ceil();
        if count.is_nan() {
            return 0;
        }
        count.clamp(0.0, MAX_BIOMES as f32) as usize
    }

    pub fn landmark_count(&self) -> usize {
        let count = (self.width * self.height * self.landmark_density).floor();
        if count.is_nan() {
            return 0;
        }
        count.clamp(0.0, MAX_LANDMARKS as f32) as usize
    }

    pub fn class_stats(&self, class: CharacterClass) -> ClassStats {
        self.classes
            .get(&class)
            .copied()
            .unwrap_or_else(|| ClassStats::standard(class))
    }

    pub fn species_stats(&self, species: Species) -> SpeciesStats {
        self.species
            .get(&species)
            .copied()
            .unwrap_or_else(|| SpeciesStats::standard(species))
    }

    pub fn biome_profile(&self, kind: BiomeKind) -> BiomeProfile {
        self.biomes
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| BiomeProfile::standard(kind))
    }

    pub fn tick_dt_ms(&self) -> u32 {
        self.tick_interval_ms.min(u32::MAX as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.classes.len(), 3);
        assert_eq!(config.species.len(), 14);
        assert_eq!(config.biomes.len(), 4);
    }

    #[test]
    fn test_rejects_non_finite_size() {
        let config = WorldConfig {
            width: f32::NAN,
            ..WorldConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.biome_count(), 0);

        let config = WorldConfig {
            height: f32::INFINITY,
            ..WorldConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_tiny_biome_area_is_capped() {
        let config = WorldConfig {
            biome_area: 1e-30,
            ..WorldConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert_eq!(config.biome_count(), MAX_BIOMES);
        assert_eq!(WorldConfig::default().biome_count(), 16);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = WorldConfig::from_json(r#"{ "width": 1000.0, "seed": 42 }"#).unwrap();
        assert_eq!(config.width, 1000.0);
        assert_eq!(config.height, DEFAULT_WORLD_HEIGHT);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.species_stats(Species::Wolf).aggro_range, 200.0);
    }

    #[test]
    fn test_rejects_unordered_thresholds() {
        let mut config = WorldConfig::default();
        config.boss.phase_thresholds = vec![0.4, 0.65];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_tick() {
        let result = WorldConfig::from_json(r#"{ "tick_interval_ms": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_table_entry_falls_back() {
        let mut config = WorldConfig::default();
        config.species.clear();
        assert_eq!(
            config.species_stats(Species::Troll),
            SpeciesStats::standard(Species::Troll)
        );
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = WorldConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let parsed = WorldConfig::from_json(&text).unwrap();
        assert_eq!(parsed, config);
    }
}

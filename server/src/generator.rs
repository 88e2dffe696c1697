//! Procedural world layout and initial monster population.
//!
//! Biomes are circles with random centers that may overlap; a point belongs
//! to the biome with the nearest center. Exits sit at the midpoint of each
//! edge. Landmarks are scattered uniformly and take their kind from the biome
//! they land in.

use crate::config::WorldConfig;
use crate::rng::SimRng;
use log::{debug, info};
use shared::{Biome, BiomeKind, Exit, Landmark, Species, Vec2, WorldLayout};

const BIOME_KINDS: [BiomeKind; 4] = [
    BiomeKind::Forest,
    BiomeKind::Swamp,
    BiomeKind::Ruins,
    BiomeKind::Mountains,
];

/// Boss-spawn odds for dramatic and ordinary landmarks.
const DRAMATIC_BOSS_SPAWN_CHANCE: f64 = 0.7;
const ORDINARY_BOSS_SPAWN_CHANCE: f64 = 0.3;

/// A monster to be placed when a world starts.
#[derive(Debug, Clone, PartialEq)]
pub struct MonsterSpawn {
    pub species: Species,
    pub position: Vec2,
    pub level: u32,
}

pub fn generate(config: &WorldConfig, rng: &mut SimRng) -> WorldLayout {
    let width = config.width;
    let height = config.height;

    let biomes = generate_biomes(config, rng);
    let exits = exits(config);

    let mut layout = WorldLayout {
        width,
        height,
        biomes,
        exits,
        landmarks: Vec::new(),
    };
    layout.landmarks = generate_landmarks(&layout, config, rng);

    info!(
        "Generated {}x{} world: {} biomes, {} exits, {} landmarks",
        width,
        height,
        layout.biomes.len(),
        layout.exits.len(),
        layout.landmarks.len()
    );
    layout
}

fn generate_biomes(config: &WorldConfig, rng: &mut SimRng) -> Vec<Biome> {
    let count = config.biome_count();
    let weights: Vec<f32> = BIOME_KINDS
        .iter()
        .map(|kind| config.biome_profile(*kind).weight)
        .collect();

    let mut biomes = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = rng
            .weighted_index(&weights)
            .map_or(BiomeKind::Forest, |i| BIOME_KINDS[i]);
        let profile = config.biome_profile(kind);
        let center = Vec2::new(
            rng.range(0.0, config.width),
            rng.range(0.0, config.height),
        );
        biomes.push(Biome {
            kind,
            center,
            radius: config.biome_radius,
            monster_table: profile.monster_table,
            spawn_density: profile.monster_density,
            danger_level: profile.danger_level,
        });
    }
    biomes
}

/// One exit at the midpoint of each edge, inset by the configured margin.
pub fn exits(config: &WorldConfig) -> Vec<Exit> {
    let w = config.width;
    let h = config.height;
    let m = config.exit_margin;
    [
        ("North Gate", Vec2::new(w / 2.0, m)),
        ("East Gate", Vec2::new(w - m, h / 2.0)),
        ("South Gate", Vec2::new(w / 2.0, h - m)),
        ("West Gate", Vec2::new(m, h / 2.0)),
    ]
    .into_iter()
    .enumerate()
    .map(|(id, (name, position))| Exit {
        id: id as u32,
        name: name.to_string(),
        position,
        safe_zone_radius: config.safe_zone_radius,
        interaction_radius: config.exit_interaction_radius,
    })
    .collect()
}

fn generate_landmarks(layout: &WorldLayout, config: &WorldConfig, rng: &mut SimRng) -> Vec<Landmark> {
    let count = config.landmark_count();
    let mut landmarks = Vec::with_capacity(count);

    for _ in 0..count {
        let position = Vec2::new(
            rng.range(0.0, layout.width),
            rng.range(0.0, layout.height),
        );
        let Some(biome_index) = layout.nearest_biome(position) else {
            debug!("No biome for landmark at {:?}, skipping", position);
            continue;
        };
        let biome_kind = layout.biomes[biome_index].kind;
        let profile = config.biome_profile(biome_kind);
        let Some(kind) = rng.pick(&profile.landmarks).copied() else {
            debug!("Biome {:?} has no landmark kinds, skipping", biome_kind);
            continue;
        };
        let boss_chance = if kind.is_dramatic() {
            DRAMATIC_BOSS_SPAWN_CHANCE
        } else {
            ORDINARY_BOSS_SPAWN_CHANCE
        };
        let is_boss_spawn = rng.chance(boss_chance);

        landmarks.push(Landmark {
            name: format!("{} {}", biome_epithet(biome_kind), kind.title()),
            kind,
            position,
            radius: config.landmark_radius,
            biome: biome_index,
            is_boss_spawn,
        });
    }
    landmarks
}

fn biome_epithet(kind: BiomeKind) -> &'static str {
    match kind {
        BiomeKind::Forest => "Whispering",
        BiomeKind::Swamp => "Murky",
        BiomeKind::Ruins => "Forgotten",
        BiomeKind::Mountains => "Frostbitten",
    }
}

/// Monsters for a freshly generated world: per biome, a count proportional
/// to its density, placed uniformly inside the biome circle.
pub fn initial_population(
    layout: &WorldLayout,
    config: &WorldConfig,
    rng: &mut SimRng,
) -> Vec<MonsterSpawn> {
    let mut spawns = Vec::new();
    for biome in &layout.biomes {
        let count = (config.biome_area * biome.spawn_density).floor() as usize;
        for _ in 0..count {
            let Some(species) = rng.pick(&biome.monster_table).copied() else {
                break;
            };
            let position = rng
                .point_in_circle(biome.center, biome.radius)
                .clamp_to(layout.width, layout.height);
            spawns.push(MonsterSpawn {
                species,
                position,
                level: biome.danger_level.max(1),
            });
        }
    }
    spawns
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::distance;

    #[test]
    fn test_counts_follow_config() {
        let config = WorldConfig::default();
        let mut rng = SimRng::seeded(1);
        let layout = generate(&config, &mut rng);

        assert_eq!(layout.biomes.len(), 16);
        assert_eq!(layout.exits.len(), 4);
        assert!(layout.landmarks.len() <= 16);
        assert!(!layout.landmarks.is_empty());
    }

    #[test]
    fn test_exits_at_edge_midpoints() {
        let config = WorldConfig::default();
        let layout = generate(&config, &mut SimRng::seeded(2));
        let positions: Vec<Vec2> = layout.exits.iter().map(|e| e.position).collect();
        assert!(positions.contains(&Vec2::new(1000.0, 50.0)));
        assert!(positions.contains(&Vec2::new(1950.0, 1000.0)));
        assert!(positions.contains(&Vec2::new(1000.0, 1950.0)));
        assert!(positions.contains(&Vec2::new(50.0, 1000.0)));
    }

    #[test]
    fn test_same_seed_same_world() {
        let config = WorldConfig::default();
        let a = generate(&config, &mut SimRng::seeded(77));
        let b = generate(&config, &mut SimRng::seeded(77));
        assert_eq!(a, b);
    }

    #[test]
    fn test_landmarks_belong_to_nearest_biome() {
        let config = WorldConfig::default();
        let layout = generate(&config, &mut SimRng::seeded(3));
        for landmark in &layout.landmarks {
            assert_eq!(layout.nearest_biome(landmark.position), Some(landmark.biome));
            let profile = config.biome_profile(layout.biomes[landmark.biome].kind);
            assert!(profile.landmarks.contains(&landmark.kind));
        }
    }

    #[test]
    fn test_population_inside_biomes() {
        let config = WorldConfig::default();
        let mut rng = SimRng::seeded(4);
        let layout = generate(&config, &mut rng);
        let spawns = initial_population(&layout, &config, &mut rng);

        assert!(!spawns.is_empty());
        for spawn in &spawns {
            assert!(spawn.position.x >= 0.0 && spawn.position.x <= config.width);
            assert!(spawn.position.y >= 0.0 && spawn.position.y <= config.height);
            let in_some_biome = layout.biomes.iter().any(|biome| {
                biome.monster_table.contains(&spawn.species)
                    && distance(biome.center, spawn.position) <= biome.radius + 1e-3
            });
            assert!(in_some_biome);
        }
    }

    #[test]
    fn test_tiny_world_still_has_a_biome() {
        let config = WorldConfig {
            width: 100.0,
            height: 100.0,
            ..WorldConfig::default()
        };
        let layout = generate(&config, &mut SimRng::seeded(5));
        assert_eq!(layout.biomes.len(), 1);
        assert!(layout.landmarks.is_empty());
    }
}

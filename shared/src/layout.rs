//! Static world structure: biomes, exits and landmarks.
//!
//! A layout is generated once when a world is created and never changes
//! afterwards. Clients receive it on connect so they can draw the map.

use crate::math::{distance, Vec2};
use crate::protocol::Species;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BiomeKind {
    Forest,
    Swamp,
    Ruins,
    Mountains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandmarkKind {
    AncientTree,
    HuntersCamp,
    StoneCircle,
    WitchHut,
    SunkenTemple,
    BogShrine,
    BrokenTower,
    Crypt,
    Colosseum,
    DragonPeak,
    FrozenCave,
    Watchtower,
}

impl LandmarkKind {
    /// Landmarks that make a fitting stage for a boss.
    pub fn is_dramatic(self) -> bool {
        matches!(
            self,
            LandmarkKind::StoneCircle
                | LandmarkKind::SunkenTemple
                | LandmarkKind::Crypt
                | LandmarkKind::Colosseum
                | LandmarkKind::DragonPeak
                | LandmarkKind::FrozenCave
        )
    }

    pub fn title(self) -> &'static str {
        match self {
            LandmarkKind::AncientTree => "Ancient Tree",
            LandmarkKind::HuntersCamp => "Hunter's Camp",
            LandmarkKind::StoneCircle => "Stone Circle",
            LandmarkKind::WitchHut => "Witch Hut",
            LandmarkKind::SunkenTemple => "Sunken Temple",
            LandmarkKind::BogShrine => "Bog Shrine",
            LandmarkKind::BrokenTower => "Broken Tower",
            LandmarkKind::Crypt => "Crypt",
            LandmarkKind::Colosseum => "Colosseum",
            LandmarkKind::DragonPeak => "Dragon Peak",
            LandmarkKind::FrozenCave => "Frozen Cave",
            LandmarkKind::Watchtower => "Watchtower",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biome {
    pub kind: BiomeKind,
    pub center: Vec2,
    pub radius: f32,
    pub monster_table: Vec<Species>,
    pub spawn_density: f32,
    pub danger_level: u32,
}

/// A way out of the world. The area around it is a safe zone: no PvP damage
/// and no monster aggro.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub id: u32,
    pub name: String,
    pub position: Vec2,
    pub safe_zone_radius: f32,
    pub interaction_radius: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub name: String,
    pub kind: LandmarkKind,
    pub position: Vec2,
    pub radius: f32,
    /// Index into [`WorldLayout::biomes`].
    pub biome: usize,
    pub is_boss_spawn: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldLayout {
    pub width: f32,
    pub height: f32,
    pub biomes: Vec<Biome>,
    pub exits: Vec<Exit>,
    pub landmarks: Vec<Landmark>,
}

impl WorldLayout {
    /// Index of the biome whose center is closest to `point`. Biomes overlap
    /// freely, so this is how ownership of a point is decided.
    pub fn nearest_biome(&self, point: Vec2) -> Option<usize> {
        self.biomes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                distance(a.center, point).total_cmp(&distance(b.center, point))
            })
            .map(|(index, _)| index)
    }

    pub fn in_safe_zone(&self, point: Vec2) -> bool {
        self.exits
            .iter()
            .any(|exit| distance(exit.position, point) <= exit.safe_zone_radius)
    }

    pub fn exit(&self, exit_id: u32) -> Option<&Exit> {
        self.exits.iter().find(|exit| exit.id == exit_id)
    }

    pub fn boss_spawn_landmarks(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter().filter(|landmark| landmark.is_boss_spawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biome(kind: BiomeKind, x: f32, y: f32) -> Biome {
        Biome {
            kind,
            center: Vec2::new(x, y),
            radius: 300.0,
            monster_table: vec![Species::Wolf],
            spawn_density: 0.00004,
            danger_level: 1,
        }
    }

    fn layout() -> WorldLayout {
        WorldLayout {
            width: 1000.0,
            height: 1000.0,
            biomes: vec![
                biome(BiomeKind::Forest, 100.0, 100.0),
                biome(BiomeKind::Ruins, 900.0, 900.0),
            ],
            exits: vec![Exit {
                id: 0,
                name: "North Gate".to_string(),
                position: Vec2::new(500.0, 50.0),
                safe_zone_radius: 150.0,
                interaction_radius: 50.0,
            }],
            landmarks: vec![],
        }
    }

    #[test]
    fn test_nearest_biome() {
        let layout = layout();
        assert_eq!(layout.nearest_biome(Vec2::new(0.0, 0.0)), Some(0));
        assert_eq!(layout.nearest_biome(Vec2::new(800.0, 700.0)), Some(1));
    }

    #[test]
    fn test_nearest_biome_empty_layout() {
        let layout = WorldLayout::default();
        assert_eq!(layout.nearest_biome(Vec2::new(1.0, 1.0)), None);
    }

    #[test]
    fn test_safe_zone_boundary_is_inside() {
        let layout = layout();
        assert!(layout.in_safe_zone(Vec2::new(500.0, 200.0)));
        assert!(!layout.in_safe_zone(Vec2::new(500.0, 201.0)));
    }

    #[test]
    fn test_dramatic_landmarks() {
        assert!(LandmarkKind::Crypt.is_dramatic());
        assert!(!LandmarkKind::HuntersCamp.is_dramatic());
    }
}

use super::Entity;
use crate::config::{BossProfile, SpeciesStats};
use log::debug;
use shared::{CreatureKind, CreatureState, CreatureView, Direction, EntityId, Species, Vec2};
use std::collections::BTreeSet;

/// Extra state carried by bosses.
#[derive(Debug, Clone, PartialEq)]
pub struct BossState {
    /// Starts at 0 and only ever increases.
    pub current_phase: u8,
    pub special_attack_cooldown: u32,
    pub is_using_special_attack: bool,
    pub profile: BossProfile,
}

impl BossState {
    pub fn new(profile: BossProfile) -> Self {
        Self {
            current_phase: 0,
            special_attack_cooldown: 0,
            is_using_special_attack: false,
            profile,
        }
    }

    pub fn special_attack_chance(&self) -> f64 {
        self.profile.base_special_chance
            + self.profile.special_chance_per_phase * self.current_phase as f64
    }
}

/// A monster or a boss. Both share the same record and AI; `boss` is set
/// only for bosses.
#[derive(Debug, Clone)]
pub struct Creature {
    pub id: EntityId,
    pub species: Species,
    pub kind: CreatureKind,
    pub level: u32,
    pub position: Vec2,
    pub spawn_position: Vec2,
    pub velocity: Vec2,
    pub facing: Direction,
    pub health: u32,
    pub max_health: u32,

    pub state: CreatureState,
    /// Player being chased or attacked.
    pub target: Option<EntityId>,
    /// Player who hit this creature most recently.
    pub last_attacker: Option<EntityId>,

    pub is_attacking: bool,
    pub attack_cooldown: u32,
    pub attack_duration: u32,
    pub swing_hits: BTreeSet<EntityId>,

    /// World time of death; 0 while alive.
    pub death_time: u64,
    pub idle_timer: u32,
    pub patrol_point: Option<Vec2>,
    /// State changes since the last call to [`Creature::take_transitions`].
    transitions: Vec<(CreatureState, CreatureState)>,

    /// Species stats as configured.
    pub base_stats: SpeciesStats,
    /// Stats in effect, including boss phase buffs.
    pub stats: SpeciesStats,
    pub boss: Option<BossState>,
}

impl Creature {
    pub fn monster(
        id: EntityId,
        species: Species,
        stats: SpeciesStats,
        position: Vec2,
        level: u32,
    ) -> Self {
        Self {
            id,
            species,
            kind: CreatureKind::Monster,
            level,
            position,
            spawn_position: position,
            velocity: Vec2::ZERO,
            facing: Direction::default(),
            health: stats.max_health,
            max_health: stats.max_health,
            state: CreatureState::Idle,
            target: None,
            last_attacker: None,
            is_attacking: false,
            attack_cooldown: 0,
            attack_duration: 0,
            swing_hits: BTreeSet::new(),
            death_time: 0,
            idle_timer: 0,
            patrol_point: None,
            transitions: Vec::new(),
            base_stats: stats,
            stats,
            boss: None,
        }
    }

    pub fn boss(
        id: EntityId,
        species: Species,
        stats: SpeciesStats,
        profile: BossProfile,
        position: Vec2,
        level: u32,
    ) -> Self {
        let mut creature = Self::monster(id, species, stats, position, level);
        creature.kind = CreatureKind::Boss;
        creature.boss = Some(BossState::new(profile));
        creature
    }

    pub fn is_boss(&self) -> bool {
        self.boss.is_some()
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn defense(&self) -> u32 {
        self.stats.defense
    }

    pub fn is_using_special_attack(&self) -> bool {
        self.boss
            .as_ref()
            .map_or(false, |boss| boss.is_using_special_attack)
    }

    /// Applies damage and records the time of death when health reaches
    /// zero. Returns the health left.
    pub fn take_damage(&mut self, amount: u32, now: u64) -> u32 {
        if !self.is_alive() {
            return 0;
        }
        self.health = self.health.saturating_sub(amount);
        if self.health == 0 {
            self.death_time = now.max(1);
            self.velocity = Vec2::ZERO;
            self.is_attacking = false;
            self.target = None;
        }
        self.health
    }

    pub fn set_state(&mut self, next: CreatureState) {
        if self.state != next {
            debug!(
                "{} {} {:?} -> {:?}",
                self.species.name(),
                self.id,
                self.state,
                next
            );
            self.transitions.push((self.state, next));
            self.state = next;
        }
    }

    pub fn take_transitions(&mut self) -> Vec<(CreatureState, CreatureState)> {
        std::mem::take(&mut self.transitions)
    }

    /// Health as a fraction of the maximum.
    pub fn health_fraction(&self) -> f32 {
        if self.max_health == 0 {
            return 0.0;
        }
        self.health as f32 / self.max_health as f32
    }

    /// Advances the boss phase ladder for the current health. Returns the new
    /// phase when at least one threshold was crossed.
    pub fn update_phase(&mut self) -> Option<u8> {
        let fraction = self.health_fraction();
        let boss = self.boss.as_mut()?;
        let mut changed = None;
        while let Some(threshold) = boss.profile.phase_thresholds.get(boss.current_phase as usize)
        {
            if fraction >= *threshold {
                break;
            }
            boss.current_phase += 1;
            changed = Some(boss.current_phase);
        }
        if changed.is_some() {
            self.apply_phase_buffs();
        }
        changed
    }

    /// Recomputes `stats` from the base stats and the current boss phase.
    fn apply_phase_buffs(&mut self) {
        let Some(boss) = &self.boss else {
            return;
        };
        let phase = boss.current_phase as f32;
        let profile = &boss.profile;
        let base = self.base_stats;

        let attack_factor = (1.0 - profile.attack_speed_buff_per_phase * phase).max(0.25);
        self.stats = SpeciesStats {
            damage: (base.damage as f32 * (1.0 + profile.damage_buff_per_phase * phase)).round()
                as u32,
            attack_speed_ms: (base.attack_speed_ms as f32 * attack_factor).round() as u32,
            movement_speed: base.movement_speed * (1.0 + profile.movement_buff_per_phase * phase),
            defense: base.defense + profile.defense_per_phase * boss.current_phase as u32,
            ..base
        };
    }

    /// Starts a swing. Bosses may turn it into a special attack, which lasts
    /// twice as long and doubles the cooldown.
    pub fn begin_attack(&mut self, special: bool) {
        self.is_attacking = true;
        self.attack_duration = self.stats.attack_duration_ms;
        self.attack_cooldown = self.stats.attack_speed_ms;
        self.swing_hits.clear();

        if let Some(boss) = self.boss.as_mut() {
            boss.is_using_special_attack = special;
            if special {
                self.attack_duration *= 2;
                self.attack_cooldown *= 2;
                boss.special_attack_cooldown = boss.profile.special_cooldown_ms;
            }
        }
    }

    /// Counts down attack and special attack timers.
    pub fn tick_timers(&mut self, dt_ms: u32) {
        self.attack_cooldown = self.attack_cooldown.saturating_sub(dt_ms);
        if self.attack_duration > 0 {
            self.attack_duration = self.attack_duration.saturating_sub(dt_ms);
            if self.attack_duration == 0 {
                self.is_attacking = false;
                if let Some(boss) = self.boss.as_mut() {
                    boss.is_using_special_attack = false;
                }
            }
        }
        if let Some(boss) = self.boss.as_mut() {
            boss.special_attack_cooldown = boss.special_attack_cooldown.saturating_sub(dt_ms);
        }
    }

    /// Brings a dead monster back at its spawn point once its respawn delay
    /// has passed. Does nothing for living creatures and bosses.
    pub fn try_respawn(&mut self, now: u64) -> bool {
        if self.is_alive() || self.is_boss() {
            return false;
        }
        if now.saturating_sub(self.death_time) < self.stats.time_to_respawn_ms {
            return false;
        }
        self.health = self.max_health;
        self.position = self.spawn_position;
        self.velocity = Vec2::ZERO;
        self.state = CreatureState::Idle;
        self.target = None;
        self.last_attacker = None;
        self.death_time = 0;
        self.idle_timer = 0;
        self.patrol_point = None;
        self.is_attacking = false;
        self.attack_cooldown = 0;
        self.attack_duration = 0;
        true
    }

    pub fn to_view(&self) -> CreatureView {
        CreatureView {
            id: self.id,
            species: self.species,
            kind: self.kind,
            position: self.position,
            facing: self.facing,
            health: self.health,
            max_health: self.max_health,
            state: self.state,
            is_attacking: self.is_attacking,
            phase: self.boss.as_ref().map(|boss| boss.current_phase),
            is_using_special_attack: self.is_using_special_attack(),
        }
    }
}

impl Entity for Creature {
    fn id(&self) -> EntityId {
        self.id
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn size(&self) -> (f32, f32) {
        (self.stats.size, self.stats.size)
    }
}

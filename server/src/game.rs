//! Authoritative world state and the fixed-step tick.
//!
//! [`GameState`] owns every entity of one world in per-kind maps keyed by
//! entity id. Subsystems ([`crate::ai`], [`crate::combat`],
//! [`crate::projectiles`], [`crate::collision`], [`crate::skills`]) are plain
//! functions that take the state explicitly. Maps are ordered so that a tick
//! visits entities in the same order every time and a seeded world replays
//! identically.
//!
//! The only way in from outside is a [`CommandInbox`], drained once at the
//! start of each tick. The only way out is the [`TickOutput`] returned by
//! [`GameState::tick`].

use crate::ai;
use crate::collision;
use crate::commands;
use crate::config::WorldConfig;
use crate::entity::{Creature, IdAllocator, Item, Player, Projectile};
use crate::generator;
use crate::projectiles;
use crate::rng::SimRng;
use log::{debug, error, info, warn};
use shared::{
    CharacterClass, Command, CreatureState, EntityId, Event, Snapshot, Species, Vec2, WorldLayout,
};
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};

/// A command waiting to be applied, tagged with the player that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub player_id: EntityId,
    pub sequence: u32,
    pub command: Command,
}

/// Source of player commands and session liveness for one world.
pub trait CommandInbox {
    /// Takes every command queued since the previous call, in the order they
    /// should be applied.
    fn drain(&mut self) -> Vec<QueuedCommand>;

    /// Whether the session controlling `player_id` is still connected.
    fn is_connected(&self, player_id: EntityId) -> bool;
}

/// Receives the result of every tick of a world.
pub trait BroadcastSink {
    fn publish(&mut self, world_id: u32, output: &TickOutput);
}

/// In-process inbox, used by tests and tools that drive a world directly.
#[derive(Debug, Default)]
pub struct LocalInbox {
    queued: Vec<QueuedCommand>,
    connected: BTreeSet<EntityId>,
    next_sequence: u32,
}

impl LocalInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, player_id: EntityId) {
        self.connected.insert(player_id);
    }

    pub fn disconnect(&mut self, player_id: EntityId) {
        self.connected.remove(&player_id);
    }

    pub fn push(&mut self, player_id: EntityId, command: Command) {
        self.next_sequence += 1;
        self.queued.push(QueuedCommand {
            player_id,
            sequence: self.next_sequence,
            command,
        });
    }
}

impl CommandInbox for LocalInbox {
    fn drain(&mut self) -> Vec<QueuedCommand> {
        std::mem::take(&mut self.queued)
    }

    fn is_connected(&self, player_id: EntityId) -> bool {
        self.connected.contains(&player_id)
    }
}

/// Who an event is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    Player(EntityId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub audience: Audience,
    pub event: Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub creature_id: EntityId,
    pub from: CreatureState,
    pub to: CreatureState,
}

/// Everything a tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub snapshot: Snapshot,
    pub events: Vec<Envelope>,
    /// Players removed from the world during this tick.
    pub departed: Vec<EntityId>,
    /// AI state changes, in the order they happened.
    pub transitions: Vec<StateTransition>,
}

impl TickOutput {
    /// Events visible to `player_id`: broadcasts plus its private events.
    pub fn events_for(&self, player_id: EntityId) -> Vec<Event> {
        self.events
            .iter()
            .filter(|envelope| match envelope.audience {
                Audience::Everyone => true,
                Audience::Player(id) => id == player_id,
            })
            .map(|envelope| envelope.event.clone())
            .collect()
    }

    pub fn broadcast_events(&self) -> impl Iterator<Item = &Event> {
        self.events
            .iter()
            .filter(|envelope| envelope.audience == Audience::Everyone)
            .map(|envelope| &envelope.event)
    }
}

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    /// Simulated milliseconds since the world was created.
    pub now_ms: u64,
    pub config: WorldConfig,
    pub layout: WorldLayout,
    pub players: BTreeMap<EntityId, Player>,
    pub creatures: BTreeMap<EntityId, Creature>,
    pub items: BTreeMap<EntityId, Item>,
    pub projectiles: BTreeMap<EntityId, Projectile>,
    pub ids: IdAllocator,
    pub rng: SimRng,
    last_boss_roll_ms: u64,
    pending: Vec<Envelope>,
    departed: Vec<EntityId>,
}

impl GameState {
    /// Generates a layout and its initial monster population.
    pub fn new(config: WorldConfig, mut rng: SimRng) -> Self {
        let layout = generator::generate(&config, &mut rng);
        let spawns = generator::initial_population(&layout, &config, &mut rng);
        let mut state = Self::with_layout(config, layout, rng);
        for spawn in spawns {
            state.spawn_monster(spawn.species, spawn.position, spawn.level);
        }
        info!("World populated with {} monsters", state.creatures.len());
        state
    }

    /// A world with the given layout and no creatures.
    pub fn with_layout(config: WorldConfig, layout: WorldLayout, rng: SimRng) -> Self {
        Self {
            tick: 0,
            now_ms: 0,
            config,
            layout,
            players: BTreeMap::new(),
            creatures: BTreeMap::new(),
            items: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            ids: IdAllocator::new(),
            rng,
            last_boss_roll_ms: 0,
            pending: Vec::new(),
            departed: Vec::new(),
        }
    }

    pub fn add_player(&mut self, name: &str, class: CharacterClass) -> EntityId {
        let id = self.ids.next_id();
        let position = self.spawn_point();
        let stats = self.config.class_stats(class);
        let player = Player::new(id, name.to_string(), class, &stats, position);
        info!(
            "Player {} ({}, {:?}) joined at ({:.0}, {:.0})",
            id, name, class, position.x, position.y
        );
        self.players.insert(id, player);
        id
    }

    /// Removes a player along with its in-flight projectiles.
    pub fn remove_player(&mut self, player_id: EntityId) -> Option<Player> {
        let player = self.players.remove(&player_id)?;
        for projectile_id in &player.projectiles {
            self.projectiles.remove(projectile_id);
        }
        self.departed.push(player_id);
        info!("Player {} ({}) left the world", player_id, player.name);
        Some(player)
    }

    pub fn spawn_monster(&mut self, species: Species, position: Vec2, level: u32) -> EntityId {
        let id = self.ids.next_id();
        let stats = self.config.species_stats(species);
        self.creatures
            .insert(id, Creature::monster(id, species, stats, position, level));
        id
    }

    pub fn spawn_boss(&mut self, species: Species, position: Vec2, level: u32) -> EntityId {
        let id = self.ids.next_id();
        let stats = self.config.species_stats(species);
        let profile = self.config.boss.clone();
        self.creatures
            .insert(id, Creature::boss(id, species, stats, profile, position, level));
        id
    }

    /// Places an item in the world.
    pub fn drop_item(&mut self, mut item: Item, position: Vec2) -> EntityId {
        let position = position.clamp_to(self.layout.width, self.layout.height);
        item.drop_at(position, self.now_ms);
        let id = item.id;
        self.items.insert(id, item);
        id
    }

    /// A random point inside the safe zone of a random exit.
    pub fn spawn_point(&mut self) -> Vec2 {
        let center = Vec2::new(self.layout.width / 2.0, self.layout.height / 2.0);
        let Some(index) = self.rng.index(self.layout.exits.len()) else {
            return center;
        };
        let exit = &self.layout.exits[index];
        let (position, radius) = (exit.position, exit.safe_zone_radius * 0.5);
        self.rng
            .point_in_circle(position, radius)
            .clamp_to(self.layout.width, self.layout.height)
    }

    pub fn living_bosses(&self) -> usize {
        self.creatures
            .values()
            .filter(|creature| creature.is_boss() && creature.is_alive())
            .count()
    }

    pub fn emit(&mut self, event: Event) {
        self.pending.push(Envelope {
            audience: Audience::Everyone,
            event,
        });
    }

    pub fn emit_to(&mut self, player_id: EntityId, event: Event) {
        self.pending.push(Envelope {
            audience: Audience::Player(player_id),
            event,
        });
    }

    /// Sends the player's inventory and equipment to that player only.
    pub fn emit_inventory(&mut self, player_id: EntityId) {
        if let Some(event) = self.players.get(&player_id).map(Player::inventory_event) {
            self.emit_to(player_id, event);
        }
    }

    /// Advances the world by one fixed step.
    pub fn tick(&mut self, inbox: &mut dyn CommandInbox) -> TickOutput {
        let dt_ms = self.config.tick_dt_ms();
        self.tick += 1;
        self.now_ms += dt_ms as u64;

        self.remove_disconnected(inbox);
        self.apply_commands(inbox.drain());
        self.advance_players(dt_ms);
        ai::update(self, dt_ms);
        projectiles::advance(self, dt_ms);
        collision::resolve_melee(self);
        collision::resolve_pickups(self);
        self.run_timed_events();

        self.finish_tick()
    }

    /// Runs [`GameState::tick`], restoring the state from before the tick
    /// if anything inside it panics.
    pub fn tick_guarded(&mut self, inbox: &mut dyn CommandInbox) -> Option<TickOutput> {
        let checkpoint = self.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| self.tick(inbox))) {
            Ok(output) => Some(output),
            Err(cause) => {
                let reason = cause
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| cause.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    "Tick {} panicked ({}), restoring previous state",
                    checkpoint.tick + 1,
                    reason
                );
                *self = checkpoint;
                None
            }
        }
    }

    fn remove_disconnected(&mut self, inbox: &dyn CommandInbox) {
        let gone: Vec<EntityId> = self
            .players
            .keys()
            .copied()
            .filter(|id| !inbox.is_connected(*id))
            .collect();
        for player_id in gone {
            self.remove_player(player_id);
        }
    }

    fn apply_commands(&mut self, queued: Vec<QueuedCommand>) {
        for QueuedCommand {
            player_id,
            sequence,
            command,
        } in queued
        {
            if !self.players.contains_key(&player_id) {
                debug!(
                    "Discarding command {} for missing player {}",
                    sequence, player_id
                );
                continue;
            }
            if let Err(e) = commands::apply(self, player_id, command) {
                debug!("Rejected command {} from player {}: {}", sequence, player_id, e);
                self.emit_to(
                    player_id,
                    Event::CommandRejected {
                        player_id,
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    fn advance_players(&mut self, dt_ms: u32) {
        let (width, height) = (self.layout.width, self.layout.height);
        for player in self.players.values_mut() {
            player.advance(dt_ms, width, height);
        }
    }

    fn run_timed_events(&mut self) {
        let now = self.now_ms;
        let respawned: Vec<(EntityId, Vec2)> = self
            .creatures
            .values_mut()
            .filter_map(|creature| {
                creature
                    .try_respawn(now)
                    .then_some((creature.id, creature.position))
            })
            .collect();
        for (creature_id, position) in respawned {
            debug!("Creature {} respawned", creature_id);
            self.emit(Event::CreatureRespawn {
                creature_id,
                position,
            });
        }

        self.roll_boss_spawn();
        self.evict_items();
    }

    fn roll_boss_spawn(&mut self) {
        if self.now_ms.saturating_sub(self.last_boss_roll_ms) < self.config.boss_spawn_interval_ms {
            return;
        }
        self.last_boss_roll_ms = self.now_ms;
        if self.living_bosses() >= self.config.max_bosses {
            return;
        }
        if self.rng.chance(self.config.boss_spawn_chance) {
            self.spawn_boss_at_landmark();
        }
    }

    /// Spawns the biome's boss at a random boss-spawn landmark.
    pub fn spawn_boss_at_landmark(&mut self) -> Option<EntityId> {
        let candidates: Vec<_> = self.layout.boss_spawn_landmarks().cloned().collect();
        let landmark = self.rng.pick(&candidates)?.clone();
        let Some(biome) = self.layout.biomes.get(landmark.biome) else {
            warn!("Landmark {} has no biome, no boss spawned", landmark.name);
            return None;
        };
        let species = self.config.biome_profile(biome.kind).boss;
        let level = biome.danger_level.max(1) * 5;

        let boss_id = self.spawn_boss(species, landmark.position, level);
        info!(
            "{} (boss {}) appeared at {}",
            species.name(),
            boss_id,
            landmark.name
        );
        self.emit(Event::BossSpawn {
            boss_id,
            species,
            position: landmark.position,
            landmark: landmark.name,
        });
        Some(boss_id)
    }

    /// Drops expired items, then the oldest ones while over the cap.
    fn evict_items(&mut self) {
        let now = self.now_ms;
        let ttl = self.config.item_ttl_ms;
        self.items
            .retain(|_, item| now.saturating_sub(item.dropped_at) <= ttl);

        let excess = self.items.len().saturating_sub(self.config.max_world_items);
        if excess > 0 {
            let mut by_age: Vec<(u64, EntityId)> = self
                .items
                .values()
                .map(|item| (item.dropped_at, item.id))
                .collect();
            by_age.sort_unstable();
            for (_, id) in by_age.into_iter().take(excess) {
                self.items.remove(&id);
            }
        }
    }

    fn finish_tick(&mut self) -> TickOutput {
        let mut transitions = Vec::new();
        for creature in self.creatures.values_mut() {
            for (from, to) in creature.take_transitions() {
                transitions.push(StateTransition {
                    creature_id: creature.id,
                    from,
                    to,
                });
            }
        }

        TickOutput {
            snapshot: self.snapshot(),
            events: std::mem::take(&mut self.pending),
            departed: std::mem::take(&mut self.departed),
            transitions,
        }
    }

    /// Wire view of the world. Dead creatures are left out.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            world_time_ms: self.now_ms,
            players: self.players.values().map(Player::to_view).collect(),
            creatures: self
                .creatures
                .values()
                .filter(|creature| creature.is_alive())
                .map(Creature::to_view)
                .collect(),
            items: self.items.values().map(Item::to_view).collect(),
            projectiles: self
                .projectiles
                .values()
                .filter(|projectile| projectile.active)
                .map(Projectile::to_view)
                .collect(),
        }
    }
}

/// Small fixed world used by unit tests: one forest biome in the middle and
/// the standard four exits.
#[cfg(test)]
pub(crate) fn test_state() -> GameState {
    use shared::{Biome, BiomeKind};

    let config = WorldConfig::default();
    let layout = WorldLayout {
        width: config.width,
        height: config.height,
        biomes: vec![Biome {
            kind: BiomeKind::Forest,
            center: Vec2::new(1000.0, 1000.0),
            radius: 300.0,
            monster_table: vec![Species::Wolf],
            spawn_density: 0.00004,
            danger_level: 1,
        }],
        exits: generator::exits(&config),
        landmarks: Vec::new(),
    };
    GameState::with_layout(config, layout, SimRng::seeded(42))
}

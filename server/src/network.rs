//! Server network layer: UDP sessions, the world registry and the tick loop

use crate::client_manager::{ClientManager, CLIENT_TIMEOUT};
use crate::config::WorldConfig;
use crate::game::{BroadcastSink, GameState, TickOutput};
use crate::rng::SimRng;
use bincode::{deserialize, serialize, serialized_size};
use log::{debug, error, info, warn};
use shared::{
    distance, CharacterClass, Command, EntityId, Packet, Snapshot, Vec2, WorldLayout,
    PROTOCOL_VERSION,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

pub const RECEIVE_BUFFER_SIZE: usize = 65_536;
/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
/// Radius kept around a player when a full snapshot does not fit a datagram.
pub const INTEREST_RADIUS: f32 = 800.0;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    CheckTimeouts,
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Milliseconds since the Unix epoch, clamped to `u64`.
pub fn now_millis() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    (timestamp.min(u64::MAX as u128)) as u64
}

/// Circular area of a world a session is interested in.
#[derive(Debug, Clone, Copy)]
pub struct InterestArea {
    pub center: Vec2,
    pub radius: f32,
}

impl InterestArea {
    pub fn contains(&self, position: Vec2) -> bool {
        distance(self.center, position) <= self.radius
    }
}

/// Cuts a snapshot down to what surrounds `player_id`. The player itself is
/// always kept; an unknown player gets the snapshot unchanged.
pub fn snapshot_around(snapshot: &Snapshot, player_id: EntityId, radius: f32) -> Snapshot {
    let Some(me) = snapshot.players.iter().find(|p| p.id == player_id) else {
        return snapshot.clone();
    };
    let area = InterestArea {
        center: me.position,
        radius,
    };
    Snapshot {
        tick: snapshot.tick,
        world_time_ms: snapshot.world_time_ms,
        players: snapshot
            .players
            .iter()
            .filter(|p| p.id == player_id || area.contains(p.position))
            .cloned()
            .collect(),
        creatures: snapshot
            .creatures
            .iter()
            .filter(|c| area.contains(c.position))
            .cloned()
            .collect(),
        items: snapshot
            .items
            .iter()
            .filter(|i| area.contains(i.position))
            .cloned()
            .collect(),
        projectiles: snapshot
            .projectiles
            .iter()
            .filter(|p| area.contains(p.position))
            .cloned()
            .collect(),
    }
}

fn queue_packet(game_tx: &mpsc::UnboundedSender<GameMessage>, packet: Packet, addr: SocketAddr) {
    if let Err(e) = game_tx.send(GameMessage::SendPacket { packet, addr }) {
        error!("Failed to queue packet for sending: {}", e);
    }
}

/// Turns tick output into per-session packets on the sender task's queue.
///
/// Every session of a world gets the full snapshot and the events meant for
/// it. A snapshot too large for one datagram is trimmed per session to its
/// [`INTEREST_RADIUS`].
pub struct UdpSink {
    game_tx: mpsc::UnboundedSender<GameMessage>,
    sessions: BTreeMap<u32, Vec<(EntityId, SocketAddr)>>,
    timestamp: u64,
}

impl UdpSink {
    pub fn new(
        game_tx: mpsc::UnboundedSender<GameMessage>,
        sessions: BTreeMap<u32, Vec<(EntityId, SocketAddr)>>,
        timestamp: u64,
    ) -> Self {
        Self {
            game_tx,
            sessions,
            timestamp,
        }
    }
}

impl BroadcastSink for UdpSink {
    fn publish(&mut self, world_id: u32, output: &TickOutput) {
        let Some(sessions) = self.sessions.get(&world_id) else {
            return;
        };
        let full = Packet::Snapshot {
            timestamp: self.timestamp,
            snapshot: output.snapshot.clone(),
        };
        let fits = serialized_size(&full)
            .map(|size| size as usize <= MAX_DATAGRAM_SIZE)
            .unwrap_or(false);
        if !fits {
            debug!(
                "World {} snapshot exceeds one datagram, trimming per session",
                world_id
            );
        }

        for &(player_id, addr) in sessions {
            let snapshot = if fits {
                full.clone()
            } else {
                Packet::Snapshot {
                    timestamp: self.timestamp,
                    snapshot: snapshot_around(&output.snapshot, player_id, INTEREST_RADIUS),
                }
            };
            queue_packet(&self.game_tx, snapshot, addr);

            let events = output.events_for(player_id);
            if !events.is_empty() {
                let packet = Packet::Events {
                    tick: output.snapshot.tick,
                    events,
                };
                queue_packet(&self.game_tx, packet, addr);
            }
        }
    }
}

/// Keeps every published frame. Used to drive worlds without a socket.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<(u32, TickOutput)>,
}

impl BroadcastSink for RecordingSink {
    fn publish(&mut self, world_id: u32, output: &TickOutput) {
        self.frames.push((world_id, output.clone()));
    }
}

/// One running world and the sessions playing in it
pub struct WorldInstance {
    pub id: u32,
    pub state: GameState,
    pub clients: ClientManager,
}

/// All running worlds of the server
///
/// Joining players go to the first world with room; when every world is full
/// a new one is generated. Worlds left without sessions and players are torn
/// down after the tick that emptied them.
pub struct WorldRegistry {
    config: WorldConfig,
    worlds: BTreeMap<u32, WorldInstance>,
    next_world_id: u32,
}

impl WorldRegistry {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            worlds: BTreeMap::new(),
            next_world_id: 1,
        }
    }

    fn create_world(&mut self) -> u32 {
        let id = self.next_world_id;
        self.next_world_id += 1;

        // Seeded servers give every world its own reproducible stream
        let rng = match self.config.seed {
            Some(seed) => SimRng::seeded(seed.wrapping_add(u64::from(id))),
            None => SimRng::from_entropy(),
        };
        let state = GameState::new(self.config.clone(), rng);
        info!(
            "World {} created with {} creatures",
            id,
            state.creatures.len()
        );
        self.worlds.insert(
            id,
            WorldInstance {
                id,
                state,
                clients: ClientManager::new(self.config.max_players),
            },
        );
        id
    }

    /// Places a new player in a world with room.
    ///
    /// Returns the world id and the new player's id, or None if worlds hold
    /// no players at all.
    pub fn join(
        &mut self,
        name: &str,
        class: CharacterClass,
        addr: SocketAddr,
    ) -> Option<(u32, EntityId)> {
        let world_id = match self
            .worlds
            .values()
            .find(|world| !world.clients.is_full())
            .map(|world| world.id)
        {
            Some(id) => id,
            None => self.create_world(),
        };

        let world = self.worlds.get_mut(&world_id)?;
        if world.clients.is_full() {
            return None;
        }
        let player_id = world.state.add_player(name, class);
        world.clients.add_client(player_id, addr);
        Some((world_id, player_id))
    }

    /// World and player of the session at `addr`
    pub fn find_session(&self, addr: SocketAddr) -> Option<(u32, EntityId)> {
        self.worlds.values().find_map(|world| {
            world
                .clients
                .find_client_by_addr(addr)
                .map(|player_id| (world.id, player_id))
        })
    }

    /// Closes the session at `addr`. Its player leaves on the world's next
    /// tick.
    pub fn leave(&mut self, addr: SocketAddr) -> Option<(u32, EntityId)> {
        let (world_id, player_id) = self.find_session(addr)?;
        let world = self.worlds.get_mut(&world_id)?;
        world.clients.remove_client(&player_id)?;
        Some((world_id, player_id))
    }

    pub fn add_command(&mut self, addr: SocketAddr, sequence: u32, command: Command) -> bool {
        let Some((world_id, player_id)) = self.find_session(addr) else {
            return false;
        };
        self.worlds
            .get_mut(&world_id)
            .map(|world| world.clients.add_command(player_id, sequence, command))
            .unwrap_or(false)
    }

    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some((world_id, player_id)) = self.find_session(addr) {
            if let Some(world) = self.worlds.get_mut(&world_id) {
                world.clients.touch(player_id);
            }
        }
    }

    /// Closes every session quiet for longer than `timeout` and returns
    /// their addresses.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<SocketAddr> {
        self.worlds
            .values_mut()
            .flat_map(|world| world.clients.check_timeouts(timeout))
            .map(|client| client.addr)
            .collect()
    }

    /// Session addresses per world, in player id order
    pub fn session_addrs(&self) -> BTreeMap<u32, Vec<(EntityId, SocketAddr)>> {
        self.worlds
            .values()
            .map(|world| (world.id, world.clients.get_client_addrs()))
            .collect()
    }

    /// Runs one tick of every world, one world after another, publishing each
    /// frame to `sink`. A world whose tick panicked publishes nothing this
    /// round.
    ///
    /// Returns the addresses of sessions whose player left the world during
    /// the tick, for example through an exit.
    pub fn tick_all(&mut self, sink: &mut dyn BroadcastSink) -> Vec<SocketAddr> {
        let mut closed = Vec::new();

        for world in self.worlds.values_mut() {
            let Some(output) = world.state.tick_guarded(&mut world.clients) else {
                continue;
            };
            sink.publish(world.id, &output);
            for player_id in &output.departed {
                if let Some(client) = world.clients.remove_client(player_id) {
                    closed.push(client.addr);
                }
            }
        }

        self.worlds.retain(|id, world| {
            let empty = world.clients.is_empty() && world.state.players.is_empty();
            if empty {
                info!("World {} is empty, tearing it down", id);
            }
            !empty
        });
        closed
    }

    pub fn layout(&self, world_id: u32) -> Option<&WorldLayout> {
        self.worlds.get(&world_id).map(|world| &world.state.layout)
    }

    pub fn get(&self, world_id: u32) -> Option<&WorldInstance> {
        self.worlds.get(&world_id)
    }

    pub fn get_mut(&mut self, world_id: u32) -> Option<&mut WorldInstance> {
        self.worlds.get_mut(&world_id)
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    pub fn session_count(&self) -> usize {
        self.worlds.values().map(|world| world.clients.len()).sum()
    }
}

/// Main server coordinating networking and world simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: WorldRegistry,
    tick_duration: Duration,
    ticks: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: WorldConfig) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            tick_duration: Duration::from_millis(config.tick_interval_ms),
            registry: WorldRegistry::new(config),
            ticks: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that stops [`Server::run`] when given [`ServerMessage::Shutdown`]
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that asks the main loop to sweep quiet sessions
    fn spawn_timeout_checker(&self) {
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;
                if server_tx.send(ServerMessage::CheckTimeouts).is_err() {
                    break;
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        queue_packet(&self.game_tx, packet, addr);
    }

    /// Processes incoming packets
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
                class,
            } => {
                info!(
                    "Client {} connecting from {} as {:?} (version: {})",
                    name, addr, class, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing session if present
                if let Some((world_id, player_id)) = self.registry.leave(addr) {
                    info!(
                        "Replacing session of player {} in world {} from {}",
                        player_id, world_id, addr
                    );
                }

                let joined = self.registry.join(name.trim(), class, addr);
                let layout = joined.and_then(|(world_id, _)| self.registry.layout(world_id));
                match (joined, layout) {
                    (Some((world_id, player_id)), Some(layout)) => {
                        let response = Packet::Connected {
                            player_id,
                            world_id,
                            layout: layout.clone(),
                        };
                        self.send_packet(response, addr);
                    }
                    _ => {
                        let response = Packet::Disconnected {
                            reason: "Server full".to_string(),
                        };
                        self.send_packet(response, addr);
                    }
                }
            }

            Packet::Command { sequence, command } => {
                if !self.registry.add_command(addr, sequence, command) {
                    debug!("Dropped command {} from {}", sequence, addr);
                }
            }

            Packet::Heartbeat => self.registry.touch(addr),

            Packet::Disconnect => {
                if let Some((world_id, player_id)) = self.registry.leave(addr) {
                    info!("Player {} left world {}", player_id, world_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn handle_timeouts(&mut self) {
        for addr in self.registry.check_timeouts(CLIENT_TIMEOUT) {
            info!("Session at {} timed out", addr);
            self.send_packet(
                Packet::Disconnected {
                    reason: "Client timeout".to_string(),
                },
                addr,
            );
        }
    }

    /// Advances every world and queues the results for the sender task
    fn tick(&mut self) {
        let mut sink = UdpSink::new(
            self.game_tx.clone(),
            self.registry.session_addrs(),
            now_millis(),
        );
        for addr in self.registry.tick_all(&mut sink) {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Left the world".to_string(),
                },
                addr,
            );
        }
        self.ticks += 1;
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        },
                        Some(ServerMessage::CheckTimeouts) => self.handle_timeouts(),
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_tick);
                    last_tick = now;
                    if self.ticks > 0 && elapsed > self.tick_duration * 2 {
                        warn!(
                            "Tick loop fell behind: {}ms since the last tick",
                            elapsed.as_millis()
                        );
                    }

                    self.tick();

                    if self.ticks % 60 == 0 && self.registry.session_count() > 0 {
                        debug!(
                            "Tick {}: {} worlds, {} sessions, {:.1}Hz",
                            self.ticks,
                            self.registry.world_count(),
                            self.registry.session_count(),
                            1.0 / elapsed.as_secs_f32().max(f32::EPSILON)
                        );
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Event, PlayerView};
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    fn small_config(max_players: usize) -> WorldConfig {
        WorldConfig {
            max_players,
            seed: Some(7),
            ..WorldConfig::default()
        }
    }

    fn player_view(id: EntityId, position: Vec2) -> PlayerView {
        let mut state = crate::game::test_state();
        let real = state.add_player("Probe", CharacterClass::Warrior);
        let mut view = state.players[&real].to_view();
        view.id = id;
        view.position = position;
        view
    }

    #[test]
    fn test_server_message_creation() {
        let packet = Packet::Heartbeat;
        let addr = test_addr(8080);

        let msg = ServerMessage::PacketReceived { packet, addr };

        match msg {
            ServerMessage::PacketReceived { packet: p, addr: a } => {
                assert_eq!(a, addr);
                assert!(matches!(p, Packet::Heartbeat));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        assert!(tx.send(ServerMessage::CheckTimeouts).is_ok());

        match rx.try_recv() {
            Ok(ServerMessage::CheckTimeouts) => {}
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_timestamp_generation() {
        let timestamp1 = now_millis();
        std::thread::sleep(Duration::from_millis(2));
        let timestamp2 = now_millis();
        assert!(timestamp2 > timestamp1);
    }

    #[test]
    fn test_address_validation() {
        for addr_str in ["127.0.0.1:8080", "0.0.0.0:0", "[::1]:8080"] {
            assert!(addr_str.parse::<SocketAddr>().is_ok(), "{}", addr_str);
        }
        for addr_str in ["invalid", "127.0.0.1:99999", ""] {
            assert!(addr_str.parse::<SocketAddr>().is_err(), "{}", addr_str);
        }
    }

    #[test]
    fn test_join_fills_worlds_in_order() {
        let mut registry = WorldRegistry::new(small_config(2));
        let (first, _) = registry.join("A", CharacterClass::Warrior, test_addr(1)).unwrap();
        let (second, _) = registry.join("B", CharacterClass::Mage, test_addr(2)).unwrap();
        let (third, _) = registry.join("C", CharacterClass::Ranger, test_addr(3)).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(registry.world_count(), 2);
        assert_eq!(registry.session_count(), 3);
        assert!(registry.layout(third).is_some());
    }

    #[test]
    fn test_seeded_worlds_are_reproducible() {
        let mut a = WorldRegistry::new(small_config(4));
        let mut b = WorldRegistry::new(small_config(4));
        let (world_a, _) = a.join("A", CharacterClass::Warrior, test_addr(1)).unwrap();
        let (world_b, _) = b.join("A", CharacterClass::Warrior, test_addr(1)).unwrap();
        assert_eq!(a.layout(world_a), b.layout(world_b));
    }

    #[test]
    fn test_commands_reach_the_world() {
        let mut registry = WorldRegistry::new(small_config(4));
        let addr = test_addr(1);
        let (world_id, player_id) = registry.join("A", CharacterClass::Warrior, addr).unwrap();

        assert!(registry.add_command(
            addr,
            1,
            Command::Movement {
                direction_x: 1,
                direction_y: 0
            }
        ));
        assert!(!registry.add_command(test_addr(99), 1, Command::Attack));

        let start = Vec2::new(1000.0, 1000.0);
        registry
            .get_mut(world_id)
            .unwrap()
            .state
            .players
            .get_mut(&player_id)
            .unwrap()
            .position = start;
        let mut sink = RecordingSink::default();
        registry.tick_all(&mut sink);

        let position = registry.get(world_id).unwrap().state.players[&player_id].position;
        assert!(position.x > start.x);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.frames[0].0, world_id);
    }

    #[test]
    fn test_leave_removes_player_and_tears_down_world() {
        let mut registry = WorldRegistry::new(small_config(4));
        let addr = test_addr(1);
        let (world_id, player_id) = registry.join("A", CharacterClass::Warrior, addr).unwrap();

        assert_eq!(registry.leave(addr), Some((world_id, player_id)));
        assert_eq!(registry.find_session(addr), None);
        // Player is still in the world until its next tick
        assert!(registry.get(world_id).unwrap().state.players.contains_key(&player_id));

        let mut sink = RecordingSink::default();
        let closed = registry.tick_all(&mut sink);
        assert!(closed.is_empty());
        assert_eq!(sink.frames[0].1.departed, vec![player_id]);
        assert_eq!(registry.world_count(), 0);
    }

    #[test]
    fn test_exit_closes_session() {
        let mut registry = WorldRegistry::new(small_config(4));
        let addr = test_addr(1);
        let (world_id, player_id) = registry.join("A", CharacterClass::Ranger, addr).unwrap();
        {
            let world = registry.get_mut(world_id).unwrap();
            let gate = world.state.layout.exits[0].position;
            world.state.players.get_mut(&player_id).unwrap().position = gate;
        }
        registry.add_command(addr, 1, Command::Exit { exit_id: 0 });

        let mut sink = RecordingSink::default();
        let closed = registry.tick_all(&mut sink);

        assert_eq!(closed, vec![addr]);
        let (_, output) = &sink.frames[0];
        assert!(output
            .events_for(player_id)
            .iter()
            .any(|e| matches!(e, Event::PlayerExited { exit_id: 0, .. })));
        assert_eq!(registry.world_count(), 0);
    }

    #[test]
    fn test_timeouts_close_sessions() {
        let mut registry = WorldRegistry::new(small_config(4));
        registry.join("A", CharacterClass::Warrior, test_addr(1)).unwrap();
        assert!(registry.check_timeouts(CLIENT_TIMEOUT).is_empty());

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(
            registry.check_timeouts(Duration::from_millis(1)),
            vec![test_addr(1)]
        );
        assert_eq!(registry.session_count(), 0);
    }

    #[test]
    fn test_snapshot_around_keeps_nearby_entities() {
        let snapshot = Snapshot {
            tick: 3,
            world_time_ms: 150,
            players: vec![
                player_view(1, Vec2::new(100.0, 100.0)),
                player_view(2, Vec2::new(500.0, 100.0)),
                player_view(3, Vec2::new(1500.0, 100.0)),
            ],
            ..Snapshot::default()
        };

        let trimmed = snapshot_around(&snapshot, 1, INTEREST_RADIUS);
        let ids: Vec<EntityId> = trimmed.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(trimmed.tick, 3);

        assert_eq!(snapshot_around(&snapshot, 42, INTEREST_RADIUS), snapshot);
    }

    #[test]
    fn test_udp_sink_queues_snapshot_and_private_events() {
        let (game_tx, mut game_rx) = mpsc::unbounded_channel();
        let mut sessions = BTreeMap::new();
        sessions.insert(1, vec![(10, test_addr(1)), (11, test_addr(2))]);
        let mut sink = UdpSink::new(game_tx, sessions, 1234);

        let mut output = TickOutput::default();
        output.events.push(crate::game::Envelope {
            audience: crate::game::Audience::Player(11),
            event: Event::LevelUp {
                player_id: 11,
                level: 2,
            },
        });
        sink.publish(1, &output);
        sink.publish(2, &output);

        let mut sent = Vec::new();
        while let Ok(GameMessage::SendPacket { packet, addr }) = game_rx.try_recv() {
            sent.push((packet, addr));
        }
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[0], (Packet::Snapshot { timestamp: 1234, .. }, a) if a == test_addr(1)));
        assert!(matches!(sent[1].0, Packet::Snapshot { .. }));
        match &sent[2] {
            (Packet::Events { events, .. }, addr) => {
                assert_eq!(*addr, test_addr(2));
                assert_eq!(events.len(), 1);
            }
            _ => panic!("Unexpected packet type"),
        }
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = Server::new("127.0.0.1:0", small_config(4)).await.unwrap();
        let addr = tokio_test::assert_ok!(server.local_addr());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_server_rejects_invalid_config() {
        let config = WorldConfig {
            max_players: 0,
            ..WorldConfig::default()
        };
        assert!(Server::new("127.0.0.1:0", config).await.is_err());
    }
}

//! Session management and command buffering for one world
//!
//! This module tracks the network sessions attached to a world:
//! - Session lifecycle (join, leave, timeout)
//! - Command buffering in sequence order per session
//! - Capacity enforcement for the world
//!
//! The [`ClientManager`] is the world's [`CommandInbox`]: the tick drains it
//! once at the start of every step and asks it which players still have a
//! live session.

use crate::game::{CommandInbox, QueuedCommand};
use log::{debug, info};
use shared::{Command, EntityId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Sessions silent for longer than this are dropped.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected session and the commands it has sent since the last tick
#[derive(Debug)]
pub struct Client {
    /// Player controlled by this session
    pub player_id: EntityId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this session
    pub last_seen: Instant,
    /// Highest command sequence handed to the world
    pub last_processed_sequence: u32,
    /// Commands waiting for the next tick, ordered by sequence
    pub pending_commands: Vec<(u32, Command)>,
}

impl Client {
    pub fn new(player_id: EntityId, addr: SocketAddr) -> Self {
        Self {
            player_id,
            addr,
            last_seen: Instant::now(),
            last_processed_sequence: 0,
            pending_commands: Vec::new(),
        }
    }

    /// Buffers a command in sequence order
    ///
    /// Commands with a sequence at or below the last one already applied
    /// arrived too late and are dropped. Returns whether the command was
    /// kept.
    pub fn add_command(&mut self, sequence: u32, command: Command) -> bool {
        self.last_seen = Instant::now();
        if sequence <= self.last_processed_sequence {
            return false;
        }
        self.pending_commands.push((sequence, command));
        // Packets may arrive out of order
        self.pending_commands.sort_by_key(|(sequence, _)| *sequence);
        true
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing was heard from the session within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Sessions of one world, keyed by the player each one controls
pub struct ClientManager {
    clients: HashMap<EntityId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Attaches a session to a freshly created player
    ///
    /// Returns false when the world is at capacity.
    pub fn add_client(&mut self, player_id: EntityId, addr: SocketAddr) -> bool {
        if self.is_full() {
            return false;
        }
        info!("Session for player {} opened from {}", player_id, addr);
        self.clients.insert(player_id, Client::new(player_id, addr));
        true
    }

    /// Detaches a session. The world removes its player on the next tick.
    pub fn remove_client(&mut self, player_id: &EntityId) -> Option<Client> {
        let client = self.clients.remove(player_id)?;
        info!("Session for player {} closed", player_id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<EntityId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.player_id)
    }

    pub fn get(&self, player_id: &EntityId) -> Option<&Client> {
        self.clients.get(player_id)
    }

    /// Buffers a command for the session's player. Returns false for unknown
    /// players and stale sequences.
    pub fn add_command(&mut self, player_id: EntityId, sequence: u32, command: Command) -> bool {
        match self.clients.get_mut(&player_id) {
            Some(client) => client.add_command(sequence, command),
            None => false,
        }
    }

    pub fn touch(&mut self, player_id: EntityId) {
        if let Some(client) = self.clients.get_mut(&player_id) {
            client.touch();
        }
    }

    /// Removes sessions that have gone quiet
    ///
    /// Returns the removed sessions so their addresses can be told why.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client> {
        let timed_out: Vec<EntityId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.player_id)
            .collect();

        timed_out
            .iter()
            .filter_map(|player_id| {
                debug!("Session for player {} timed out", player_id);
                self.remove_client(player_id)
            })
            .collect()
    }

    /// Player ids and addresses of all sessions, in player id order
    pub fn get_client_addrs(&self) -> Vec<(EntityId, SocketAddr)> {
        let mut addrs: Vec<(EntityId, SocketAddr)> = self
            .clients
            .values()
            .map(|client| (client.player_id, client.addr))
            .collect();
        addrs.sort_by_key(|(player_id, _)| *player_id);
        addrs
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl CommandInbox for ClientManager {
    /// Hands over every buffered command: sessions in player id order, each
    /// session's commands in sequence order.
    fn drain(&mut self) -> Vec<QueuedCommand> {
        let mut player_ids: Vec<EntityId> = self.clients.keys().copied().collect();
        player_ids.sort_unstable();

        let mut drained = Vec::new();
        for player_id in player_ids {
            let Some(client) = self.clients.get_mut(&player_id) else {
                continue;
            };
            for (sequence, command) in client.pending_commands.drain(..) {
                client.last_processed_sequence = client.last_processed_sequence.max(sequence);
                drained.push(QueuedCommand {
                    player_id,
                    sequence,
                    command,
                });
            }
        }
        drained
    }

    fn is_connected(&self, player_id: EntityId) -> bool {
        self.clients.contains_key(&player_id)
    }
}

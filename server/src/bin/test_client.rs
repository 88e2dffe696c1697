//! Bot client: joins a world, wanders, attacks and prints what happens.

use bincode::{deserialize, serialize};
use clap::Parser;
use rand::Rng;
use shared::{CharacterClass, Command, Event, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name
    #[arg(short, long, default_value = "Bot")]
    name: String,

    /// warrior, mage or ranger
    #[arg(short, long, default_value = "warrior")]
    class: String,

    /// Seconds to play before leaving
    #[arg(short, long, default_value_t = 30)]
    duration: u64,
}

fn parse_class(name: &str) -> Option<CharacterClass> {
    match name.to_ascii_lowercase().as_str() {
        "warrior" => Some(CharacterClass::Warrior),
        "mage" => Some(CharacterClass::Mage),
        "ranger" => Some(CharacterClass::Ranger),
        _ => None,
    }
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, addr).await?;
    Ok(())
}

fn describe(event: &Event) -> Option<String> {
    let text = match event {
        Event::Combat {
            attacker_id,
            target_id,
            damage,
            target_health,
        } => format!(
            "{} hit {} for {} ({} left)",
            attacker_id, target_id, damage, target_health
        ),
        Event::ItemPickup { item_name, .. } => format!("picked up {}", item_name),
        Event::LevelUp { player_id, level } => format!("{} reached level {}", player_id, level),
        Event::BossSpawn {
            species, landmark, ..
        } => format!("{:?} appeared at {}", species, landmark),
        Event::BossKill {
            species,
            killer_name,
            ..
        } => format!("{} slew {:?}", killer_name, species),
        Event::PlayerDeath { player_id, .. } => format!("{} died", player_id),
        Event::CommandRejected { reason, .. } => format!("rejected: {}", reason),
        _ => return None,
    };
    Some(text)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let class = parse_class(&args.class).ok_or("class must be warrior, mage or ranger")?;
    let server_addr = args.server.parse::<SocketAddr>()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let connect = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        name: args.name.clone(),
        class,
    };
    println!("Sending connection request to {}", server_addr);
    send(&socket, &connect, server_addr).await?;

    let mut buf = vec![0u8; 65_536];
    let player_id = loop {
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .map_err(|_| "no answer from server")??;
        match deserialize::<Packet>(&buf[..len]) {
            Ok(Packet::Connected {
                player_id,
                world_id,
                layout,
            }) => {
                println!(
                    "Joined world {} as player {} ({} biomes, {} exits, {} landmarks)",
                    world_id,
                    player_id,
                    layout.biomes.len(),
                    layout.exits.len(),
                    layout.landmarks.len()
                );
                break player_id;
            }
            Ok(Packet::Disconnected { reason }) => {
                println!("Connection refused: {}", reason);
                return Ok(());
            }
            // Snapshots may race the reply
            Ok(_) => continue,
            Err(e) => println!("Failed to deserialize packet: {}", e),
        }
    };

    let mut rng = rand::thread_rng();
    let mut sequence = 0u32;
    let mut act = interval(Duration::from_millis(500));
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    while Instant::now() < deadline {
        tokio::select! {
            _ = act.tick() => {
                sequence += 1;
                let command = if rng.gen_bool(0.3) {
                    Command::Attack
                } else {
                    Command::Movement {
                        direction_x: rng.gen_range(-1..=1),
                        direction_y: rng.gen_range(-1..=1),
                    }
                };
                send(&socket, &Packet::Command { sequence, command }, server_addr).await?;
                send(&socket, &Packet::Heartbeat, server_addr).await?;
            }
            received = socket.recv_from(&mut buf) => {
                let (len, _) = received?;
                match deserialize::<Packet>(&buf[..len]) {
                    Ok(Packet::Snapshot { snapshot, .. }) => {
                        if snapshot.tick % 100 == 0 {
                            if let Some(me) = snapshot.players.iter().find(|p| p.id == player_id) {
                                println!(
                                    "tick {}: at ({:.0}, {:.0}), {}/{} hp, {} creatures nearby",
                                    snapshot.tick,
                                    me.position.x,
                                    me.position.y,
                                    me.health,
                                    me.max_health,
                                    snapshot.creatures.len()
                                );
                            }
                        }
                    }
                    Ok(Packet::Events { tick, events }) => {
                        for text in events.iter().filter_map(describe) {
                            println!("tick {}: {}", tick, text);
                        }
                    }
                    Ok(Packet::Disconnected { reason }) => {
                        println!("Disconnected: {}", reason);
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => println!("Failed to deserialize packet: {}", e),
                }
            }
        }
    }

    send(&socket, &Packet::Disconnect, server_addr).await?;
    println!("Left after {} commands", sequence);
    Ok(())
}

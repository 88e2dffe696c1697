use clap::Parser;
use env_logger::Env;
use log::info;
use server::config::WorldConfig;
use server::network::Server;

/// Authoritative world server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Ticks per second
    #[arg(short, long, default_value_t = 20)]
    tick_rate: u32,

    /// Players per world before a new world is opened
    #[arg(short, long)]
    max_players: Option<usize>,

    /// World configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for reproducible worlds
    #[arg(short, long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading world configuration from {}", path);
            WorldConfig::load(path)?
        }
        None => WorldConfig::default(),
    };
    config.tick_interval_ms = u64::from(1000 / args.tick_rate.max(1));
    if let Some(max_players) = args.max_players {
        config.max_players = max_players;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let addr = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} at {}Hz, {} players per world",
        addr, args.tick_rate, config.max_players
    );

    let mut server = Server::new(&addr, config).await?;
    server.run().await?;

    Ok(())
}

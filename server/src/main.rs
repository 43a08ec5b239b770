use clap::Parser;
use log::{error, info};
use server::config::{GameConfig, ServerConfig};
use server::network::Server;
use std::time::Duration;

/// Authoritative server for the brainrot arena.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Tick period in milliseconds
    #[arg(short, long, default_value = "100")]
    tick_ms: u64,

    /// Maximum number of players in the arena
    #[arg(short, long, default_value = "10")]
    max_players: usize,

    /// Maximum number of open connections
    #[arg(long, default_value = "64")]
    max_connections: usize,

    /// Seed for spawn randomness
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        max_connections: args.max_connections,
        seed: args.seed,
        game: GameConfig {
            max_players: args.max_players,
            tick_period: Duration::from_millis(args.tick_ms.max(1)),
            ..GameConfig::default()
        },
    };

    info!(
        "Starting server on {} (max {} players, {}ms tick)",
        config.bind_addr,
        config.game.max_players,
        config.game.tick_period.as_millis()
    );

    let server = Server::new(config).await?;
    let handle = server.handle();
    let mut server_task = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
            let _ = server_task.await;
        }
    }

    Ok(())
}

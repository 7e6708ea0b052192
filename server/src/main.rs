use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use std::path::PathBuf;

/// Main-method of the application.
/// Parses command-line arguments, then runs the server until it stops or Ctrl+C is pressed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "3000")]
        port: u16,
        /// Tick rate (updates per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
        /// Maximum simultaneous connections
        #[clap(short, long, default_value = "512")]
        max_connections: usize,
        /// File the leaderboard is loaded from and saved to
        #[clap(short, long, default_value = "leaderboard.json")]
        leaderboard: PathBuf,
        /// Keep the leaderboard in memory only
        #[clap(long)]
        no_persist: bool,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        max_connections: args.max_connections,
        leaderboard_path: (!args.no_persist).then_some(args.leaderboard),
    };

    let mut server = Server::new(&config).await?;

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

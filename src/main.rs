//! tetris-env binary: serve the session protocol over TCP.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tetris_env::session::{run_server, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "tetris-env", about = "Headless Tetris engine session server")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// TCP port (0 picks an ephemeral port).
    #[arg(long, default_value_t = 7777)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
    };

    tokio::select! {
        result = run_server(config, None) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received; shutting down");
            Ok(())
        }
    }
}

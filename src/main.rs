//! Chat Server - Entry Point
//!
//! Binds the listener and serves clients until Ctrl-C.

use clap::Parser;
use tracing::{info, warn};

use roomchat::server::{DEFAULT_ADDR, DEFAULT_MAX_CONNECTIONS};
use roomchat::{logging, Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "roomchat-server")]
#[command(about = "Multi-room chat server", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    bind: String,

    /// Maximum number of clients served at once
    #[arg(short, long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=roomchat=trace
    logging::init("roomchat=info,roomchat_server=info", false);

    let args = Args::parse();
    let config = ServerConfig {
        bind_addr: args.bind,
        max_connections: args.max_connections,
    };

    let server = Server::bind(&config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Bye");
    Ok(())
}

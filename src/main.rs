use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use travel_agents::{build_state, config::Config, create_router, utils::init_logger};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Travel itinerary agent server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let _log_guard = init_logger(config.logging.log_dir.as_deref());
    info!("Configuration loaded: {:?}", config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create shared state and router
    let idle_ttl = config.sessions.idle_ttl();
    let state = build_state(config);
    if let Some(ttl) = idle_ttl {
        state.sessions.spawn_sweeper(SESSION_SWEEP_INTERVAL, ttl);
        info!(idle_ttl_secs = ttl.as_secs(), "Idle session eviction enabled");
    }
    let app = create_router(state).layer(TraceLayer::new_for_http());

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

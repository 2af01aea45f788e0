use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::watch;
use warp::Filter;

use wshub::config::HubOptions;
use wshub::constants::WS_PATH;
use wshub::core::{EventHandler, Hub, SessionContext};
use wshub::error::Result;
use wshub::handlers::ws_route;

#[derive(Serialize)]
struct Welcome {
    r#type: &'static str,
    client_id: String,
    timestamp: chrono::DateTime<Utc>,
}

/// Demo handler: greets each client, puts everyone in a lobby group, and
/// echoes every message back to its sender.
struct EchoHandler;

#[async_trait]
impl EventHandler for EchoHandler {
    async fn on_connected(&self, ctx: &SessionContext) -> Result<()> {
        ctx.connection()
            .send_json(&Welcome {
                r#type: "welcome",
                client_id: ctx.id().to_string(),
                timestamp: Utc::now(),
            })
            .await?;
        ctx.join_group("lobby").await;
        Ok(())
    }

    async fn on_message(&self, ctx: &SessionContext, payload: &[u8]) -> Result<()> {
        ctx.send(payload).await
    }

    async fn on_disconnected(&self, ctx: &SessionContext) {
        info!("session {} finished", ctx.id());
    }
}

#[tokio::main]
async fn main() {
    // Initialize env
    match dotenvy::dotenv() {
        Ok(_) => info!("Environment variables loaded from .env file"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    };

    // Initialize logging
    env_logger::init();

    // Load config from the environment
    let options = match HubOptions::from_env() {
        Ok(options) => Arc::new(options),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Configuration: host={}, port={}, max_message_size={}",
        options.host, options.port, options.max_message_size
    );

    let hub = Arc::new(Hub::new());
    let handler: Arc<dyn EventHandler> = Arc::new(EchoHandler);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create WebSocket route
    let ws = ws_route(
        WS_PATH,
        hub.clone(),
        options.clone(),
        handler,
        shutdown_rx.clone(),
    );

    // Create health check route
    let health = warp::path("health").map(|| "OK");

    let routes = ws.or(health);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", options.host, options.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting wshub server on {}", addr);

    let mut shutdown_signal = shutdown_rx.clone();
    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown_signal.changed().await;
        info!("Shutting down");
    });

    // Flip the shutdown channel on ctrl-c; every session loop observes it
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    server.await;
}

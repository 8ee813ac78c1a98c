use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use trade_sync::bin_common::{load_config_from_env, ConfigType};
use trade_sync::hypersockets::{ClientEvent, ConnectionHooks, HyperSocketError};
use trade_sync::tradesync::{init_tracing, RestClient, SyncConfig, TradingHub, TradingStream};
use tracing::{debug, info, warn};

/// Polling interval for client events
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Logs transport errors surfaced by the connection driver
struct MonitorHooks;

impl ConnectionHooks for MonitorHooks {
    fn on_connect(&self) {
        debug!("[Monitor] Hook: connected");
    }

    fn on_disconnect(&self) {
        debug!("[Monitor] Hook: disconnected");
    }

    fn on_error(&self, error: &HyperSocketError) {
        debug!("[Monitor] Hook: transport error: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(ConfigType::Sync);
    let config = SyncConfig::load(&config_path)?;

    init_tracing(&config.log_level);
    config.log();

    let session = config.access_token.clone();
    if session.is_none() {
        warn!("[Monitor] No session token set, stream waits until one is provided");
    }

    let rest = if config.rest.is_configured() {
        Some(RestClient::new(&config.rest.base_url, config.rest.timeout())?.with_token(session.clone()))
    } else {
        None
    };

    let stream = TradingStream::start(&config.stream, session, Arc::new(MonitorHooks)).await?;
    let hub = stream.hub().clone();

    let handles = vec![
        hub.on_order_update(|order| {
            info!(
                "[Monitor] Order {} {} {} {} filled {}/{}",
                order.order_id, order.status, order.side, order.symbol, order.filled_quantity, order.quantity
            );
        }),
        hub.on_position_update(|position| {
            info!(
                "[Monitor] Position {} {} qty {} pnl {:.2}",
                position.position_id, position.symbol, position.quantity, position.unrealized_pnl
            );
        }),
        hub.on_pnl_update(|pnl| {
            info!("[Monitor] P&L total {:.2} day {:.2}", pnl.total_pnl, pnl.day_pnl);
        }),
    ];

    print_banner("Trade Monitor");
    resync(&hub, rest.as_ref()).await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("[Monitor] Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(EVENT_POLL_INTERVAL) => {
                while let Some(event) = stream.try_recv_event() {
                    if handle_client_event(event) {
                        resync(&hub, rest.as_ref()).await;
                    }
                }
            }
        }
    }

    for handle in &handles {
        handle.unregister();
    }
    if let Err(e) = stream.shutdown().await {
        warn!("[Monitor] Error during shutdown: {}", e);
    }

    info!(
        "[Monitor] Final state: {} orders, {} positions",
        hub.order_count(),
        hub.position_count()
    );
    print_shutdown("Trade Monitor");
    Ok(())
}

/// Log a client event. Returns true when a resync is due.
fn handle_client_event(event: ClientEvent) -> bool {
    match event {
        ClientEvent::Connected => {
            info!("[Monitor] Connected to trading stream");
            true
        }
        ClientEvent::Disconnected => {
            warn!("[Monitor] Disconnected from trading stream");
            false
        }
        ClientEvent::Reconnecting(attempt) => {
            warn!("[Monitor] Reconnecting (attempt {})", attempt);
            false
        }
        ClientEvent::Error(err) => {
            warn!("[Monitor] Error: {}", err);
            false
        }
    }
}

async fn resync(hub: &TradingHub, rest: Option<&RestClient>) {
    let Some(rest) = rest else {
        debug!("[Monitor] REST not configured, skipping resync");
        return;
    };
    if let Err(e) = hub.resync(rest).await {
        warn!("[Monitor] Resync incomplete: {:#}", e);
    }
}

fn print_banner(name: &str) {
    info!("");
    info!("========================================");
    info!("Starting {}", name);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(name: &str) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", name);
    info!("========================================");
}

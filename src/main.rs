//! Cerberus Monitor - multi-chain whale-transaction monitor
//!
//! This is the main entry point: it wires the source adapters, the alert
//! pipeline, and the orchestrator together and serves the status/control
//! API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cerberus_monitor::alerts::{AlertDispatcher, ExplorerLinks, Notifier, TelegramNotifier};
use cerberus_monitor::classify::Thresholds;
use cerberus_monitor::config::MonitorConfig;
use cerberus_monitor::dedup::DedupCache;
use cerberus_monitor::handlers::{
    health_check, monitor_start, monitor_status, monitor_stop, AppState,
};
use cerberus_monitor::models::ChainSource;
use cerberus_monitor::orchestrator::{MonitorOrchestrator, SourceRuntime};
use cerberus_monitor::pipeline::AlertPipeline;
use cerberus_monitor::sources::{
    AccountChainAdapter, EsploraClient, HttpTxLookup, PerpVenueAdapter,
};
use cerberus_monitor::supervisor::{ReconnectPolicy, WsConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting Cerberus Monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Configuration loaded"
    );
    tracing::info!(
        account_spot = config.account_chain.spot_threshold_native,
        account_contract_usd = config.account_chain.contract_threshold_usd,
        account_reference_price_usd = config.account_chain.reference_price_usd,
        perp_spot_usd = config.perp_venue.spot_threshold_usd,
        perp_contract_usd = config.perp_venue.contract_threshold_usd,
        utxo_spot = config.utxo_chain.spot_threshold_native,
        "Alert thresholds loaded; contract classification uses static reference prices"
    );

    let thresholds = Thresholds::from_config(&config);
    let dedup = Arc::new(DedupCache::new(config.dedup.capacity));

    let notifier = Arc::new(TelegramNotifier::new(
        config.notifications.telegram.bot_token.clone(),
        config.notifications.telegram.enabled,
    ));
    if !notifier.is_enabled() {
        tracing::warn!("Telegram notifier disabled, alerts will be dropped");
    }

    let dispatcher = AlertDispatcher::new(
        notifier,
        config.notifications.telegram.chat_id.clone(),
        ExplorerLinks {
            account_chain: config.account_chain.explorer_url.clone(),
            utxo_chain: config.utxo_chain.explorer_url.clone(),
            perp_venue: config.perp_venue.explorer_url.clone(),
        },
    );
    let pipeline = Arc::new(AlertPipeline::new(thresholds, dedup, dispatcher));

    let lookup = Arc::new(HttpTxLookup::new(&config.account_chain.rpc_url));
    let account_adapter = Arc::new(AccountChainAdapter::new(
        lookup,
        pipeline.clone(),
        &config.account_chain.defi_programs,
    ));
    let perp_adapter = Arc::new(PerpVenueAdapter::new(
        pipeline.clone(),
        config.perp_venue.symbols.clone(),
    ));
    let utxo_client = Arc::new(EsploraClient::new(&config.utxo_chain.api_url));

    let sources = vec![
        SourceRuntime::Push {
            adapter: account_adapter,
            connector: Arc::new(WsConnector::new(&config.account_chain.ws_url)),
        },
        SourceRuntime::Push {
            adapter: perp_adapter,
            connector: Arc::new(WsConnector::new(&config.perp_venue.ws_url)),
        },
        SourceRuntime::Poll {
            source: ChainSource::UtxoChain,
            client: utxo_client,
            interval: Duration::from_secs(config.utxo_chain.poll_interval_secs),
        },
    ];

    let orchestrator = Arc::new(MonitorOrchestrator::new(
        sources,
        pipeline,
        ReconnectPolicy::from_config(&config.reconnect),
    ));
    orchestrator.start();

    let app_state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
        started_at: Utc::now(),
    });

    let api_routes = Router::new()
        .route("/monitor/status", get(monitor_status))
        .route("/monitor/start", post(monitor_start))
        .route("/monitor/stop", post(monitor_stop));

    let app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");

    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cerberus_monitor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Load and validate configuration
fn load_config() -> anyhow::Result<MonitorConfig> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = MonitorConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    Ok(config)
}

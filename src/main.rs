use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use briq_connect::api::{build_router, AppState};
use briq_connect::config::AppConfig;
use briq_connect::gateway::client::{BriqClient, BriqClientConfig, GatewayApi};
use briq_connect::logging::init_tracing;
use briq_connect::middleware::logging::{request_logging_middleware, UuidRequestId};
use briq_connect::platform::client::{CommercePlatform, PlatformClient, PlatformClientConfig};
use briq_connect::services::session_sync::SessionSyncManager;
use briq_connect::services::webhook_processor::WebhookProcessor;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;

    init_tracing(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        webhooks_enabled = config.briq.webhook_secret.is_some(),
        "Starting briq-connect service"
    );
    if config.briq.webhook_secret.is_none() {
        info!("BRIQ_WEBHOOK_SECRET not set, webhook deliveries will be rejected");
    }

    let gateway: Arc<dyn GatewayApi> = Arc::new(
        BriqClient::new(BriqClientConfig {
            base_url: config.briq.api_url.clone(),
            username: config.briq.api_username.clone(),
            password: config.briq.api_password.clone(),
            timeout_secs: config.briq.request_timeout,
            max_retries: config.briq.max_retries,
        })
        .map_err(|e| anyhow::anyhow!("failed to initialize gateway client: {}", e))?,
    );

    let platform: Arc<dyn CommercePlatform> = Arc::new(
        PlatformClient::new(PlatformClientConfig {
            base_url: config.platform.api_url.clone(),
            api_key: config.platform.api_key.clone(),
            timeout_secs: config.platform.request_timeout,
            max_retries: config.platform.max_retries,
        })
        .map_err(|e| anyhow::anyhow!("failed to initialize platform client: {}", e))?,
    );

    let state = AppState {
        webhook_secret: config
            .briq
            .webhook_secret
            .as_ref()
            .map(|secret| Arc::new(secret.clone().into_bytes())),
        signature_tolerance: Duration::from_secs(config.briq.signature_tolerance_secs),
        processor: Arc::new(WebhookProcessor::new(platform.clone())),
        session_sync: Arc::new(SessionSyncManager::new(gateway, platform)),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

mod form;
mod problem;
mod registry;
mod router;
mod sse;
mod telemetry;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tracing::{debug, info};

use store_setup_api::StoreApiClient;
use store_setup_util::{load_env_file, AppConfig};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;
    if let Some(path) = env_file {
        debug!(stage = "app", path = %path.display(), "loaded environment file");
    }

    let http = reqwest::Client::builder()
        .timeout(config.api_timeout)
        .build()?;
    let api = StoreApiClient::new(config.api_endpoint.clone(), config.domain_suffix.clone(), http);
    if config.environment.is_development() {
        debug!(
            stage = "app",
            api = %config.api_endpoint,
            suffix = %config.domain_suffix,
            debounce_ms = config.debounce.as_millis() as u64,
            "store api configured"
        );
    }

    let forms = registry::FormRegistry::new(Arc::new(api), config.debounce);
    forms.spawn_sweeper(config.session_ttl, SWEEP_INTERVAL);

    let state = router::AppState::new(
        metrics,
        forms,
        config.sse_heartbeat,
        &config.domain_suffix,
    );

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}

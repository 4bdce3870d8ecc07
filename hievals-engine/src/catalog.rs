//! Provider catalog fetch with daemon autostart.
//!
//! The catalog lives behind `/config/providers` on a running daemon. When
//! none answers on the base port, a temporary daemon is started just long
//! enough to serve the snapshot, then stopped on every exit path.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use hievals_models::{ProviderCatalog, fetch_providers};

use crate::config::EngineConfig;
use crate::daemon::AgentDaemon;
use crate::error::{Error, Result};

/// How long a freshly-started daemon gets to serve the providers endpoint.
const CATALOG_WAIT: Duration = Duration::from_secs(5);

/// Pause between providers-endpoint probes.
const CATALOG_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Fetch the provider catalog, starting a temporary daemon if needed.
pub async fn fetch_catalog(config: &EngineConfig) -> Result<ProviderCatalog> {
    let base_url = format!("http://127.0.0.1:{}", config.base_port);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    match fetch_providers(&client, &base_url).await {
        Ok(catalog) => return Ok(catalog),
        Err(e) => debug!(error = %e, "no agent daemon answering on the base port"),
    }

    info!(%base_url, "starting a temporary agent daemon for the catalog fetch");
    let mut daemon = AgentDaemon::spawn(&config.agent_command, Path::new("."), config.base_port)?;

    let result = wait_and_fetch(&client, &base_url).await;
    daemon.terminate().await;
    result
}

async fn wait_and_fetch(client: &reqwest::Client, base_url: &str) -> Result<ProviderCatalog> {
    let deadline = tokio::time::Instant::now() + CATALOG_WAIT;
    let mut last_error = String::new();

    while tokio::time::Instant::now() < deadline {
        match fetch_providers(client, base_url).await {
            Ok(catalog) => return Ok(catalog),
            Err(e) => {
                last_error = e.to_string();
                tokio::time::sleep(CATALOG_POLL_INTERVAL).await;
            }
        }
    }

    Err(Error::ProvidersUnavailable {
        timeout: CATALOG_WAIT,
        last_error,
    })
}

//! Wiring of configuration, credentials and probes at process start

use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use crate::config::{AppConfig, GcpSettings};
use crate::error::{HealthError, Result};
use crate::health::checks::{GoogleApi, MetadataServer, StaticToken, TokenSource};
use crate::health::{self, Aggregator};

const USER_AGENT: &str = concat!("cloud-health/", env!("CARGO_PKG_VERSION"));

/// Resolves credentials and the project id, then registers every probe
pub async fn google_cloud_aggregator(config: &AppConfig) -> Result<Aggregator> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let metadata = MetadataServer::new(client.clone(), config.auth.metadata_url.as_str());

    let tokens: Arc<dyn TokenSource> = match config.auth.access_token.as_deref() {
        Some(token) if !token.is_empty() => Arc::new(StaticToken::new(token)),
        _ => Arc::new(metadata.clone()),
    };

    let project_id = match config.gcp.project_id.as_deref() {
        Some(project_id) if !project_id.is_empty() => project_id.to_string(),
        _ => {
            warn!("No project id configured, asking the metadata server");
            metadata.project_id().await.map_err(|e| {
                HealthError::InvalidConfig(format!(
                    "project id is not configured and the metadata server lookup failed: {e:#}"
                ))
            })?
        }
    };

    let settings = GcpSettings::resolve(config, project_id);
    info!(
        project_id = %settings.project_id,
        region = %settings.region,
        location = %settings.location,
        "Resolved Google Cloud settings"
    );

    health::google_cloud_aggregator(&GoogleApi::new(client, tokens, settings))
}

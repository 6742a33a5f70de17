//! Secret store probe

use anyhow::Context;
use async_trait::async_trait;

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

/// Lists at most one secret in the project
pub struct SecretManagerProbe {
    api: GoogleApi,
}

impl SecretManagerProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Probe for SecretManagerProbe {
    fn name(&self) -> &str {
        "secret_manager"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let settings = self.api.settings();
        let url = format!(
            "{}/v1/projects/{}/secrets",
            settings.endpoints.secret_manager, settings.project_id
        );

        let body = self
            .api
            .get(&url, &[("pageSize", "1")])
            .await
            .context("listing secrets")?;

        let available = body["secrets"]
            .as_array()
            .is_some_and(|secrets| !secrets.is_empty());
        ctx.record("secrets_available", available);
        Ok(())
    }
}

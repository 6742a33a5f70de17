//! Document parsing probe

use anyhow::Context;
use async_trait::async_trait;

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

/// Lists processors in the configured location
pub struct DocumentAiProbe {
    api: GoogleApi,
}

impl DocumentAiProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Probe for DocumentAiProbe {
    fn name(&self) -> &str {
        "document_ai"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let settings = self.api.settings();
        let url = format!(
            "{}/v1/projects/{}/locations/{}/processors",
            settings.endpoints.document_ai, settings.project_id, settings.location
        );

        let body = self
            .api
            .get(&url, &[("pageSize", "1")])
            .await
            .context("listing processors")?;

        let first = body["processors"]
            .as_array()
            .and_then(|processors| processors.first());

        ctx.record("processors_available", first.is_some());
        if let Some(name) = first.and_then(|p| p["name"].as_str()) {
            ctx.record("sample_processor", name);
        }
        Ok(())
    }
}

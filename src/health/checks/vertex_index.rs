//! Vector index probe

use anyhow::Context;
use async_trait::async_trait;

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

/// Counts Vertex AI indexes in the configured region, across every page
pub struct VertexIndexProbe {
    api: GoogleApi,
}

impl VertexIndexProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Probe for VertexIndexProbe {
    fn name(&self) -> &str {
        "vertex_ai_index"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let settings = self.api.settings();
        let url = format!(
            "{}/v1/projects/{}/locations/{}/indexes",
            settings.endpoints.aiplatform, settings.project_id, settings.region
        );

        let mut count = 0;
        let mut page_token: Option<String> = None;
        loop {
            let body = match page_token.as_deref() {
                Some(token) => self.api.get(&url, &[("pageToken", token)]).await,
                None => self.api.get(&url, &[]).await,
            }
            .context("listing indexes")?;

            count += body["indexes"].as_array().map_or(0, Vec::len);

            match body["nextPageToken"].as_str().filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        ctx.record("indexes_count", count);
        Ok(())
    }
}

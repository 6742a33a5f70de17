//! Object storage probe

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

/// Lists at most one bucket in the project
pub struct CloudStorageProbe {
    api: GoogleApi,
}

impl CloudStorageProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Probe for CloudStorageProbe {
    fn name(&self) -> &str {
        "cloud_storage"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let settings = self.api.settings();
        let url = format!("{}/storage/v1/b", settings.endpoints.storage);

        let body = self
            .api
            .get(&url, &[("project", settings.project_id.as_str()), ("maxResults", "1")])
            .await
            .context("listing buckets")?;

        let buckets: Vec<Value> = body["items"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|bucket| bucket["name"].as_str())
            .map(Value::from)
            .collect();

        ctx.record("buckets", buckets);
        Ok(())
    }
}

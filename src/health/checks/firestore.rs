//! Document database probe

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{Map, Value, json};

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

const COLLECTION: &str = "health_checks";
const DOCUMENT: &str = "test_health_check";
const SOURCE: &str = "health_check_api";

/// Writes, reads back and deletes a marker document
pub struct FirestoreProbe {
    api: GoogleApi,
}

impl FirestoreProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    fn document_url(&self) -> String {
        let settings = self.api.settings();
        format!(
            "{}/v1/projects/{}/databases/{}/documents/{COLLECTION}/{DOCUMENT}",
            settings.endpoints.firestore, settings.project_id, settings.firestore_database
        )
    }
}

#[async_trait]
impl Probe for FirestoreProbe {
    fn name(&self) -> &str {
        "firestore"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let url = self.document_url();
        let document = json!({
            "fields": {
                "timestamp": { "stringValue": Utc::now().to_rfc3339() },
                "source": { "stringValue": SOURCE },
            }
        });

        self.api
            .request(Method::PATCH, &url, &[], Some(&document))
            .await
            .context("writing test document")?;
        ctx.record("write_test", "successful");

        let stored = self.api.get(&url, &[]).await.context("reading test document")?;
        let data = decode_fields(&stored);
        if data.get("source").and_then(Value::as_str) != Some(SOURCE) {
            bail!("test document read back with unexpected contents");
        }
        ctx.record("read_test", "successful");
        ctx.record("data", Value::Object(data));

        self.api
            .request(Method::DELETE, &url, &[], None)
            .await
            .context("deleting test document")?;
        Ok(())
    }
}

/// Flattens Firestore's typed field values (`{"stringValue": "x"}`) into plain JSON
fn decode_fields(document: &Value) -> Map<String, Value> {
    document["fields"]
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(key, typed)| {
                    let value = typed
                        .as_object()
                        .and_then(|t| t.values().next())
                        .cloned()
                        .unwrap_or(Value::Null);
                    (key.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

//! Generative model inference probe

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

const PROMPT: &str = "What is Google Cloud Platform?";

/// Characters of the model answer kept in the details
const RESPONSE_PREVIEW_CHARS: usize = 100;

/// Asks the configured Gemini model a short question
pub struct VertexGeminiProbe {
    api: GoogleApi,
}

impl VertexGeminiProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Probe for VertexGeminiProbe {
    fn name(&self) -> &str {
        "vertex_ai_gemini"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let settings = self.api.settings();
        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            settings.endpoints.aiplatform,
            settings.project_id,
            settings.region,
            settings.gemini_model
        );
        let request = json!({
            "contents": [{ "role": "user", "parts": [{ "text": PROMPT }] }]
        });

        let body = self
            .api
            .request(Method::POST, &url, &[], Some(&request))
            .await
            .context("generating content")?;

        let text = response_text(&body).ok_or_else(|| anyhow!("model response contained no text"))?;
        ctx.record("response", preview(&text));
        Ok(())
    }
}

/// Concatenates the text parts of the first candidate
fn response_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    (!text.is_empty()).then_some(text)
}

fn preview(text: &str) -> String {
    if text.chars().count() > RESPONSE_PREVIEW_CHARS {
        let head: String = text.chars().take(RESPONSE_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

//! Authenticated access to Google Cloud REST APIs

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::GcpSettings;

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

/// Supplies OAuth bearer tokens for Google API calls
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> anyhow::Result<String>;
}

/// A token fixed at startup
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Client of the compute metadata server
///
/// Caches the default service account token until shortly before it expires.
/// Concurrent probes asking for a token while it is being refreshed wait for
/// the single in-flight request.
#[derive(Clone)]
pub struct MetadataServer {
    client: Client,
    base_url: String,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl MetadataServer {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Project the instance runs in
    pub async fn project_id(&self) -> anyhow::Result<String> {
        let url = format!("{}/computeMetadata/v1/project/project-id", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .context("querying metadata server for project id")?
            .error_for_status()?;

        let project_id = response.text().await?.trim().to_string();
        if project_id.is_empty() {
            bail!("metadata server returned an empty project id");
        }
        Ok(project_id)
    }

    async fn fetch_token(&self) -> anyhow::Result<TokenResponse> {
        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.base_url
        );
        let token = self
            .client
            .get(&url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .context("querying metadata server for access token")?
            .error_for_status()?
            .json::<TokenResponse>()
            .await?;
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for MetadataServer {
    async fn access_token(&self) -> anyhow::Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch_token().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        debug!(expires_in = fresh.expires_in, "Refreshed access token");

        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}

/// Shared handle used by every Google Cloud probe
#[derive(Clone)]
pub struct GoogleApi {
    client: Client,
    tokens: Arc<dyn TokenSource>,
    settings: Arc<GcpSettings>,
}

impl GoogleApi {
    pub fn new(client: Client, tokens: Arc<dyn TokenSource>, settings: GcpSettings) -> Self {
        Self {
            client,
            tokens,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &GcpSettings {
        &self.settings
    }

    /// Sends an authenticated request and decodes the JSON response
    ///
    /// Non-2xx responses become errors carrying the status and the API's
    /// own error message. An empty body decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> anyhow::Result<Value> {
        let token = self
            .tokens
            .access_token()
            .await
            .context("failed to obtain access token")?;

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            bail!("{status}: {}", api_error_message(&text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("decoding response body")
    }

    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        self.request(Method::GET, url, query, None).await
    }
}

/// Pulls the message out of a Google error envelope, falling back to the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{CloudSqlConfig, ServiceEndpoints};

    fn settings(base_url: &str) -> GcpSettings {
        GcpSettings {
            project_id: "demo".to_string(),
            region: "us-central1".to_string(),
            location: "us".to_string(),
            firestore_database: "prod-firestore".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            cloud_sql: CloudSqlConfig::default(),
            endpoints: ServiceEndpoints::uniform(base_url),
        }
    }

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error":{"code":403,"message":"Permission denied on resource","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(api_error_message(body), "Permission denied on resource");
        assert_eq!(api_error_message("bad gateway\n"), "bad gateway");
    }

    #[tokio::test]
    async fn request_sends_bearer_token_and_reports_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                r#"{"error":{"message":"caller lacks permission"}}"#,
            ))
            .mount(&server)
            .await;

        let api = GoogleApi::new(
            Client::new(),
            Arc::new(StaticToken::new("secret")),
            settings(&server.uri()),
        );

        let ok = api.get(&format!("{}/ok", server.uri()), &[]).await.unwrap();
        assert_eq!(ok["a"], 1);

        let err = api
            .get(&format!("{}/denied", server.uri()), &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "403 Forbidden: caller lacks permission");
    }

    #[tokio::test]
    async fn metadata_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metadata = MetadataServer::new(Client::new(), server.uri());

        assert_eq!(metadata.access_token().await.unwrap(), "ya29.token");
        assert_eq!(metadata.access_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn metadata_project_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/computeMetadata/v1/project/project-id"))
            .respond_with(ResponseTemplate::new(200).set_body_string("demo-project\n"))
            .mount(&server)
            .await;

        let metadata = MetadataServer::new(Client::new(), server.uri());

        assert_eq!(metadata.project_id().await.unwrap(), "demo-project");
    }
}

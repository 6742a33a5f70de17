//! Application configuration
//!
//! Supports multiple profiles (debug, release) layered over a shared default,
//! plus the environment variables of the hosting platform. Everything is
//! resolved once at startup and read-only afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, Map};
use serde::{Deserialize, Serialize};

/// Variables set by the deployment itself, mapped onto nested keys
const PLATFORM_VARS: [(&str, &str); 4] = [
    ("GOOGLE_CLOUD_PROJECT", "gcp__project_id"),
    ("PROJECT_ID", "gcp__project_id"),
    ("REGION", "gcp__region"),
    ("LOCATION", "gcp__location"),
];

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Output format of the log sink
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Aggregation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Outer deadline for a whole run; unset or zero means none
    pub deadline_ms: Option<u64>,
}

impl HealthConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Connection target of the relational database probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSqlConfig {
    /// Private address of the instance
    pub host: String,
    pub port: u16,
}

impl Default for CloudSqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
        }
    }
}

/// Google Cloud project settings consumed by the dependency probes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Project id; looked up on the metadata server when absent
    pub project_id: Option<String>,
    /// Region of regional services (Vertex AI)
    pub region: String,
    /// Multi-region location of Document AI
    pub location: String,
    pub firestore_database: String,
    pub gemini_model: String,
    pub cloud_sql: CloudSqlConfig,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            region: "us-central1".to_string(),
            location: "us".to_string(),
            firestore_database: "prod-firestore".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            cloud_sql: CloudSqlConfig::default(),
        }
    }
}

/// Credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Fixed bearer token; the metadata server is used when absent
    pub access_token: Option<String>,
    pub metadata_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            metadata_url: "http://metadata.google.internal".to_string(),
        }
    }
}

/// Optional base URL overrides, for emulators and private endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub storage: Option<String>,
    pub document_ai: Option<String>,
    pub firestore: Option<String>,
    pub secret_manager: Option<String>,
    pub aiplatform: Option<String>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// The active profile (debug, release, etc.)
    pub profile: String,
    pub server: ServerConfig,
    pub log: LogConfig,
    pub health: HealthConfig,
    pub gcp: GcpConfig,
    pub auth: AuthConfig,
    pub endpoints: EndpointsConfig,
}

impl AppConfig {
    /// Loads configuration for `profile` from files and the process environment
    ///
    /// Sources, lowest precedence first:
    /// 1. config/default.toml
    /// 2. config/{profile}.toml
    /// 3. Platform variables (PROJECT_ID or GOOGLE_CLOUD_PROJECT, REGION, LOCATION)
    /// 4. Variables with prefix HEALTH_ (e.g., HEALTH_GCP__REGION=europe-west1)
    ///
    /// Config files are searched for in:
    /// 1. Next to the executable (target/debug/config or target/release/config)
    /// 2. In the current directory (./config)
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        let vars: Map<String, String> = std::env::vars().collect();
        Self::load_from(profile, Self::find_config_dir().as_deref(), &vars)
    }

    /// Loads configuration from an explicit directory and variable set
    pub fn load_from(
        profile: &str,
        config_dir: Option<&Path>,
        vars: &Map<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for name in ["default", profile] {
            builder = match config_dir {
                Some(dir) => builder.add_source(File::from(dir.join(name).as_path()).required(false)),
                None => builder.add_source(File::with_name(&format!("config/{name}")).required(false)),
            };
        }

        builder = builder.add_source(
            Environment::default()
                .separator("__")
                .try_parsing(true)
                .source(Some(platform_vars(vars))),
        );

        // Use __ as separator for nested fields (e.g., HEALTH_SERVER__BIND)
        builder = builder.add_source(
            Environment::with_prefix("HEALTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars.clone())),
        );

        let config = builder.set_override("profile", profile)?.build()?;

        config.try_deserialize()
    }

    /// Finds the config directory by searching in multiple locations
    fn find_config_dir() -> Option<PathBuf> {
        if let Ok(exe_path) = std::env::current_exe()
            && let Some(exe_dir) = exe_path.parent()
        {
            let config_dir = exe_dir.join("config");
            if config_dir.exists() {
                return Some(config_dir);
            }
        }

        let cwd_config = PathBuf::from("config");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        None
    }
}

fn platform_vars(vars: &Map<String, String>) -> Map<String, String> {
    let mut mapped = Map::new();
    for (var, key) in PLATFORM_VARS {
        if let Some(value) = vars.get(var).filter(|v| !v.is_empty()) {
            mapped.insert(key.to_string(), value.clone());
        }
    }
    mapped
}

/// Base URLs of every Google API the probes call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub storage: String,
    pub document_ai: String,
    pub firestore: String,
    pub secret_manager: String,
    pub aiplatform: String,
}

impl ServiceEndpoints {
    /// Public endpoints, with regional hosts derived from `region` and `location`
    pub fn resolve(overrides: &EndpointsConfig, region: &str, location: &str) -> Self {
        let pick = |value: &Option<String>, default: String| {
            value
                .as_deref()
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default)
        };

        Self {
            storage: pick(&overrides.storage, "https://storage.googleapis.com".into()),
            document_ai: pick(
                &overrides.document_ai,
                format!("https://{location}-documentai.googleapis.com"),
            ),
            firestore: pick(&overrides.firestore, "https://firestore.googleapis.com".into()),
            secret_manager: pick(
                &overrides.secret_manager,
                "https://secretmanager.googleapis.com".into(),
            ),
            aiplatform: pick(
                &overrides.aiplatform,
                format!("https://{region}-aiplatform.googleapis.com"),
            ),
        }
    }

    /// Points every service at one base URL
    pub fn uniform(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            storage: base.clone(),
            document_ai: base.clone(),
            firestore: base.clone(),
            secret_manager: base.clone(),
            aiplatform: base,
        }
    }
}

/// Read-only settings handed to every dependency probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpSettings {
    pub project_id: String,
    pub region: String,
    pub location: String,
    pub firestore_database: String,
    pub gemini_model: String,
    pub cloud_sql: CloudSqlConfig,
    pub endpoints: ServiceEndpoints,
}

impl GcpSettings {
    /// Resolves probe settings from the loaded configuration
    pub fn resolve(config: &AppConfig, project_id: impl Into<String>) -> Self {
        let gcp = &config.gcp;
        Self {
            project_id: project_id.into(),
            region: gcp.region.clone(),
            location: gcp.location.clone(),
            firestore_database: gcp.firestore_database.clone(),
            gemini_model: gcp.gemini_model.clone(),
            cloud_sql: gcp.cloud_sql.clone(),
            endpoints: ServiceEndpoints::resolve(&config.endpoints, &gcp.region, &gcp.location),
        }
    }
}

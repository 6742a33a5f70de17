//! Relational database probe
//!
//! Connection parameters live in Secret Manager. The probe records what it
//! learned before every step that can fail, so a failed run still reports
//! which database it was talking to.

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection};
use tracing::warn;

use super::gcp::GoogleApi;
use crate::health::check::{Probe, ProbeContext};

const INSTANCE_SECRET: &str = "db-instance-connection-name";
const USER_SECRET: &str = "db-user";
const PASSWORD_SECRET: &str = "db-password";
const NAME_SECRET: &str = "db-name";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS health_check_test (
    id SERIAL PRIMARY KEY,
    check_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";
const INSERT_ROW: &str = "INSERT INTO health_check_test DEFAULT VALUES";

/// Connects with credentials from Secret Manager, then reads and writes a row
pub struct CloudSqlProbe {
    api: GoogleApi,
}

impl CloudSqlProbe {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    /// Latest version of a secret, decoded as UTF-8
    async fn access_secret(&self, name: &str) -> anyhow::Result<String> {
        let settings = self.api.settings();
        let url = format!(
            "{}/v1/projects/{}/secrets/{name}/versions/latest:access",
            settings.endpoints.secret_manager, settings.project_id
        );

        let body = self
            .api
            .get(&url, &[])
            .await
            .with_context(|| format!("accessing secret {name}"))?;
        let encoded = body["payload"]["data"]
            .as_str()
            .ok_or_else(|| anyhow!("secret {name} has no payload"))?;
        let bytes = STANDARD
            .decode(encoded)
            .with_context(|| format!("decoding secret {name}"))?;

        String::from_utf8(bytes).with_context(|| format!("secret {name} is not UTF-8"))
    }
}

#[async_trait]
impl Probe for CloudSqlProbe {
    fn name(&self) -> &str {
        "cloud_sql"
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        let instance = self.access_secret(INSTANCE_SECRET).await?;
        let user = self.access_secret(USER_SECRET).await?;
        let password = self.access_secret(PASSWORD_SECRET).await?;
        let db_name = self.access_secret(NAME_SECRET).await?;

        ctx.record("db_name", db_name.as_str());
        ctx.record("instance", instance.as_str());

        let target = &self.api.settings().cloud_sql;
        let options = PgConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&user)
            .password(&password)
            .database(&db_name)
            .disable_statement_logging();

        let mut conn = PgConnection::connect_with(&options)
            .await
            .with_context(|| format!("connecting to {instance}"))?;

        let outcome = exercise(&mut conn, ctx).await;

        if let Err(e) = conn.close().await {
            warn!(instance = %instance, error = %e, "Failed to close database connection");
        }

        outcome
    }
}

async fn exercise(conn: &mut PgConnection, ctx: &ProbeContext) -> anyhow::Result<()> {
    let version: String = sqlx::query_scalar("SELECT version()")
        .fetch_one(&mut *conn)
        .await
        .context("querying server version")?;
    ctx.record("version", version);

    sqlx::query(CREATE_TABLE)
        .execute(&mut *conn)
        .await
        .context("creating health_check_test")?;
    sqlx::query(INSERT_ROW)
        .execute(&mut *conn)
        .await
        .context("inserting test row")?;

    ctx.record("write_test", "passed");
    Ok(())
}

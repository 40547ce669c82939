//! Configuration loading.
//!
//! Values come from a TOML file (`--config` or the platform config dir),
//! then a `.env` file and `DWH_*` environment variables override them.

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::catalog::EntitySchema;

pub const APP_NAME: &str = "retail-dwh";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub layout: Layout,
    pub load: LoadOptions,
    pub journal: JournalConfig,
}

/// How the `password` credential is presented to the SQL API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    #[default]
    ProgrammaticAccessToken,
    Oauth,
    KeypairJwt,
}

impl AuthMethod {
    /// Value of the `X-Snowflake-Authorization-Token-Type` header
    pub fn token_type(&self) -> &'static str {
        match self {
            AuthMethod::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
            AuthMethod::Oauth => "OAUTH",
            AuthMethod::KeypairJwt => "KEYPAIR_JWT",
        }
    }
}

/// Warehouse connection settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub account: Option<String>,
    pub user: Option<String>,
    /// Never written back to disk
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub auth: AuthMethod,
    pub warehouse: Option<String>,
    pub database: String,
    pub role: Option<String>,
    /// Overrides `https://<account>.snowflakecomputing.com`
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            account: None,
            user: None,
            password: None,
            auth: AuthMethod::default(),
            warehouse: None,
            database: "BHATBHATENI_DWH".to_string(),
            role: None,
            endpoint: None,
            timeout_secs: 300,
            poll_interval_ms: 500,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("account", &self.account)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth", &self.auth)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("role", &self.role)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

/// Validated credentials needed to open a connection
pub struct Credentials<'a> {
    pub account: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

impl ConnectionConfig {
    pub fn credentials(&self) -> Result<Credentials<'_>> {
        let mut missing = Vec::new();
        if self.account.as_deref().map_or(true, str::is_empty) {
            missing.push("account (DWH_ACCOUNT)");
        }
        if self.user.as_deref().map_or(true, str::is_empty) {
            missing.push("user (DWH_USER)");
        }
        if self.password.as_deref().map_or(true, str::is_empty) {
            missing.push("password (DWH_PASSWORD)");
        }

        match (&self.account, &self.user, &self.password) {
            (Some(account), Some(user), Some(password)) if missing.is_empty() => Ok(Credentials {
                account,
                user,
                password,
            }),
            _ => bail!("Missing connection settings: {}", missing.join(", ")),
        }
    }

    /// Base URL of the account, without trailing slash
    pub fn base_url(&self) -> Result<String> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        let account = self.credentials()?.account;
        Ok(format!(
            "https://{}.snowflakecomputing.com",
            account.to_ascii_lowercase()
        ))
    }
}

/// Schema, stage and sequence names
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub staging_schema: String,
    pub working_schema: String,
    pub target_schema: String,
    pub stage: String,
    pub sequence: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            staging_schema: "STG".to_string(),
            working_schema: "TMP".to_string(),
            target_schema: "TGT".to_string(),
            stage: "ETL_FILE_STAGE".to_string(),
            sequence: "DWH_SURROGATE_KEY_SEQ".to_string(),
        }
    }
}

impl Layout {
    pub fn schemas(&self) -> [&str; 3] {
        [
            self.staging_schema.as_str(),
            self.working_schema.as_str(),
            self.target_schema.as_str(),
        ]
    }

    pub fn staging_table(&self, entity: &EntitySchema) -> String {
        format!("{}.STG_D_{}_LU", self.staging_schema, entity.table_stem)
    }

    pub fn working_table(&self, entity: &EntitySchema) -> String {
        format!("{}.TMP_D_{}_LU", self.working_schema, entity.table_stem)
    }

    pub fn target_table(&self, entity: &EntitySchema) -> String {
        format!("{}.DWH_D_{}_LU", self.target_schema, entity.table_stem)
    }

    /// The one sequence every target table draws surrogate keys from
    pub fn sequence_name(&self) -> String {
        format!("{}.{}", self.target_schema, self.sequence)
    }

    pub fn fact_table(&self, name: &str) -> String {
        format!("{}.{}", self.target_schema, name)
    }
}

/// What a MERGE does to the surrogate key of a row that already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Matched rows get a fresh key from the sequence
    #[default]
    Reassign,
    /// Matched rows keep the key they were first issued
    Stable,
}

/// COPY INTO and MERGE options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub skip_header: u32,
    pub compression: String,
    pub on_error: String,
    pub key_policy: KeyPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            skip_header: 1,
            compression: "gzip".to_string(),
            on_error: "ABORT_STATEMENT".to_string(),
            key_policy: KeyPolicy::default(),
        }
    }
}

/// Local run journal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl JournalConfig {
    pub fn resolve_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => {
                let dirs = project_dirs()?;
                Ok(dirs.data_dir().join("journal.db"))
            }
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME).context("Could not determine platform directories")
}

impl Config {
    /// Load config from an explicit path, or the default location if present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = project_dirs()?.config_dir().join("config.toml");
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DWH_*` overrides using the given lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let conn = &mut self.connection;
        if let Some(v) = lookup("DWH_ACCOUNT") {
            conn.account = Some(v);
        }
        if let Some(v) = lookup("DWH_USER") {
            conn.user = Some(v);
        }
        if let Some(v) = lookup("DWH_PASSWORD") {
            conn.password = Some(v);
        }
        if let Some(v) = lookup("DWH_WAREHOUSE") {
            conn.warehouse = Some(v);
        }
        if let Some(v) = lookup("DWH_DATABASE") {
            conn.database = v;
        }
        if let Some(v) = lookup("DWH_ROLE") {
            conn.role = Some(v);
        }
    }
}

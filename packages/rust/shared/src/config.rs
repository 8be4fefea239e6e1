//! Application configuration for the Stundenplan crawler.
//!
//! User config lives at `~/.stundenplan/stundenplan.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StundenplanError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stundenplan.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stundenplan";

/// Login form of the hosted myStundenplan application.
pub const DEFAULT_LOGIN_URL: &str = "https://www3.primuss.de/stpl/login.php";

// ---------------------------------------------------------------------------
// Config structs (matching stundenplan.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account and selection defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Crawl policies.
    #[serde(default)]
    pub crawl_policies: CrawlPoliciesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Login form URL.
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Tenant (`FH`) to log in to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    /// Account name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Name of the env var holding the password (never store the password itself).
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Crawl every listed semester instead of only the current one.
    #[serde(default)]
    pub all_semesters: bool,

    /// Default JSON-lines output file; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            tenant: None,
            username: None,
            password_env: default_password_env(),
            all_semesters: false,
            output: None,
        }
    }
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.into()
}
fn default_password_env() -> String {
    "STUNDENPLAN_PASSWORD".into()
}

/// How markup documents are represented in their records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupPayload {
    /// The normalized tree produced by the markup extractors.
    #[default]
    Extracted,
    /// The raw document text.
    Raw,
}

/// `[crawl_policies]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// Maximum concurrent requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Delay in ms before each request.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after a transport failure.
    #[serde(default)]
    pub retries: u32,

    /// Record payload for markup documents.
    #[serde(default)]
    pub markup_payload: MarkupPayload,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_timeout(),
            retries: 0,
            markup_payload: MarkupPayload::Extracted,
        }
    }
}

fn default_concurrency() -> u32 {
    4
}
fn default_rate_limit() -> u64 {
    100
}
fn default_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Runtime config (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Delay in ms before each request.
    pub rate_limit_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts after a transport failure (0 = no retry).
    pub retries: u32,
    /// Crawl every semester instead of only the current one.
    pub all_semesters: bool,
    /// Record payload for markup documents.
    pub markup_payload: MarkupPayload,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.crawl_policies.concurrency,
            rate_limit_ms: config.crawl_policies.rate_limit_ms,
            timeout_secs: config.crawl_policies.timeout_secs,
            retries: config.crawl_policies.retries,
            all_semesters: config.defaults.all_semesters,
            markup_payload: config.crawl_policies.markup_payload,
        }
    }
}

/// Login credentials for one run. Never serialized.
#[derive(Clone)]
pub struct Credentials {
    pub tenant: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stundenplan/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StundenplanError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stundenplan/stundenplan.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StundenplanError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        StundenplanError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StundenplanError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StundenplanError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StundenplanError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the password from the env var named in the config.
pub fn resolve_password(config: &AppConfig) -> Result<String> {
    let var_name = &config.defaults.password_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(StundenplanError::config(format!(
            "password not found. Pass --password or set the {var_name} environment variable."
        ))),
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP proxy used for every transfer when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

/// Stored credentials for one host (`[[logins]]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Host name the credentials apply to (matched case-insensitively).
    pub host: String,
    /// `user:password`.
    pub credentials: String,
}

/// Global configuration loaded from `~/.config/fetchq/config.toml`.
///
/// Plain values come before the table-valued fields so the file serializes
/// as valid TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchqConfig {
    /// Value of the User-Agent request header.
    pub user_agent: String,
    /// Seconds allowed for connection setup.
    pub connect_timeout_secs: u64,
    /// Transfers slower than this many bytes/sec for `low_speed_time_secs` are aborted.
    pub low_speed_limit: u32,
    pub low_speed_time_secs: u64,
    /// Ask the transfer engine for verbose protocol output on stderr.
    pub verbose: bool,
    /// Report 401 challenges as AUTH events and send stored credentials.
    pub http_auth: bool,
    /// Cookie file read and written by requests that ask for cookies.
    pub cookie_jar: Option<PathBuf>,
    /// Upper bound for a single wait between polls, in milliseconds.
    pub poll_interval_ms: u64,
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logins: Vec<LoginConfig>,
    /// Overrides for diagnostic texts, keyed by message name (e.g. `Not2xx`).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, String>,
}

impl Default for FetchqConfig {
    fn default() -> Self {
        Self {
            user_agent: "fetchq".to_string(),
            connect_timeout_secs: 60,
            low_speed_limit: 1,
            low_speed_time_secs: 60,
            verbose: false,
            http_auth: true,
            cookie_jar: None,
            poll_interval_ms: 100,
            proxy: None,
            logins: Vec::new(),
            messages: BTreeMap::new(),
        }
    }
}

impl FetchqConfig {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Transfer settings applied by the scheduler to every request.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub verbose: bool,
    pub http_auth: bool,
    pub cookie_jar: Option<PathBuf>,
    pub proxy: Option<ProxyConfig>,
}

impl FetchSettings {
    pub fn from_config(cfg: &FetchqConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            verbose: cfg.verbose,
            http_auth: cfg.http_auth,
            cookie_jar: cfg.cookie_jar.clone(),
            proxy: cfg.proxy.clone(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&FetchqConfig::default())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fetchq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchqConfig::default();
        let toml = default_cfg.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data =
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: FetchqConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

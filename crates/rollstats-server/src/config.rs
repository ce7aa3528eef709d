//! Server configuration.

use anyhow::Result;
use rollstats_core::{MessageFormat, RelaySettings, RelayTarget};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "ROLLSTATS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Relative paths are resolved against `root_dir`.
    #[serde(default = "default_campaign_dir")]
    pub campaign_dir: PathBuf,
    /// Defaults to `root_dir/roll.sqlite3`.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_empty_campaign_msg")]
    pub empty_campaign_msg: String,
    #[serde(default = "default_no_such_campaign_msg")]
    pub no_such_campaign_msg: String,
    #[serde(default = "default_no_such_sheet_msg")]
    pub no_such_sheet_msg: String,
    /// Form field carrying the sheet content on push.
    #[serde(default = "default_sheet_page_field")]
    pub sheet_page_field: String,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub campaigns: HashMap<String, CampaignConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_messages_by_server")]
    pub max_messages_by_server: usize,
}

/// Chat destination of one campaign's rolls.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    pub server_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub message_format: MessageFormat,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_root_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rollstats")
}

fn default_campaign_dir() -> PathBuf {
    PathBuf::from("campaigns")
}

fn default_empty_campaign_msg() -> String {
    "This campaign is empty.".to_string()
}

fn default_no_such_campaign_msg() -> String {
    "No such campaign!".to_string()
}

fn default_no_such_sheet_msg() -> String {
    "No such sheet!".to_string()
}

fn default_sheet_page_field() -> String {
    "page".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_messages_by_server() -> usize {
    100
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            max_messages_by_server: default_max_messages_by_server(),
        }
    }
}

impl RelayConfig {
    pub fn settings(&self) -> RelaySettings {
        RelaySettings {
            queue_capacity: self.queue_capacity,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_messages_by_server: self.max_messages_by_server,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            root_dir: default_root_dir(),
            campaign_dir: default_campaign_dir(),
            db_path: None,
            empty_campaign_msg: default_empty_campaign_msg(),
            no_such_campaign_msg: default_no_such_campaign_msg(),
            no_such_sheet_msg: default_no_such_sheet_msg(),
            sheet_page_field: default_sheet_page_field(),
            relay: RelayConfig::default(),
            campaigns: HashMap::new(),
        }
    }
}

impl Config {
    /// Config rooted at `root_dir` with every other value defaulted.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `$ROLLSTATS_CONFIG`, then `config/default.toml`, then defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }

        Ok(Config::default())
    }

    pub fn campaigns_path(&self) -> PathBuf {
        self.root_dir.join(&self.campaign_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => self.root_dir.join(path),
            None => self.root_dir.join("roll.sqlite3"),
        }
    }

    /// Relay destination of a campaign, if it has a chat server.
    pub fn relay_target(&self, campaign: &str) -> Option<RelayTarget> {
        let campaign = self.campaigns.get(campaign)?;
        Some(RelayTarget {
            server_id: campaign.server_id.clone()?,
            channel_id: campaign.channel_id.clone(),
            format: campaign.message_format,
        })
    }
}

//! Configuration management for hostdeck

use crate::feeds::FeedTopic;
use anyhow::{Context, Result};
use log::{debug, info, LevelFilter};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the JSON configuration file
pub const CONFIG_PATH_ENV: &str = "HOSTDECK_CONFIG";

/// Environment variable overriding the listen address
pub const LISTEN_ENV: &str = "HOSTDECK_LISTEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP surface binds to
    pub listen_addr: String,

    /// Log level
    pub log_level: String,

    /// Program used for privileged commands
    pub escalation_program: String,

    /// Arguments placed between the escalation program and the command
    pub escalation_args: Vec<String>,

    /// Wrapper enforcing the deadline on elevated commands (`timeout`); null disables it
    pub deadline_program: Option<String>,

    /// External tool names
    pub tools: ToolConfig,

    /// File read by the log view
    pub syslog_path: PathBuf,

    /// Services checked on the services page
    pub monitored_services: Vec<String>,

    /// Feed aggregation settings
    pub feeds: FeedConfig,

    /// Search results page; the encoded query is appended
    pub search_url: String,

    /// Freshness window of the system snapshot (in milliseconds)
    pub metrics_ttl_ms: u64,
}

/// Names of the external programs invoked by control actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub service_manager: String,
    pub package_manager: String,
    pub package_lister: String,
    pub network_scanner: String,
    pub web_scanner: String,
    pub shell: String,
    pub log_reader: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Freshness window of an aggregated topic (in seconds)
    pub ttl_secs: u64,

    /// Entries kept from each source
    pub entries_per_source: usize,

    /// Maximum number of cached topics
    pub cache_capacity: usize,

    /// Per-request HTTP timeout (in seconds)
    pub request_timeout_secs: u64,

    pub topics: Vec<FeedTopic>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4545".to_string(),
            log_level: "info".to_string(),
            escalation_program: "sudo".to_string(),
            escalation_args: vec!["-n".to_string()],
            deadline_program: Some("timeout".to_string()),
            tools: ToolConfig::default(),
            syslog_path: PathBuf::from("/var/log/syslog"),
            monitored_services: ["ssh", "apache2", "nginx", "docker", "mysql"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            feeds: FeedConfig::default(),
            search_url: "https://www.google.com/search?q=".to_string(),
            metrics_ttl_ms: 1000,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            service_manager: "systemctl".to_string(),
            package_manager: "apt".to_string(),
            package_lister: "dpkg".to_string(),
            network_scanner: "nmap".to_string(),
            web_scanner: "nikto".to_string(),
            shell: "sh".to_string(),
            log_reader: "tail".to_string(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            entries_per_source: 5,
            cache_capacity: 100,
            request_timeout_secs: 15,
            topics: vec![
                FeedTopic::new(
                    "gaming",
                    vec![
                        "https://www.ign.com/rss/articles.xml".to_string(),
                        "https://www.gamespot.com/feeds/news/".to_string(),
                    ],
                ),
                FeedTopic::new(
                    "cybersecurity",
                    vec![
                        "https://thehackernews.com/feed".to_string(),
                        "https://krebsonsecurity.com/feed/".to_string(),
                    ],
                ),
            ],
        }
    }
}

impl Config {
    /// Load configuration from `path`, the file named by `HOSTDECK_CONFIG`,
    /// or defaults, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);

        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };

        if let Ok(listen) = env::var(LISTEN_ENV) {
            info!("Listen address override from environment: {}", listen);
            config.listen_addr = listen;
        }

        Ok(config)
    }

    /// Parse a JSON configuration file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse configuration file {:?}", path))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Configured log level, falling back to info when it does not parse
    pub fn log_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    /// Look up a configured feed topic by name
    pub fn topic(&self, name: &str) -> Option<&FeedTopic> {
        self.feeds.topics.iter().find(|topic| topic.name == name)
    }
}

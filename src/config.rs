// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FinderError;

pub const ENV_CONFIG_PATH: &str = "GFL_CONFIG_PATH";
const ENV_INTERVAL_SECS: &str = "GFL_INTERVAL_SECS";
const ENV_USER_AGENT: &str = "GFL_USER_AGENT";
const ENV_VERBOSE: &str = "GFL_VERBOSE";
const ENV_ITEMS: &str = "GFL_ITEMS";
const ENV_ZIPCODE: &str = "GFL_ZIPCODE";
const ENV_DISTANCE: &str = "GFL_DISTANCE";

pub const DEFAULT_INTERVAL_SECS: u64 = 12 * 3600;
pub const DEFAULT_RADIUS: u32 = 10;
pub const LEGACY_SUBSCRIBER_NAME: &str = "default";

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_radius() -> u32 {
    DEFAULT_RADIUS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Gotify,
    Slack,
    Telegram,
    Discord,
    Pushover,
    Pushbullet,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Gotify => "gotify",
            SinkKind::Slack => "slack",
            SinkKind::Telegram => "telegram",
            SinkKind::Discord => "discord",
            SinkKind::Pushover => "pushover",
            SinkKind::Pushbullet => "pushbullet",
        }
    }
}

impl std::str::FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gotify" => Ok(SinkKind::Gotify),
            "slack" => Ok(SinkKind::Slack),
            "telegram" => Ok(SinkKind::Telegram),
            "discord" => Ok(SinkKind::Discord),
            "pushover" => Ok(SinkKind::Pushover),
            "pushbullet" => Ok(SinkKind::Pushbullet),
            other => Err(anyhow!("unsupported notification type: {other}")),
        }
    }
}

fn de_sink_kind<'de, D>(d: D) -> std::result::Result<SinkKind, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// One notification destination of a subscriber.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSinkConfig {
    #[serde(rename = "type", deserialize_with = "de_sink_kind")]
    pub kind: SinkKind,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub credential: BTreeMap<String, String>,
    #[serde(default)]
    pub condense: bool,
}

impl NotificationSinkConfig {
    pub fn new(kind: SinkKind) -> Self {
        Self {
            kind,
            endpoint: String::new(),
            credential: BTreeMap::new(),
            condense: false,
        }
    }

    pub fn with_credential(mut self, key: &str, value: &str) -> Self {
        self.credential.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn condensed(mut self, condense: bool) -> Self {
        self.condense = condense;
        self
    }

    /// Credential lookup that reports which key is missing.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.credential
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("{} requires {key} in credentials", self.kind.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    pub name: String,
    #[serde(alias = "items", default)]
    pub terms: Vec<String>,
    #[serde(alias = "zipcode", default)]
    pub location: String,
    #[serde(alias = "distance", default = "default_radius")]
    pub radius: u32,
    #[serde(default)]
    pub notifications: Vec<NotificationSinkConfig>,
}

impl SubscriberConfig {
    pub fn new(name: &str, terms: &[&str], location: &str, radius: u32) -> Self {
        Self {
            name: name.to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            location: location.to_string(),
            radius,
            notifications: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: NotificationSinkConfig) -> Self {
        self.notifications.push(sink);
        self
    }
}

/// Process-wide settings shared read-only by every subscriber runner.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    pub interval: Duration,
    /// Empty means: rotate through the built-in browser agents.
    pub user_agent: String,
    pub verbose: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            user_agent: String::new(),
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(alias = "users", default)]
    pub subscribers: Vec<SubscriberConfig>,

    // Pre multi-subscriber layout: one implicit subscriber at the root.
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub zipcode: String,
    #[serde(default)]
    pub distance: Option<u32>,
    #[serde(default)]
    pub notifications: Vec<NotificationSinkConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            user_agent: String::new(),
            verbose: false,
            subscribers: Vec::new(),
            items: Vec::new(),
            zipcode: String::new(),
            distance: None,
            notifications: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn settings(&self) -> GlobalSettings {
        GlobalSettings {
            interval: Duration::from_secs(self.interval_secs),
            user_agent: self.user_agent.clone(),
            verbose: self.verbose,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.subscribers.is_empty()
            && (!self.items.is_empty() || !self.zipcode.is_empty() || !self.notifications.is_empty())
    }

    /// Moves root-level items/zipcode/notifications into a single `default` subscriber.
    pub fn migrate_legacy(&mut self) -> std::result::Result<(), FinderError> {
        if !self.is_legacy() {
            return Ok(());
        }
        if self.items.is_empty() {
            return Err(FinderError::config(
                "legacy configuration must have items specified",
            ));
        }
        if self.zipcode.is_empty() {
            return Err(FinderError::config(
                "legacy configuration must have zipcode specified",
            ));
        }
        let radius = self.distance.filter(|d| *d > 0).unwrap_or(DEFAULT_RADIUS);
        self.subscribers.push(SubscriberConfig {
            name: LEGACY_SUBSCRIBER_NAME.to_string(),
            terms: std::mem::take(&mut self.items),
            location: std::mem::take(&mut self.zipcode),
            radius,
            notifications: std::mem::take(&mut self.notifications),
        });
        self.distance = None;
        tracing::info!(
            subscriber = LEGACY_SUBSCRIBER_NAME,
            "migrated legacy configuration to multi-subscriber format"
        );
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), FinderError> {
        if self.interval_secs == 0 {
            return Err(FinderError::config("interval must be positive"));
        }
        if self.subscribers.is_empty() {
            return Err(FinderError::config(
                "at least one subscriber must be configured",
            ));
        }
        let mut seen = HashSet::new();
        for (i, sub) in self.subscribers.iter().enumerate() {
            if sub.name.trim().is_empty() {
                return Err(FinderError::config(format!(
                    "subscriber {i} must have a name"
                )));
            }
            if !seen.insert(sub.name.as_str()) {
                return Err(FinderError::config(format!(
                    "subscriber '{}' is configured more than once",
                    sub.name
                )));
            }
            if sub.terms.is_empty() {
                return Err(FinderError::config(format!(
                    "subscriber '{}' must have at least one item to search for",
                    sub.name
                )));
            }
            if sub.location.trim().is_empty() {
                return Err(FinderError::config(format!(
                    "subscriber '{}' must have a zipcode specified",
                    sub.name
                )));
            }
            if sub.radius == 0 {
                return Err(FinderError::config(format!(
                    "subscriber '{}' must have a positive distance",
                    sub.name
                )));
            }
        }
        Ok(())
    }
}

/// Parse config text. `.json` is JSON, everything else TOML.
pub fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing JSON config");
    }
    toml::from_str(s).context("parsing TOML config")
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Resolve the config file:
/// 1) explicit path (CLI)
/// 2) $GFL_CONFIG_PATH
/// 3) ./config.toml
/// 4) ./config/find-liquor.toml
fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        return Ok(Some(p.to_path_buf()));
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in ["config.toml", "config/find-liquor.toml"] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Environment variables win over file values.
pub fn apply_env_overrides(cfg: &mut AppConfig) -> Result<()> {
    if let Some(v) = env_nonempty(ENV_INTERVAL_SECS) {
        cfg.interval_secs = v
            .parse()
            .with_context(|| format!("{ENV_INTERVAL_SECS} must be whole seconds, got {v:?}"))?;
    }
    if let Some(v) = env_nonempty(ENV_USER_AGENT) {
        cfg.user_agent = v;
    }
    if let Some(v) = env_nonempty(ENV_VERBOSE) {
        cfg.verbose = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = env_nonempty(ENV_ITEMS) {
        cfg.items = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = env_nonempty(ENV_ZIPCODE) {
        cfg.zipcode = v;
    }
    if let Some(v) = env_nonempty(ENV_DISTANCE) {
        cfg.distance = Some(
            v.parse()
                .with_context(|| format!("{ENV_DISTANCE} must be a positive integer, got {v:?}"))?,
        );
    }
    Ok(())
}

/// Full load: file discovery, env overrides, legacy migration, validation.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut cfg = match resolve_config_path(explicit)? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            load_config_from(&path)?
        }
        None => AppConfig::default(),
    };
    apply_env_overrides(&mut cfg)?;
    cfg.migrate_legacy()?;
    cfg.validate()?;
    Ok(cfg)
}

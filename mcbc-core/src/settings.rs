//! Bot settings loaded from `bot.toml`, plus credentials from the environment.

use crate::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SETTINGS_PATH: &str = "config/bot.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub reddit: RedditSettings,
    pub pipeline: PipelineSettings,
    pub footer: FooterSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    /// The bot's own account name; ancestors written by it are never replied under.
    pub username: String,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    pub requests_per_minute: u32,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            username: "mc_bc_bot".to_string(),
            user_agent: "MCBCBOT (by /u/vikramaditya91)".to_string(),
            subreddits: vec!["EmergingCricket".to_string()],
            requests_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub config_dir: PathBuf,
    pub trigger_file: String,
    pub template_file: String,
    pub cache_ttl_secs: u64,
    pub reconnect_delay_secs: u64,
    pub rate_limit_retries: u32,
    pub rate_limit_buffer_secs: u64,
    pub recent_reply_capacity: usize,
    pub max_ancestry_depth: usize,
    pub poll_interval_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            trigger_file: "triggers.json".to_string(),
            template_file: "reply_templates.json".to_string(),
            cache_ttl_secs: 3600,
            reconnect_delay_secs: 5,
            rate_limit_retries: 2,
            rate_limit_buffer_secs: 60,
            recent_reply_capacity: 1000,
            max_ancestry_depth: 500,
            poll_interval_secs: 5,
        }
    }
}

impl PipelineSettings {
    pub fn trigger_path(&self) -> PathBuf {
        self.config_dir.join(&self.trigger_file)
    }

    pub fn template_path(&self) -> PathBuf {
        self.config_dir.join(&self.template_file)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn rate_limit_buffer(&self) -> Duration {
        Duration::from_secs(self.rate_limit_buffer_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FooterSettings {
    pub source_url: String,
    pub opt_out_url: String,
    pub contact_url: String,
}

impl Default for FooterSettings {
    fn default() -> Self {
        Self {
            source_url: "https://github.com/vikramaditya91/mc_bc_bot".to_string(),
            opt_out_url:
                "https://www.reddit.com/message/compose/?to=mc_bc_bot&subject=optout".to_string(),
            contact_url: "https://www.reddit.com/message/compose/?to=vikramaditya91".to_string(),
        }
    }
}

impl BotSettings {
    /// Parse settings from TOML text and validate them.
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let settings: BotSettings = toml::from_str(contents).map_err(ConfigError::from)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            info!(
                "No settings file at {}, using built-in defaults",
                path.display()
            );
            let settings = BotSettings::default();
            settings.validate()?;
            return Ok(settings);
        }

        debug!("Loading settings from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.username.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "reddit.username must not be empty".to_string(),
            });
        }
        if self.reddit.subreddits.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed {
                reason: "reddit.subreddits must name at least one subreddit".to_string(),
            });
        }
        if self.reddit.requests_per_minute == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "reddit.requests_per_minute must be positive".to_string(),
            });
        }
        if self.pipeline.cache_ttl_secs == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "pipeline.cache_ttl_secs must be positive".to_string(),
            });
        }
        if self.pipeline.max_ancestry_depth == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "pipeline.max_ancestry_depth must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Use the account the bot logs in as for self-reply detection.
    pub fn adopt_account(&mut self, credentials: &RedditCredentials) {
        if !self.reddit.username.eq_ignore_ascii_case(&credentials.username) {
            info!(
                "Posting as u/{} (settings name u/{})",
                credentials.username, self.reddit.username
            );
        }
        self.reddit.username = credentials.username.clone();
    }
}

/// Script-app credentials for the password grant.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RedditCredentials {
    /// Read `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `REDDIT_PASSWORD` and
    /// optionally `REDDIT_USERNAME` (defaults to the configured bot name).
    pub fn from_env(settings: &RedditSettings) -> Result<Self, ConfigError> {
        Self::from_lookup(settings, |name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(settings: &RedditSettings, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                    var_name: name.to_string(),
                })
        };

        Ok(Self {
            client_id: required("REDDIT_CLIENT_ID")?,
            client_secret: required("REDDIT_CLIENT_SECRET")?,
            password: required("REDDIT_PASSWORD")?,
            username: lookup("REDDIT_USERNAME")
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| settings.username.clone()),
        })
    }
}

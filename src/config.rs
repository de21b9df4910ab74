//! Relay configuration, read once at startup.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://ai-chatbot-server-db6g.onrender.com",
    "http://localhost:3000",
];
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 20;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PUBLIC_DIR: &str = "public";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Configuration for the relay server.
#[derive(Clone)]
pub struct RelayConfig {
    pub port: u16,
    /// Exact `Origin` values allowed to call the relay from a browser.
    pub allowed_origins: BTreeSet<String>,
    pub rate_limit_window: Duration,
    /// Requests allowed per client IP within one window.
    pub rate_limit_max: u32,
    pub openai_api_key: String,
    pub model: String,
    pub openai_base_url: String,
    pub upstream_timeout: Duration,
    /// Take the client IP from the rightmost `X-Forwarded-For` entry (the one
    /// added by a single trusted proxy) instead of the peer address.
    pub trust_proxy: bool,
    /// Debug only: skip the origin allow-list entirely.
    pub debug_allow_any_origin: bool,
    /// Static files served at the root, including the embeddable `widget.js`.
    pub public_dir: PathBuf,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("model", &self.model)
            .field("openai_base_url", &self.openai_base_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("trust_proxy", &self.trust_proxy)
            .field("debug_allow_any_origin", &self.debug_allow_any_origin)
            .field("public_dir", &self.public_dir)
            .finish_non_exhaustive()
    }
}

impl RelayConfig {
    /// Config with every default filled in and the given upstream key.
    pub fn with_api_key(openai_api_key: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|o| o.to_string())
                .collect(),
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            rate_limit_max: DEFAULT_RATE_LIMIT_MAX,
            openai_api_key: openai_api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            trust_proxy: false,
            debug_allow_any_origin: false,
            public_dir: PathBuf::from(DEFAULT_PUBLIC_DIR),
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                  | Default                      |
    /// |---------------------------|------------------------------|
    /// | `PORT`                    | `3000`                       |
    /// | `ALLOWED_ORIGINS`         | the production widget origins|
    /// | `RATE_LIMIT_WINDOW_SECS`  | `60`                         |
    /// | `RATE_LIMIT_MAX`          | `20`                         |
    /// | `OPENAI_API_KEY`          | required                     |
    /// | `OPENAI_MODEL`            | `gpt-4o-mini`                |
    /// | `OPENAI_BASE_URL`         | `https://api.openai.com/v1`  |
    /// | `UPSTREAM_TIMEOUT_SECS`   | `15`                         |
    /// | `TRUST_PROXY`             | `false`                      |
    /// | `CORS_ALLOW_ANY_ORIGIN`   | `false`                      |
    /// | `PUBLIC_DIR`              | `public`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let openai_api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let mut config = Self::with_api_key(openai_api_key);

        if let Some(port) = get("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(origins) = get("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if config.allowed_origins.contains("*") {
                return Err(ConfigError::Invalid {
                    var: "ALLOWED_ORIGINS",
                    value: origins,
                });
            }
        }
        if let Some(secs) = get("RATE_LIMIT_WINDOW_SECS") {
            let secs: u64 = parse("RATE_LIMIT_WINDOW_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    var: "RATE_LIMIT_WINDOW_SECS",
                    value: secs.to_string(),
                });
            }
            config.rate_limit_window = Duration::from_secs(secs);
        }
        if let Some(max) = get("RATE_LIMIT_MAX") {
            config.rate_limit_max = parse("RATE_LIMIT_MAX", &max)?;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.model = model;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.openai_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = get("UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout = Duration::from_secs(parse("UPSTREAM_TIMEOUT_SECS", &secs)?);
        }
        if let Some(flag) = get("TRUST_PROXY") {
            config.trust_proxy = parse_flag("TRUST_PROXY", &flag)?;
        }
        if let Some(flag) = get("CORS_ALLOW_ANY_ORIGIN") {
            config.debug_allow_any_origin = parse_flag("CORS_ALLOW_ANY_ORIGIN", &flag)?;
        }
        if let Some(dir) = get("PUBLIC_DIR") {
            config.public_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

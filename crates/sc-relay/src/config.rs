//! Relay configuration, read from the process environment.

use std::fmt;
use std::net::SocketAddr;
use std::process::Command;

use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("api key command failed: {0}")]
    KeyCommand(String),
}

/// Where and how to reach the completion provider.
#[derive(Clone, PartialEq)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub upstream: UpstreamConfig,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = match get("STREAMCHAT_API_KEY_CMD") {
            Some(cmd) => run_key_command(&cmd)?,
            None => get("STREAMCHAT_API_KEY")
                .or_else(|| get("OPENAI_API_KEY"))
                .ok_or(ConfigError::Missing("STREAMCHAT_API_KEY"))?,
        };

        let base_url = get("STREAMCHAT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        validate_base_url(&base_url)?;

        let model = get("STREAMCHAT_MODEL").ok_or(ConfigError::Missing("STREAMCHAT_MODEL"))?;

        let bind_str = get("STREAMCHAT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_str
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "STREAMCHAT_BIND",
                reason: format!("{bind_str}: {e}"),
            })?;

        Ok(Self {
            bind,
            upstream: UpstreamConfig {
                api_key,
                base_url,
                model: model.trim().to_string(),
            },
        })
    }
}

/// Run the key command via `sh -c` and take its trimmed stdout.
fn run_key_command(cmd: &str) -> Result<String, ConfigError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .map_err(|e| ConfigError::KeyCommand(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ConfigError::KeyCommand(format!(
            "{}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if key.is_empty() {
        return Err(ConfigError::KeyCommand("command printed nothing".to_string()));
    }
    Ok(key)
}

fn validate_base_url(raw: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "STREAMCHAT_BASE_URL",
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

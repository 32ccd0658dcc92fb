use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::markdown::Extensions;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8787/api/chat";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub relay: RelayConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Full URL of the relay's chat endpoint.
    pub url: String,
    /// Give up on a reply when the relay sends nothing for this long.
    /// Unset means wait indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl RelayConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub tables: bool,
    pub math: bool,
    pub highlight: bool,
    /// Colored output. `NO_COLOR` overrides this.
    pub color: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tables: true,
            math: true,
            highlight: true,
            color: true,
        }
    }
}

impl RenderConfig {
    pub fn extensions(&self) -> Extensions {
        Extensions {
            tables: self.tables,
            math: self.math,
            highlight: self.highlight,
        }
    }
}

impl Config {
    /// Read the config file at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_or_default() -> Self {
        Self::load(&config_path()).unwrap_or_else(|e| {
            eprintln!("warning: {e}");
            Config::default()
        })
    }
}

pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("streamchat").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.relay.url, DEFAULT_RELAY_URL);
        assert_eq!(cfg.relay.timeout_secs, None);
        assert!(cfg.render.tables && cfg.render.math && cfg.render.highlight);
        assert!(cfg.render.color);
    }

    #[test]
    fn parse_toml() {
        let toml_str = r#"
[relay]
url = "http://chat.internal:9000/api/chat"
timeout_secs = 30

[render]
math = false
color = false
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.relay.url, "http://chat.internal:9000/api/chat");
        assert_eq!(cfg.relay.idle_timeout(), Some(Duration::from_secs(30)));
        assert!(!cfg.render.math);
        assert!(cfg.render.tables);
        assert!(!cfg.render.color);
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let cfg: Config = toml::from_str("[relay]\ntimeout_secs = 5\n").unwrap();
        assert_eq!(cfg.relay.url, DEFAULT_RELAY_URL);
        assert_eq!(cfg.render, RenderConfig::default());
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let cfg = RelayConfig {
            timeout_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(cfg.idle_timeout(), None);
    }

    #[test]
    fn extensions_follow_render_flags() {
        let render = RenderConfig {
            tables: false,
            ..Default::default()
        };
        let ext = render.extensions();
        assert!(!ext.tables);
        assert!(ext.math && ext.highlight);
    }

    #[test]
    fn load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[render]\nhighlight = false").unwrap();
        let cfg = Config::load(file.path()).unwrap();
        assert!(!cfg.render.highlight);
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay\nurl = 1").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("failed to parse"));
    }

    #[test]
    fn config_path_ends_with_app_dir() {
        assert!(config_path().ends_with("streamchat/config.toml"));
    }
}

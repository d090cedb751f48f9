//! Layered configuration: project file, then environment overrides.
//!
//! The file is the first of `outreach.yaml`, `config.yaml`, `config.json` found
//! in the project root (JSON goes through the YAML parser). Keys are matched
//! case-insensitively in both layers; for the environment the exact, upper-case
//! and lower-case spellings of a key are tried in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::answers::DEFAULT_REPLY_TIMEOUT;
use crate::error::{Result, SurveyError};
use crate::scheduling::{ZoomCredentials, ZoomSettings};
use crate::survey::DEFAULT_FALLBACK_LINK;

pub const CONFIG_FILES: &[&str] = &["outreach.yaml", "config.yaml", "config.json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_reply_timeout")]
    pub reply_timeout_secs: u64,
    #[serde(default = "default_message")]
    pub default_message: String,
    #[serde(default = "default_fallback_link")]
    pub fallback_link: String,

    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub gateway_token: Option<String>,

    #[serde(default = "default_zoom_api_url")]
    pub zoom_api_url: String,
    #[serde(default = "default_zoom_oauth_url")]
    pub zoom_oauth_url: String,
    #[serde(default)]
    pub zoom_jwt_token: Option<String>,
    #[serde(default)]
    pub zoom_account_id: Option<String>,
    #[serde(default)]
    pub zoom_client_id: Option<String>,
    #[serde(default)]
    pub zoom_client_secret: Option<String>,
    #[serde(default = "default_zoom_timeout")]
    pub zoom_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("database.sqlite3")
}

fn default_workers() -> usize {
    1
}

fn default_reply_timeout() -> u64 {
    DEFAULT_REPLY_TIMEOUT.as_secs()
}

fn default_message() -> String {
    "Hello from WhatsUp bot!".to_string()
}

fn default_fallback_link() -> String {
    DEFAULT_FALLBACK_LINK.to_string()
}

fn default_zoom_api_url() -> String {
    ZoomSettings::default().api_url
}

fn default_zoom_oauth_url() -> String {
    ZoomSettings::default().oauth_url
}

fn default_zoom_timeout() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            workers: default_workers(),
            reply_timeout_secs: default_reply_timeout(),
            default_message: default_message(),
            fallback_link: default_fallback_link(),
            gateway_url: None,
            gateway_token: None,
            zoom_api_url: default_zoom_api_url(),
            zoom_oauth_url: default_zoom_oauth_url(),
            zoom_jwt_token: None,
            zoom_account_id: None,
            zoom_client_id: None,
            zoom_client_secret: None,
            zoom_timeout_secs: default_zoom_timeout(),
        }
    }
}

/// Return the value of the first set spelling of `key` (exact, upper, lower).
fn lookup(key: &str, env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    [key.to_string(), key.to_uppercase(), key.to_lowercase()]
        .iter()
        .find_map(|k| env(k))
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SurveyError::Config(format!("{key}: expected a number, got '{value}'")))
}

impl Config {
    /// Load the project config from `root`, then apply process environment overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let file = CONFIG_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|p| p.is_file());
        let text = match &file {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => None,
        };
        if let Some(path) = &file {
            tracing::debug!(path = %path.display(), "loading config");
        }
        Self::from_sources(text.as_deref(), |k| std::env::var(k).ok())
    }

    /// Build a config from optional file contents and an environment lookup.
    pub fn from_sources(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = match file.map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => Self::parse(text)?,
            None => Self::default(),
        };
        cfg.apply_env(&env)?;
        Ok(cfg)
    }

    fn parse(text: &str) -> Result<Self> {
        let raw: serde_yaml::Mapping = serde_yaml::from_str(text)?;
        let normalized: serde_yaml::Mapping = raw
            .into_iter()
            .map(|(k, v)| match k {
                serde_yaml::Value::String(s) => (serde_yaml::Value::String(s.to_lowercase()), v),
                other => (other, v),
            })
            .collect();
        Ok(serde_yaml::from_value(serde_yaml::Value::Mapping(normalized))?)
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("database_path", env) {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("workers", env) {
            self.workers = parse_num("workers", &v)?;
        }
        if let Some(v) = lookup("reply_timeout_secs", env) {
            self.reply_timeout_secs = parse_num("reply_timeout_secs", &v)?;
        }
        if let Some(v) = lookup("zoom_timeout_secs", env) {
            self.zoom_timeout_secs = parse_num("zoom_timeout_secs", &v)?;
        }

        let strings: [(&str, &mut String); 4] = [
            ("default_message", &mut self.default_message),
            ("fallback_link", &mut self.fallback_link),
            ("zoom_api_url", &mut self.zoom_api_url),
            ("zoom_oauth_url", &mut self.zoom_oauth_url),
        ];
        for (key, slot) in strings {
            if let Some(v) = lookup(key, env) {
                *slot = v;
            }
        }

        let optionals: [(&str, &mut Option<String>); 6] = [
            ("gateway_url", &mut self.gateway_url),
            ("gateway_token", &mut self.gateway_token),
            ("zoom_jwt_token", &mut self.zoom_jwt_token),
            ("zoom_account_id", &mut self.zoom_account_id),
            ("zoom_client_id", &mut self.zoom_client_id),
            ("zoom_client_secret", &mut self.zoom_client_secret),
        ];
        for (key, slot) in optionals {
            if let Some(v) = lookup(key, env) {
                *slot = Some(v).filter(|s| !s.is_empty());
            }
        }
        Ok(())
    }

    /// The database path, resolved against `root` when relative.
    pub fn resolve_database_path(&self, root: &Path) -> PathBuf {
        if self.database_path.is_absolute() {
            self.database_path.clone()
        } else {
            root.join(&self.database_path)
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }

    /// Scheduling credentials: a static token wins over server-to-server OAuth.
    /// `None` when neither is completely configured.
    pub fn zoom_credentials(&self) -> Option<ZoomCredentials> {
        if let Some(token) = &self.zoom_jwt_token {
            return Some(ZoomCredentials::Static(token.clone()));
        }
        match (&self.zoom_account_id, &self.zoom_client_id, &self.zoom_client_secret) {
            (Some(account_id), Some(client_id), Some(client_secret)) => {
                Some(ZoomCredentials::ServerToServer {
                    account_id: account_id.clone(),
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn zoom_settings(&self) -> ZoomSettings {
        ZoomSettings {
            api_url: self.zoom_api_url.clone(),
            oauth_url: self.zoom_oauth_url.clone(),
            timeout: Duration::from_secs(self.zoom_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let cfg = Config::from_sources(None, env_of(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.reply_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.fallback_link, "https://zoom.us/j/123456789");
        assert!(cfg.zoom_credentials().is_none());
    }

    #[test]
    fn file_keys_are_case_insensitive() {
        let cfg = Config::from_sources(
            Some("WORKERS: 4\nZoom_JWT_Token: abc\n"),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.zoom_credentials(), Some(ZoomCredentials::Static("abc".into())));
    }

    #[test]
    fn json_file_is_accepted() {
        let cfg = Config::from_sources(
            Some(r#"{"zoom_jwt_token": "from-json", "reply_timeout_secs": 5}"#),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(cfg.reply_timeout_secs, 5);
        assert_eq!(cfg.zoom_jwt_token.as_deref(), Some("from-json"));
    }

    #[test]
    fn environment_overrides_file() {
        let cfg = Config::from_sources(
            Some("workers: 2\nfallback_link: https://file.example\n"),
            env_of(&[("WORKERS", "8"), ("fallback_link", "https://env.example")]),
        )
        .unwrap();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.fallback_link, "https://env.example");
    }

    #[test]
    fn invalid_number_in_environment_is_rejected() {
        let err = Config::from_sources(None, env_of(&[("WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, SurveyError::Config(ref m) if m.contains("workers")));
    }

    #[test]
    fn server_to_server_requires_all_three_fields() {
        let partial = Config::from_sources(
            None,
            env_of(&[("ZOOM_ACCOUNT_ID", "a"), ("ZOOM_CLIENT_ID", "b")]),
        )
        .unwrap();
        assert!(partial.zoom_credentials().is_none());

        let full = Config::from_sources(
            None,
            env_of(&[
                ("ZOOM_ACCOUNT_ID", "a"),
                ("ZOOM_CLIENT_ID", "b"),
                ("ZOOM_CLIENT_SECRET", "c"),
            ]),
        )
        .unwrap();
        assert!(matches!(
            full.zoom_credentials(),
            Some(ZoomCredentials::ServerToServer { .. })
        ));
    }

    #[test]
    fn load_reads_first_config_file_and_resolves_db_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"workers": 7}"#).unwrap();
        std::fs::write(dir.path().join("outreach.yaml"), "workers: 3\n").unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(
            cfg.resolve_database_path(dir.path()),
            dir.path().join("database.sqlite3")
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::from_sources(Some("workers: [1, 2"), env_of(&[])).is_err());
    }
}

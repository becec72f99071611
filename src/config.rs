use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST backend, including the `/api` prefix.
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// Value of the backend's `session` cookie.
    pub session: Option<String>,
    /// Guard concurrent toggles of one field with an in-flight token so a
    /// stale response cannot overwrite a newer optimistic value.
    pub serialize_toggles: bool,
    /// Directory for daily-rotated log files; stdout when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 15,
            session: None,
            serialize_toggles: true,
            log_dir: None,
        }
    }
}

impl Config {
    /// Read `path` if given (missing file is an error), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                toml::from_str::<Config>(&content)
                    .with_context(|| format!("parse config {}", path.display()))?
            }
            None => Config::default(),
        };
        config.apply_env(|key| dotenvy::var(key).ok())?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(base) = var("TRACKER_API_BASE") {
            self.api_base = base;
        }
        if let Some(secs) = var("TRACKER_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs
                .parse()
                .with_context(|| format!("TRACKER_REQUEST_TIMEOUT_SECS={secs}"))?;
        }
        if let Some(session) = var("TRACKER_SESSION") {
            self.session = Some(session);
        }
        if let Some(dir) = var("TRACKER_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }
}

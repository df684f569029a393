use std::path::PathBuf;
use std::{env, fs};

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use url::Url;

/// Contents of `config.toml`. Everything is optional; flags and
/// environment variables override what the file says.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub identity_url: Option<String>,
    pub share_origin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend origin, no trailing slash.
    pub base_url: String,
    /// Identity provider origin; only needed for `login`.
    pub identity_url: Option<String>,
    /// Origin used to synthesize share links the backend left out.
    pub share_origin: String,
    config_dir: PathBuf,
}

pub fn config_dir() -> PathBuf {
    if let Ok(dir) = env::var("SKIFF_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("skiff");
    }
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config").join("skiff")
}

/// Precedence: flag, then environment, then config file.
fn pick(flag: Option<String>, env_var: &str, file: Option<String>) -> Option<String> {
    flag.or_else(|| env::var(env_var).ok()).or(file)
}

fn normalize_origin(raw: String, what: &str) -> Result<String> {
    let trimmed = raw.trim_end_matches('/').to_string();
    Url::parse(&trimmed).with_context(|| format!("invalid {what} URL: {trimmed}"))?;
    Ok(trimmed)
}

impl Settings {
    pub fn load(base_url_flag: Option<String>) -> Result<Self> {
        let dir = config_dir();
        let file = dir.join("config.toml");
        let file_cfg = match fs::read_to_string(&file) {
            Ok(text) => toml::from_str::<FileConfig>(&text)
                .with_context(|| format!("invalid config TOML at {}", file.display()))?,
            Err(_) => FileConfig::default(),
        };
        debug!("config file {}: {file_cfg:?}", file.display());

        let base_url = pick(base_url_flag, "SKIFF_BASE_URL", file_cfg.base_url).context(
            "no backend configured; pass --base-url, set SKIFF_BASE_URL, \
             or put base_url in config.toml",
        )?;
        let base_url = normalize_origin(base_url, "base")?;

        let identity_url = pick(None, "SKIFF_IDENTITY_URL", file_cfg.identity_url)
            .map(|u| normalize_origin(u, "identity provider"))
            .transpose()?;

        let share_origin = pick(None, "SKIFF_SHARE_ORIGIN", file_cfg.share_origin)
            .map(|u| normalize_origin(u, "share origin"))
            .transpose()?
            .unwrap_or_else(|| base_url.clone());

        Ok(Self {
            base_url,
            identity_url,
            share_origin,
            config_dir: dir,
        })
    }

    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.config_dir).with_context(|| {
            format!("cannot create config directory {}", self.config_dir.display())
        })
    }
}

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Connection profile for one back-office gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayProfile {
    pub base_url: String,
    /// Session bearer token. Usually injected via `DYNAFORM_SESSION_TOKEN`
    /// rather than stored in the profile file.
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Role ids driving the install-flag filter.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for GatewayProfile {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            session_token: None,
            language: default_language(),
            roles: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayProfile,
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            // XDG config directory on Linux
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("dynaform")
        } else {
            // Home directory with dot prefix on Windows/Mac
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".dynaform")
        };

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
            info!("Created config directory: {:?}", config_dir);
        }

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        debug!("Loading config from: {:?}", config_path);

        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            toml::from_str(&config_content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?
        } else {
            info!("Config file doesn't exist, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        debug!("Saving config to: {:?}", config_path);

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Config saved successfully");
        Ok(())
    }

    /// Environment variables (and `.env` via dotenvy in main) override the
    /// profile file, so tokens never need to live on disk.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DYNAFORM_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        if let Ok(token) = std::env::var("DYNAFORM_SESSION_TOKEN") {
            self.gateway.session_token = Some(token);
        }
        if let Ok(language) = std::env::var("DYNAFORM_LANGUAGE") {
            self.gateway.language = language;
        }
        if let Ok(roles) = std::env::var("DYNAFORM_ROLES") {
            self.gateway.roles = roles
                .split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

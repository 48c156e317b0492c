use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for repocourier
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// GitHub authentication settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Project push behavior
    #[serde(default)]
    pub push: PushConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Socket address the API listens on
    #[serde(default = "default_listen")]
    pub listen: String,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// REST API base URI override (GitHub Enterprise, test servers)
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Project push configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    /// Repository name used when the request does not name one
    #[serde(default = "default_repo_name")]
    pub default_repo_name: String,

    /// Repository description used when the request does not supply one
    #[serde(default = "default_description")]
    pub default_description: String,

    /// Directory whose files are published
    #[serde(default = "default_root")]
    pub root: String,

    /// Directory names never descended into
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// File names never uploaded
    #[serde(default = "default_exclude_files")]
    pub exclude_files: Vec<String>,

    /// Treat every failed content probe as "file absent"
    #[serde(default)]
    pub lenient_probe: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_repo_name() -> String {
    "Medguard-AI".to_string()
}
fn default_description() -> String {
    "Medguard AI Application".to_string()
}
fn default_root() -> String {
    ".".to_string()
}
fn default_exclude_dirs() -> Vec<String> {
    ["node_modules", ".git", ".cache", ".config", "dist", ".replit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_exclude_files() -> Vec<String> {
    vec!["package-lock.json".to_string(), ".replit".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            api_url: None,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            default_repo_name: default_repo_name(),
            default_description: default_description(),
            root: default_root(),
            exclude_dirs: default_exclude_dirs(),
            exclude_files: default_exclude_files(),
            lenient_probe: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;
            config.expand_paths()?;

            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("repocourier").join("config.yml"))
    }

    /// Expand environment variables in the push root and normalize it
    pub fn expand_paths(&mut self) -> Result<()> {
        let expanded = shellexpand::full(&self.push.root)
            .context("Failed to expand push root path")?
            .into_owned();

        self.push.root = path_clean::clean(&expanded).to_string_lossy().into_owned();

        Ok(())
    }

    /// The push root as a path
    pub fn push_root(&self) -> PathBuf {
        PathBuf::from(&self.push.root)
    }
}

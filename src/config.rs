use serde::Deserialize;
use std::{env, fs, net::SocketAddr, path::{Path, PathBuf}};

use crate::error::ConfigError;

const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "https://manpreet1994.github.io"];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// JSON file holding the admin credentials; re-read on every login.
    pub admin_config: PathBuf,
    pub cors_origins: Vec<String>,
    /// Overrides the bundled index page when set.
    pub index_template: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            data_dir: PathBuf::from("data"),
            admin_config: PathBuf::from("config.json"),
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            index_template: None,
        }
    }
}

impl Config {
    /// `BIND_ADDR` wins over `PORT`; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Ok(addr) = env::var("BIND_ADDR") {
            cfg.bind_addr = addr
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "BIND_ADDR", value: addr })?;
        } else if let Ok(port) = env::var("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "PORT", value: port })?;
            cfg.bind_addr.set_port(port);
        }
        if let Ok(dir) = env::var("DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = env::var("ADMIN_CONFIG") {
            cfg.admin_config = PathBuf::from(path);
        }
        if let Ok(origins) = env::var("CORS_ORIGINS") {
            cfg.cors_origins = parse_origins(&origins);
        }
        cfg.index_template = env::var("INDEX_TEMPLATE").ok().map(PathBuf::from);

        Ok(cfg)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    #[serde(default)]
    pub admin_pass: Option<String>,
}

fn default_admin_user() -> String {
    "admin".to_string()
}

impl AdminConfig {
    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

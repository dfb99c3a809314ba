// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base directory SteamCMD installs workshop content into (`+force_install_dir`)
    pub mods_dir: PathBuf,

    /// Path to the SteamCMD executable
    pub steamcmd_path: PathBuf,

    /// Steam account used for downloads; anonymous login when unset
    pub steam_username: Option<String>,

    /// Password for `steam_username`
    pub steam_password: Option<String>,

    /// Arma 3 dedicated server directory
    pub arma3_server_dir: PathBuf,

    /// DayZ dedicated server directory
    pub dayz_server_dir: PathBuf,

    /// DayZ Experimental dedicated server directory
    pub dayz_exp_server_dir: PathBuf,

    /// SQLite database path for the mod registry
    pub registry_db_path: PathBuf,

    /// Steam Web API base URL used for workshop metadata lookups
    pub workshop_api_url: String,

    /// Local API bind address (e.g., "127.0.0.1:8080")
    pub local_api_bind: SocketAddr,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format ("pretty" or "json")
    pub log_format: String,

    /// Number of workshop items downloaded in one SteamCMD session
    pub batch_size: usize,

    /// Pause between two SteamCMD sessions of the same request
    pub batch_delay_secs: u64,

    /// Upper bound for a single SteamCMD session
    pub job_timeout_secs: u64,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("WMD_CONFIG")
            .unwrap_or_else(|_| "config.toml".to_string());

        Self::load_from(Path::new(&config_path))
    }

    /// Load configuration from the given TOML file (defaults when it does not
    /// exist), then apply environment variable overrides
    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        let mut config: Config = if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(val) = std::env::var("WMD_MODS_DIR") {
            self.mods_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WMD_STEAMCMD_PATH") {
            self.steamcmd_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WMD_STEAM_USERNAME") {
            self.steam_username = Some(val);
        }
        if let Ok(val) = std::env::var("WMD_STEAM_PASSWORD") {
            self.steam_password = Some(val);
        }
        if let Ok(val) = std::env::var("WMD_ARMA3_SERVER_DIR") {
            self.arma3_server_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WMD_DAYZ_SERVER_DIR") {
            self.dayz_server_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WMD_DAYZ_EXP_SERVER_DIR") {
            self.dayz_exp_server_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WMD_REGISTRY_DB_PATH") {
            self.registry_db_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("WMD_WORKSHOP_API_URL") {
            self.workshop_api_url = val;
        }
        if let Ok(val) = std::env::var("WMD_LOCAL_API_BIND") {
            self.local_api_bind = SocketAddr::from_str(&val)?;
        }
        if let Ok(val) = std::env::var("WMD_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Ok(val) = std::env::var("WMD_LOG_FORMAT") {
            self.log_format = val;
        }
        if let Ok(val) = std::env::var("WMD_BATCH_SIZE") {
            self.batch_size = val.parse()?;
        }
        if let Ok(val) = std::env::var("WMD_BATCH_DELAY_SECS") {
            self.batch_delay_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("WMD_JOB_TIMEOUT_SECS") {
            self.job_timeout_secs = val.parse()?;
        }

        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow::anyhow!("batch_size must be at least 1"));
        }
        if self.job_timeout_secs == 0 {
            return Err(anyhow::anyhow!("job_timeout_secs must be at least 1"));
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            return Err(anyhow::anyhow!(
                "log_format must be \"pretty\" or \"json\", got \"{}\"",
                self.log_format
            ));
        }
        if self.steam_username.is_some() != self.steam_password.is_some() {
            return Err(anyhow::anyhow!(
                "steam_username and steam_password must be set together"
            ));
        }
        Ok(())
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mods_dir: PathBuf::from("/opt/servers/workshop"),
            steamcmd_path: PathBuf::from("/usr/games/steamcmd"),
            steam_username: None,
            steam_password: None,
            arma3_server_dir: PathBuf::from("/opt/servers/arma3"),
            dayz_server_dir: PathBuf::from("/opt/servers/dayz"),
            dayz_exp_server_dir: PathBuf::from("/opt/servers/dayz_exp"),
            registry_db_path: PathBuf::from("registry.db"),
            workshop_api_url: String::from("https://api.steampowered.com"),
            local_api_bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: String::from("info"),
            log_format: String::from("pretty"),
            batch_size: 5,
            batch_delay_secs: 15,
            job_timeout_secs: 3600, // 1 hour
        }
    }
}

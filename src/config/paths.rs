// SPDX-License-Identifier: GPL-3.0-only
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::registry::ServerType;

/// Filesystem layout of workshop content and server installations
#[derive(Debug, Clone)]
pub struct InstallPaths {
    mods_dir: PathBuf,
    arma3_server_dir: PathBuf,
    dayz_server_dir: PathBuf,
    dayz_exp_server_dir: PathBuf,
}

impl InstallPaths {
    pub fn new(
        mods_dir: PathBuf,
        arma3_server_dir: PathBuf,
        dayz_server_dir: PathBuf,
        dayz_exp_server_dir: PathBuf,
    ) -> Self {
        Self {
            mods_dir,
            arma3_server_dir,
            dayz_server_dir,
            dayz_exp_server_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.mods_dir.clone(),
            config.arma3_server_dir.clone(),
            config.dayz_server_dir.clone(),
            config.dayz_exp_server_dir.clone(),
        )
    }

    /// Directory SteamCMD is pointed at with `+force_install_dir`
    pub fn mods_base_path(&self) -> &Path {
        &self.mods_dir
    }

    /// SteamCMD's own bookkeeping directory below the mods base path
    pub fn steamapps_path(&self) -> PathBuf {
        self.mods_dir.join("steamapps")
    }

    /// Where SteamCMD places the content of a downloaded workshop item
    pub fn mod_installation_path(&self, mod_id: u64, server_type: ServerType) -> PathBuf {
        self.steamapps_path()
            .join("workshop")
            .join("content")
            .join(server_type.game_app_id().to_string())
            .join(mod_id.to_string())
    }

    pub fn server_path(&self, server_type: ServerType) -> &Path {
        match server_type {
            ServerType::Arma3 => &self.arma3_server_dir,
            ServerType::DayZ => &self.dayz_server_dir,
            ServerType::DayZExp => &self.dayz_exp_server_dir,
        }
    }

    pub fn server_keys_path(&self, server_type: ServerType) -> PathBuf {
        self.server_path(server_type).join("keys")
    }

    pub fn server_key_path(&self, key_name: &str, server_type: ServerType) -> PathBuf {
        self.server_keys_path(server_type).join(key_name)
    }

    /// Symlink through which a server loads a mod, e.g. `<server>/@cba_a3`
    pub fn mod_link_path(&self, normalized_name: &str, server_type: ServerType) -> PathBuf {
        self.server_path(server_type).join(normalized_name)
    }

    /// A server counts as installed once its directory exists
    pub fn is_server_installed(&self, server_type: ServerType) -> bool {
        self.server_path(server_type).is_dir()
    }
}

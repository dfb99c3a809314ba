// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Dedicated server families that consume workshop content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServerType {
    #[serde(rename = "ARMA3")]
    Arma3,
    #[serde(rename = "DAYZ")]
    DayZ,
    #[serde(rename = "DAYZ_EXP")]
    DayZExp,
}

impl ServerType {
    pub const ALL: [ServerType; 3] = [ServerType::Arma3, ServerType::DayZ, ServerType::DayZExp];

    /// Steam app id of the game whose workshop this server consumes
    pub fn game_app_id(self) -> u32 {
        match self {
            ServerType::Arma3 => 107410,
            ServerType::DayZ | ServerType::DayZExp => 221100,
        }
    }

    /// Map a workshop item's consumer app id to the server family owning it.
    /// Experimental servers never own content.
    pub fn from_consumer_app_id(app_id: u32) -> Option<ServerType> {
        match app_id {
            107410 => Some(ServerType::Arma3),
            221100 => Some(ServerType::DayZ),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerType::Arma3 => "ARMA3",
            ServerType::DayZ => "DAYZ",
            ServerType::DayZExp => "DAYZ_EXP",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ServerType::Arma3 => "Arma 3",
            ServerType::DayZ => "DayZ",
            ServerType::DayZExp => "DayZ Experimental",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARMA3" => Ok(ServerType::Arma3),
            "DAYZ" => Ok(ServerType::DayZ),
            "DAYZ_EXP" => Ok(ServerType::DayZExp),
            other => Err(anyhow::anyhow!("Unknown server type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallationStatus {
    NotInstalled,
    InProgress,
    Finished,
    Error,
}

impl InstallationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallationStatus::NotInstalled => "NOT_INSTALLED",
            InstallationStatus::InProgress => "IN_PROGRESS",
            InstallationStatus::Finished => "FINISHED",
            InstallationStatus::Error => "ERROR",
        }
    }
}

impl FromStr for InstallationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_INSTALLED" => Ok(InstallationStatus::NotInstalled),
            "IN_PROGRESS" => Ok(InstallationStatus::InProgress),
            "FINISHED" => Ok(InstallationStatus::Finished),
            "ERROR" => Ok(InstallationStatus::Error),
            other => Err(anyhow::anyhow!("Unknown installation status: {}", other)),
        }
    }
}

/// Why an installation ended in `ERROR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorStatus {
    Generic,
    Io,
    NoMatch,
    NoSubscription,
    Timeout,
    WrongAuth,
    RateLimit,
    Interrupted,
}

impl ErrorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorStatus::Generic => "GENERIC",
            ErrorStatus::Io => "IO",
            ErrorStatus::NoMatch => "NO_MATCH",
            ErrorStatus::NoSubscription => "NO_SUBSCRIPTION",
            ErrorStatus::Timeout => "TIMEOUT",
            ErrorStatus::WrongAuth => "WRONG_AUTH",
            ErrorStatus::RateLimit => "RATE_LIMIT",
            ErrorStatus::Interrupted => "INTERRUPTED",
        }
    }

    /// Operator-facing explanation of the failure
    pub fn description(self) -> &'static str {
        match self {
            ErrorStatus::Generic => "Unidentified error. Please contact the system administrator.",
            ErrorStatus::Io => "File system I/O error. Please contact the system administrator.",
            ErrorStatus::NoMatch => "The mod was not found on the Workshop.",
            ErrorStatus::NoSubscription => {
                "The given Steam account doesn't have correct subscription and cannot download the mod."
            }
            ErrorStatus::Timeout => "The request timed out, please retry.",
            ErrorStatus::WrongAuth => {
                "Incorrect Steam authorization. Please check username, password and Steam Guard token."
            }
            ErrorStatus::RateLimit => {
                "Steam rate limit exceeded. Please wait at least a few hours before attempting to download mods again."
            }
            ErrorStatus::Interrupted => "The installation was interrupted. Please try again.",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERIC" => Ok(ErrorStatus::Generic),
            "IO" => Ok(ErrorStatus::Io),
            "NO_MATCH" => Ok(ErrorStatus::NoMatch),
            "NO_SUBSCRIPTION" => Ok(ErrorStatus::NoSubscription),
            "TIMEOUT" => Ok(ErrorStatus::Timeout),
            "WRONG_AUTH" => Ok(ErrorStatus::WrongAuth),
            "RATE_LIMIT" => Ok(ErrorStatus::RateLimit),
            "INTERRUPTED" => Ok(ErrorStatus::Interrupted),
            other => Err(anyhow::anyhow!("Unknown error status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkshopMod {
    /// Steam Workshop item id
    pub id: u64,

    /// Display name, refreshed from the workshop on every install request
    pub name: String,

    /// Server family consuming this mod; resolved before the first download
    pub server_type: Option<ServerType>,

    pub installation_status: InstallationStatus,

    /// Only set while `installation_status` is `Error`
    pub error_status: Option<ErrorStatus>,

    /// Names of the key files copied to the relevant server installations
    pub key_files: BTreeSet<String>,

    /// Size of the installed content on disk, in bytes
    pub file_size: Option<u64>,

    /// Last successful installation
    pub last_updated: Option<DateTime<Utc>>,

    /// Mod is loaded by the server only and not required on clients
    pub server_only: bool,

    /// Symlink name last published in the server directories, e.g. `@cba_a3`.
    /// Differs from [`WorkshopMod::normalized_name`] after the item was renamed.
    pub published_name: Option<String>,
}

impl WorkshopMod {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: String::new(),
            server_type: None,
            installation_status: InstallationStatus::NotInstalled,
            error_status: None,
            key_files: BTreeSet::new(),
            file_size: None,
            last_updated: None,
            server_only: false,
            published_name: None,
        }
    }

    /// Filesystem-safe name used for the published symlink, e.g. `@cba_a3`
    pub fn normalized_name(&self) -> String {
        match crate::utils::normalize_mod_name(&self.name) {
            Ok(name) => format!("@{}", name),
            Err(_) => format!("@{}", self.id),
        }
    }

    pub fn mark_in_progress(&mut self) {
        self.installation_status = InstallationStatus::InProgress;
        self.error_status = None;
    }

    pub fn mark_finished(&mut self) {
        self.installation_status = InstallationStatus::Finished;
        self.error_status = None;
    }

    pub fn mark_failed(&mut self, error: ErrorStatus) {
        self.installation_status = InstallationStatus::Error;
        self.error_status = Some(error);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.installation_status,
            InstallationStatus::Finished | InstallationStatus::Error
        )
    }

    /// Installed mods that were recorded before size tracking existed
    pub fn needs_size_recalculation(&self) -> bool {
        self.installation_status == InstallationStatus::Finished
            && self.file_size.unwrap_or(0) == 0
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::{Config, InstallPaths};
use crate::registry::ErrorStatus;

#[derive(Clone, PartialEq, Eq)]
pub enum LoginMode {
    Anonymous,
    Credentials { username: String, password: String },
}

impl LoginMode {
    pub fn from_config(config: &Config) -> Self {
        match (&config.steam_username, &config.steam_password) {
            (Some(username), Some(password)) => LoginMode::Credentials {
                username: username.clone(),
                password: password.clone(),
            },
            _ => LoginMode::Anonymous,
        }
    }
}

// Keeps the password out of logs
impl fmt::Debug for LoginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginMode::Anonymous => f.write_str("Anonymous"),
            LoginMode::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Parameters shared by every item of one SteamCMD session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub install_dir: PathBuf,
    pub login: LoginMode,
}

impl SessionParams {
    pub fn from_config(config: &Config, paths: &InstallPaths) -> Self {
        Self {
            install_dir: paths.mods_base_path().to_path_buf(),
            login: LoginMode::from_config(config),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkshopItemRequest {
    /// Steam app id of the game the item belongs to
    pub app_id: u32,
    pub mod_id: u64,
    /// Ask SteamCMD to verify already present files
    pub validate: bool,
}

/// One SteamCMD session: a single login followed by one or more item downloads
#[derive(Debug, Clone)]
pub struct SteamCmdJob {
    pub id: Uuid,
    pub session: SessionParams,
    pub items: Vec<WorkshopItemRequest>,
}

impl SteamCmdJob {
    pub fn new(session: SessionParams, items: Vec<WorkshopItemRequest>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session,
            items,
        }
    }

    pub fn mod_ids(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.mod_id).collect()
    }

    /// Command line arguments passed to the SteamCMD binary
    pub fn command_args(&self) -> Vec<String> {
        let mut args = vec![
            "+@NoPromptForPassword".to_string(),
            "1".to_string(),
            "+force_install_dir".to_string(),
            self.session.install_dir.to_string_lossy().into_owned(),
            "+login".to_string(),
        ];

        match &self.session.login {
            LoginMode::Anonymous => args.push("anonymous".to_string()),
            LoginMode::Credentials { username, password } => {
                args.push(username.clone());
                args.push(password.clone());
            }
        }

        for item in &self.items {
            args.push("+workshop_download_item".to_string());
            args.push(item.app_id.to_string());
            args.push(item.mod_id.to_string());
            if item.validate {
                args.push("validate".to_string());
            }
        }

        args.push("+quit".to_string());
        args
    }
}

/// What the download tool reported for a finished session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutcome {
    /// Failure affecting the whole session, e.g. a rejected login
    pub job_error: Option<ErrorStatus>,
    /// Failures reported for individual items
    pub item_errors: HashMap<u64, ErrorStatus>,
}

impl JobOutcome {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failed(error: ErrorStatus) -> Self {
        Self {
            job_error: Some(error),
            item_errors: HashMap::new(),
        }
    }

    pub fn with_item_error(mut self, mod_id: u64, error: ErrorStatus) -> Self {
        self.item_errors.insert(mod_id, error);
        self
    }

    /// Error reported for the given item, falling back to the session-wide error
    pub fn error_for(&self, mod_id: u64) -> Option<ErrorStatus> {
        self.item_errors.get(&mod_id).copied().or(self.job_error)
    }

    pub fn is_success(&self) -> bool {
        self.job_error.is_none() && self.item_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(login: LoginMode) -> SessionParams {
        SessionParams {
            install_dir: PathBuf::from("/srv/workshop"),
            login,
        }
    }

    #[test]
    fn test_command_args_anonymous_multi_item() {
        let job = SteamCmdJob::new(
            session(LoginMode::Anonymous),
            vec![
                WorkshopItemRequest { app_id: 107410, mod_id: 450814997, validate: true },
                WorkshopItemRequest { app_id: 107410, mod_id: 463939057, validate: false },
            ],
        );

        assert_eq!(
            job.command_args(),
            vec![
                "+@NoPromptForPassword", "1",
                "+force_install_dir", "/srv/workshop",
                "+login", "anonymous",
                "+workshop_download_item", "107410", "450814997", "validate",
                "+workshop_download_item", "107410", "463939057",
                "+quit",
            ]
        );
        assert_eq!(job.mod_ids(), vec![450814997, 463939057]);
    }

    #[test]
    fn test_command_args_with_credentials() {
        let job = SteamCmdJob::new(
            session(LoginMode::Credentials {
                username: "operator".to_string(),
                password: "hunter2".to_string(),
            }),
            vec![WorkshopItemRequest { app_id: 221100, mod_id: 1559212036, validate: true }],
        );

        let args = job.command_args();
        let login = args.iter().position(|a| a == "+login").unwrap();
        assert_eq!(args[login + 1], "operator");
        assert_eq!(args[login + 2], "hunter2");
    }

    #[test]
    fn test_login_debug_redacts_password() {
        let login = LoginMode::Credentials {
            username: "operator".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", login);
        assert!(debug.contains("operator"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_login_mode_from_config() {
        let mut config = Config::default();
        assert_eq!(LoginMode::from_config(&config), LoginMode::Anonymous);

        config.steam_username = Some("operator".to_string());
        config.steam_password = Some("hunter2".to_string());
        assert!(matches!(LoginMode::from_config(&config), LoginMode::Credentials { .. }));
    }

    #[test]
    fn test_outcome_error_lookup() {
        let outcome = JobOutcome::success().with_item_error(2, ErrorStatus::NoMatch);
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_for(1), None);
        assert_eq!(outcome.error_for(2), Some(ErrorStatus::NoMatch));

        let outcome = JobOutcome::failed(ErrorStatus::WrongAuth).with_item_error(2, ErrorStatus::Timeout);
        assert_eq!(outcome.error_for(1), Some(ErrorStatus::WrongAuth));
        assert_eq!(outcome.error_for(2), Some(ErrorStatus::Timeout));
    }
}

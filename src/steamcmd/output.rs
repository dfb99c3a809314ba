// SPDX-License-Identifier: GPL-3.0-only
use regex::Regex;
use tracing::{debug, warn};

use crate::registry::ErrorStatus;
use crate::steamcmd::job::JobOutcome;

/// Recognizes the result lines SteamCMD prints for a workshop session
#[derive(Debug, Clone)]
pub struct OutputClassifier {
    success: Regex,
    item_failure: Regex,
    login_failure: Regex,
}

impl OutputClassifier {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            success: Regex::new(r"Success\. Downloaded item (\d+)")?,
            item_failure: Regex::new(r"ERROR! Download item (\d+) failed \(([^)]*)\)")?,
            login_failure: Regex::new(
                r"^\s*(?:Logging in user .*\.\.\.FAILED(?: login with result code)?|Login Failure:?)\s*\(?([^)\r\n]+)\)?",
            )?,
        })
    }

    /// Turn captured stdout into a per-item outcome.
    ///
    /// Every requested item without a `Success. Downloaded item` line ends up
    /// with an error, whatever the exit status of the process was.
    pub fn classify(&self, stdout: &str, requested: &[u64]) -> JobOutcome {
        let mut outcome = JobOutcome::success();
        let mut succeeded = Vec::new();

        for line in stdout.lines() {
            if let Some(caps) = self.success.captures(line) {
                if let Ok(id) = caps[1].parse::<u64>() {
                    succeeded.push(id);
                }
                continue;
            }

            if let Some(caps) = self.item_failure.captures(line) {
                if let Ok(id) = caps[1].parse::<u64>() {
                    let status = classify_item_reason(&caps[2]);
                    debug!(mod_id = id, reason = &caps[2], status = %status, "Item download failed");
                    outcome.item_errors.insert(id, status);
                }
                continue;
            }

            if outcome.job_error.is_none() {
                if let Some(caps) = self.login_failure.captures(line) {
                    let status = classify_login_reason(&caps[1]);
                    warn!(reason = caps[1].trim(), status = %status, "SteamCMD login failed");
                    outcome.job_error = Some(status);
                }
            }
        }

        // A session-wide error already covers items without their own result
        if outcome.job_error.is_none() {
            for id in requested {
                if !succeeded.contains(id) && !outcome.item_errors.contains_key(id) {
                    outcome.item_errors.insert(*id, ErrorStatus::Generic);
                }
            }
        }

        outcome
    }
}

/// Map the reason SteamCMD gives for a failed item download
pub fn classify_item_reason(reason: &str) -> ErrorStatus {
    let reason = reason.trim().to_ascii_lowercase();
    if reason.contains("timeout") {
        ErrorStatus::Timeout
    } else if reason.contains("no subscription") || reason.contains("access denied") {
        ErrorStatus::NoSubscription
    } else if reason == "failure" || reason.contains("file not found") || reason.contains("no match") {
        ErrorStatus::NoMatch
    } else if reason.contains("rate limit") {
        ErrorStatus::RateLimit
    } else {
        ErrorStatus::Generic
    }
}

/// Map a login failure reason to the session-wide error
pub fn classify_login_reason(reason: &str) -> ErrorStatus {
    let reason = reason.trim().to_ascii_lowercase();
    if reason.contains("rate limit") {
        ErrorStatus::RateLimit
    } else if reason.contains("password")
        || reason.contains("two-factor")
        || reason.contains("auth code")
        || reason.contains("account logon denied")
    {
        ErrorStatus::WrongAuth
    } else if reason.contains("timeout") {
        ErrorStatus::Timeout
    } else {
        ErrorStatus::Generic
    }
}

// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Result;

/// Normalize a workshop mod name into a filesystem-safe form
///
/// Keeps alphanumeric characters, dashes and underscores, lowercases the
/// result and replaces spaces with underscores. Used for the symlink that
/// publishes a mod into a server directory.
pub fn normalize_mod_name(name: &str) -> Result<String> {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == ' ')
        .collect();

    let normalized = sanitized
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    if normalized.is_empty() {
        return Err(anyhow::anyhow!("Mod name cannot be empty after normalization"));
    }

    if normalized.len() > 200 {
        return Err(anyhow::anyhow!("Mod name too long (max 200 characters)"));
    }

    if normalized.starts_with('-') {
        return Err(anyhow::anyhow!("Mod name cannot start with '-'"));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_simple_name() {
        assert_eq!(normalize_mod_name("CBA_A3").unwrap(), "cba_a3");
    }

    #[test]
    fn test_normalize_name_with_spaces_and_punctuation() {
        assert_eq!(normalize_mod_name("  ACE3 - Compat: RHS  ").unwrap(), "ace3_-_compat_rhs");
        assert_eq!(normalize_mod_name("Task  Force   Radio").unwrap(), "task_force_radio");
    }

    #[test]
    fn test_normalize_strips_path_traversal() {
        let result = normalize_mod_name("../../etc/passwd").unwrap();
        assert!(!result.contains('/'));
        assert!(!result.contains(".."));
        assert_eq!(result, "etcpasswd");
    }

    #[test]
    fn test_normalize_strips_non_ascii() {
        assert_eq!(normalize_mod_name("Zombies™ Überarbeitet").unwrap(), "zombies_berarbeitet");
    }

    #[test]
    fn test_normalize_empty_name() {
        assert!(normalize_mod_name("").is_err());
        assert!(normalize_mod_name("!!!").is_err());
    }

    #[test]
    fn test_normalize_leading_dash() {
        assert!(normalize_mod_name("-rf").is_err());
    }

    #[test]
    fn test_normalize_too_long() {
        assert!(normalize_mod_name(&"a".repeat(201)).is_err());
        assert!(normalize_mod_name(&"a".repeat(200)).is_ok());
    }
}

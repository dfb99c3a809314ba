// SPDX-License-Identifier: GPL-3.0-only
//! Blocking filesystem helpers for the installation pipeline.
//!
//! Everything here walks or mutates directory trees synchronously; async
//! callers run these inside `tokio::task::spawn_blocking`.

use anyhow::Context;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Rename every file and directory below `root` to lowercase.
///
/// Entries are visited deepest first so renaming a directory never
/// invalidates paths that still have to be visited. When the lowercase name
/// is already taken, as after re-downloading an installed mod, a file
/// replaces the existing one and a directory is merged into it. Returns the
/// number of renamed entries.
pub fn lowercase_tree(root: &Path) -> anyhow::Result<usize> {
    let mut renamed = 0;

    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let lowercase = name.to_lowercase();
        if lowercase == name {
            continue;
        }

        let target = entry.path().with_file_name(&lowercase);
        move_entry(entry.path(), &target)?;
        renamed += 1;
    }

    Ok(renamed)
}

/// Move `source` to `target`, overwriting a file and merging into a directory
fn move_entry(source: &Path, target: &Path) -> anyhow::Result<()> {
    let existing = match fs::symlink_metadata(target) {
        Ok(metadata) => Some(metadata.file_type()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("Failed to inspect {}", target.display())),
    };
    let source_is_dir = fs::symlink_metadata(source)
        .with_context(|| format!("Failed to inspect {}", source.display()))?
        .is_dir();

    match existing {
        Some(file_type) if file_type.is_dir() && source_is_dir => {
            for child in fs::read_dir(source)
                .with_context(|| format!("Failed to read directory {}", source.display()))?
            {
                let child = child.with_context(|| format!("Failed to read directory {}", source.display()))?;
                move_entry(&child.path(), &target.join(child.file_name()))?;
            }
            fs::remove_dir(source)
                .with_context(|| format!("Failed to remove merged directory {}", source.display()))
        }
        Some(file_type) if file_type.is_dir() || source_is_dir => Err(anyhow::anyhow!(
            "Cannot move {}: {} exists with a different file type",
            source.display(),
            target.display()
        )),
        _ => fs::rename(source, target).with_context(|| {
            format!("Failed to rename {} to {}", source.display(), target.display())
        }),
    }
}

/// Total size in bytes of all regular files below `root`. Symlinks are not followed.
pub fn directory_size(root: &Path) -> anyhow::Result<u64> {
    let mut total = 0;

    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() {
            let metadata = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            total += metadata.len();
        }
    }

    Ok(total)
}

/// All regular files below `root` whose extension matches `extension`
/// (case-insensitive), sorted by path
pub fn find_files_with_extension(root: &Path, extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Remove a file, treating an already missing file as success.
/// Returns whether something was removed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Recursively remove a directory, treating an already missing directory as success
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove `link` only if it is a symlink pointing at `target`
pub fn remove_symlink_to(link: &Path, target: &Path) -> io::Result<bool> {
    match fs::read_link(link) {
        Ok(current) if current == target => remove_file_if_exists(link),
        Ok(_) => Ok(false),
        // Missing, or not a symlink at all
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidInput) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Make `link` a symlink to `target`.
///
/// An existing link to `target` is kept and a dangling link is replaced. A
/// link to another existing directory belongs to someone else and, like a
/// regular file or directory at `link`, is an error. Returns whether the
/// link was (re)created.
pub fn ensure_symlink(link: &Path, target: &Path) -> anyhow::Result<bool> {
    match fs::symlink_metadata(link) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            let current = fs::read_link(link)
                .with_context(|| format!("Failed to read symlink {}", link.display()))?;
            if current == target {
                return Ok(false);
            }
            if link.exists() {
                return Err(anyhow::anyhow!(
                    "Cannot create symlink {}: it already points to {}",
                    link.display(),
                    current.display()
                ));
            }
            fs::remove_file(link)
                .with_context(|| format!("Failed to remove dangling symlink {}", link.display()))?;
        }
        Ok(_) => {
            return Err(anyhow::anyhow!(
                "Cannot create symlink {}: a file or directory is in the way",
                link.display()
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", link.display()));
        }
    }

    std::os::unix::fs::symlink(target, link).with_context(|| {
        format!("Failed to create symlink {} -> {}", link.display(), target.display())
    })?;

    Ok(true)
}

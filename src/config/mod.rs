// SPDX-License-Identifier: GPL-3.0-only
#[allow(clippy::module_inception)]
pub mod config;
pub mod paths;

pub use config::Config;
pub use paths::InstallPaths;

// SPDX-License-Identifier: GPL-3.0-only
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod service;

pub use error::InstallError;
pub use pipeline::InstallationPipeline;
pub use scheduler::{CycleSummary, InstallScheduler, SchedulerSettings};
pub use service::{ModsService, ScheduledInstall};

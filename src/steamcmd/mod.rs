// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod job;
pub mod output;
pub mod executor;
pub mod cache;

pub use traits::JobExecutor;
pub use job::{JobOutcome, LoginMode, SessionParams, SteamCmdJob, WorkshopItemRequest};
pub use executor::SteamCmdExecutor;
pub use cache::clear_cache;

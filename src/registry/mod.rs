// SPDX-License-Identifier: GPL-3.0-only
pub mod models;
pub mod traits;
pub mod sqlite;

pub use models::{ErrorStatus, InstallationStatus, ServerType, WorkshopMod};
pub use traits::ModStore;
pub use sqlite::SqliteModStore;

// SPDX-License-Identifier: GPL-3.0-only
pub mod traits;
pub mod steam_web;

pub use traits::{MetadataError, MetadataResolver, ModMetadata};
pub use steam_web::SteamWorkshopResolver;

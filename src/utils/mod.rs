// SPDX-License-Identifier: GPL-3.0-only
pub mod fs;
pub mod name;

pub use name::normalize_mod_name;

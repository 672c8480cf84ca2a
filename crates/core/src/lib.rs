//! Pollstake Core
//!
//! Domain types, monetary arithmetic, and helpers shared by all
//! Pollstake crates.

pub mod model;
pub mod money;

pub use model::*;
pub use money::*;

use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a fresh entity id (uuid v4, lowercase hyphenated).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current unix timestamp in seconds.
pub fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

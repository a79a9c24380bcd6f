//! Local persistence that GitHub has no place for: the activity log,
//! per-file metadata (expiration, favorites) and API keys, all in one
//! SQLite file, plus dashboard statistics computed from the log.

pub mod dashboard;
pub mod store;

pub use dashboard::{DashboardStats, MonthBucket};
pub use store::ActivityStore;

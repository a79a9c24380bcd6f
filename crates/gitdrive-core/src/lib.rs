pub mod config;
pub mod error;
pub mod hash;
pub mod path;
pub mod traits;
pub mod types;

pub use error::DriveError;
pub use types::*;

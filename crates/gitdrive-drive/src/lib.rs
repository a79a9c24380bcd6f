//! File-tree mutations over a remote Git repository.
//!
//! `engine` rewrites whole subtrees in a single commit; `facade` wraps
//! the per-file and subtree operations behind one `Drive` type and
//! records activity after each successful mutation.

pub mod engine;
pub mod facade;

pub use facade::Drive;

pub mod client;
pub mod contents;
pub mod gitdata;
pub mod memory;
pub mod repos;

pub use client::GithubClient;
pub use memory::MemoryRemote;

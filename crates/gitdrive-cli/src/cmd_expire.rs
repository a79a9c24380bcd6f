use gitdrive_core::config::Config;
use gitdrive_core::FileMetadata;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str, at: &str) -> anyhow::Result<()> {
    let activity = context::activity(config)?;
    activity.save_metadata(
        repo,
        path,
        &FileMetadata {
            expiration: Some(at.to_string()),
            favorite: None,
        },
    )?;
    println!("Set expiration of {path} to {at}");
    Ok(())
}

use gitdrive_core::config::Config;
use gitdrive_core::DriveError;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str, recursive: bool) -> anyhow::Result<()> {
    let (drive, _) = context::drive(config)?;
    let user = context::cli_user();
    let result = tokio::runtime::Runtime::new()?
        .block_on(drive.delete_item(repo, path, None, recursive, &user));
    match result {
        Ok(deleted) => {
            println!("Deleted {} file(s)", deleted.len());
            Ok(())
        }
        Err(DriveError::PartialDelete { deleted, failed }) => {
            println!("Deleted {} file(s), {} failed:", deleted.len(), failed.len());
            for (path, reason) in &failed {
                println!("  {path}: {reason}");
            }
            anyhow::bail!("folder delete incomplete")
        }
        Err(err) => Err(err.into()),
    }
}

use gitdrive_core::config::Config;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str) -> anyhow::Result<()> {
    let (drive, _) = context::drive(config)?;
    let user = context::cli_user();
    let new_path =
        tokio::runtime::Runtime::new()?.block_on(drive.duplicate_item(repo, path, &user))?;
    println!("Duplicated to {new_path}");
    Ok(())
}

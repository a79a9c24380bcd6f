use gitdrive_core::config::Config;

use crate::context;

pub fn execute(config: &Config, repo: &str, old_path: &str, new_path: &str) -> anyhow::Result<()> {
    let (drive, _) = context::drive(config)?;
    let user = context::cli_user();
    tokio::runtime::Runtime::new()?
        .block_on(drive.move_or_rename_item(repo, old_path, new_path, &user))?;
    println!("Moved {old_path} -> {new_path}");
    Ok(())
}

use gitdrive_core::config::Config;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str) -> anyhow::Result<()> {
    let (drive, _) = context::drive(config)?;
    let user = context::cli_user();
    tokio::runtime::Runtime::new()?.block_on(drive.create_folder(repo, path, &user))?;
    println!("Created folder {path}");
    Ok(())
}

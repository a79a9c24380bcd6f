use gitdrive_core::config::Config;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str) -> anyhow::Result<()> {
    let activity = context::activity(config)?;
    let favorite = activity.toggle_favorite(repo, path)?;
    if favorite {
        println!("Marked {path} as favorite");
    } else {
        println!("Removed favorite from {path}");
    }
    Ok(())
}

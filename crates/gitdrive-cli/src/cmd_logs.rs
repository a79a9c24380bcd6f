use gitdrive_core::config::Config;

use crate::context;

pub fn execute(config: &Config, repo: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let activity = context::activity(config)?;
    let logs = match repo {
        Some(repo) => activity.logs_for_repo(repo, limit)?,
        None => activity.logs(limit)?,
    };
    if logs.is_empty() {
        println!("No activity recorded.");
        return Ok(());
    }
    for entry in logs {
        println!(
            "{}  {:13}  {}  {}  ({})",
            entry.ts, entry.action, entry.repo_full_name, entry.path, entry.user.name
        );
    }
    Ok(())
}

//! Shared wiring for command modules: configured clients, the local
//! activity store, and the facade over both.

use std::sync::Arc;

use gitdrive_activity::ActivityStore;
use gitdrive_core::config::Config;
use gitdrive_core::ApiUser;
use gitdrive_drive::Drive;
use gitdrive_github::GithubClient;

pub fn github(config: &Config) -> anyhow::Result<Arc<GithubClient>> {
    if config.github_token.is_empty() {
        anyhow::bail!("no GitHub token configured (set GITDRIVE_GITHUB_TOKEN)");
    }
    let client = GithubClient::new(config.github_token.clone(), config.api_base.clone())?;
    Ok(Arc::new(client))
}

pub fn activity(config: &Config) -> anyhow::Result<Arc<ActivityStore>> {
    Ok(Arc::new(ActivityStore::open_or_create(
        &config.activity_db_path(),
    )?))
}

pub fn drive(config: &Config) -> anyhow::Result<(Drive, Arc<ActivityStore>)> {
    let client = github(config)?;
    let activity = activity(config)?;
    let drive = Drive::new(client.clone(), client, activity.clone());
    Ok((drive, activity))
}

/// The actor recorded for mutations issued from this terminal.
pub fn cli_user() -> ApiUser {
    ApiUser {
        name: "CLI".to_string(),
        email: "N/A".to_string(),
        uid: None,
    }
}

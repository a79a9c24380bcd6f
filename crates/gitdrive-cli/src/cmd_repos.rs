use gitdrive_core::config::Config;
use gitdrive_core::traits::RepoStore;

use crate::context;

pub fn list(config: &Config) -> anyhow::Result<()> {
    let client = context::github(config)?;
    let repos = tokio::runtime::Runtime::new()?.block_on(client.repositories())?;
    if repos.is_empty() {
        println!("No repositories visible to this token.");
        return Ok(());
    }
    for repo in repos {
        let visibility = if repo.private { "private" } else { "public" };
        println!("{:8} {}", visibility, repo.full_name);
    }
    Ok(())
}

pub fn create(config: &Config, name: &str) -> anyhow::Result<()> {
    let client = context::github(config)?;
    let repo = tokio::runtime::Runtime::new()?.block_on(client.create_repository(name))?;
    println!("Created {} ({})", repo.full_name, repo.html_url);
    Ok(())
}

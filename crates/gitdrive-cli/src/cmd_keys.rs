use gitdrive_core::config::Config;

use crate::context;

pub fn generate(config: &Config, user: &str) -> anyhow::Result<()> {
    let activity = context::activity(config)?;
    let key = activity.generate_key(user)?;
    println!("{}", key.key);
    println!("id: {}", key.id);
    Ok(())
}

pub fn list(config: &Config, user: &str) -> anyhow::Result<()> {
    let activity = context::activity(config)?;
    let keys = activity.keys_for_user(user)?;
    if keys.is_empty() {
        println!("No keys for {user}.");
        return Ok(());
    }
    for key in keys {
        println!("{}  {}  created {}", key.id, key.key, key.created_at);
    }
    Ok(())
}

pub fn revoke(config: &Config, user: &str, key_id: &str) -> anyhow::Result<()> {
    let activity = context::activity(config)?;
    activity.revoke_key(user, key_id)?;
    println!("Revoked {key_id}");
    Ok(())
}

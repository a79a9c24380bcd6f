use std::io::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gitdrive_core::config::Config;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str) -> anyhow::Result<()> {
    let (drive, _) = context::drive(config)?;
    let node = tokio::runtime::Runtime::new()?.block_on(drive.get_file_content(repo, path))?;
    let content = node
        .content
        .ok_or_else(|| anyhow::anyhow!("no content returned for {path}"))?;
    let bytes = BASE64.decode(content)?;
    std::io::stdout().write_all(&bytes)?;
    Ok(())
}

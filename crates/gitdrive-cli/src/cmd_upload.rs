use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use gitdrive_core::config::Config;
use gitdrive_core::UploadOutcome;

use crate::context;

pub fn execute(
    config: &Config,
    repo: &str,
    path: &str,
    file: &Path,
    message: Option<&str>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;
    let content_b64 = BASE64.encode(&bytes);
    let (drive, _) = context::drive(config)?;
    let user = context::cli_user();
    let (node, outcome) = tokio::runtime::Runtime::new()?.block_on(drive.upload_file(
        repo,
        path,
        &content_b64,
        message,
        &user,
    ))?;
    match outcome {
        UploadOutcome::Created => println!("Created {} ({} bytes)", node.path, node.size),
        UploadOutcome::Updated => println!("Updated {} ({} bytes)", node.path, node.size),
    }
    Ok(())
}

use gitdrive_core::config::Config;
use gitdrive_core::FileKind;

use crate::context;

pub fn execute(config: &Config, repo: &str, path: &str) -> anyhow::Result<()> {
    let (drive, _) = context::drive(config)?;
    let nodes = tokio::runtime::Runtime::new()?.block_on(drive.list(repo, path))?;
    if nodes.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for node in nodes {
        match node.kind {
            FileKind::Folder => println!("{:>10}  {}/", "-", node.name),
            FileKind::File => println!("{:>10}  {}", node.size, node.name),
        }
    }
    Ok(())
}

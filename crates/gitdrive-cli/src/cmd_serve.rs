use std::sync::Arc;

use gitdrive_core::config::Config;
use gitdrive_drive::Drive;
use gitdrive_serve::{AppState, ServeConfig};

use crate::context;

pub fn execute(config: &Config, bind: &str, port: u16) -> anyhow::Result<()> {
    let client = context::github(config)?;
    let activity = context::activity(config)?;
    let drive = Drive::new(client.clone(), client.clone(), activity.clone());
    let state = Arc::new(AppState::new(
        drive,
        client,
        activity,
        config.static_api_key.clone(),
    ));
    let serve_config = ServeConfig {
        bind: bind.to_string(),
        port,
    };
    tokio::runtime::Runtime::new()?.block_on(gitdrive_serve::serve(state, serve_config))
}

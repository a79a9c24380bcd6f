mod cmd_cat;
mod cmd_duplicate;
mod cmd_expire;
mod cmd_favorite;
mod cmd_keys;
mod cmd_logs;
mod cmd_ls;
mod cmd_mkdir;
mod cmd_mv;
mod cmd_repos;
mod cmd_rm;
mod cmd_serve;
mod cmd_upload;
mod context;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gitdrive_core::config::Config;

#[derive(Parser)]
#[command(name = "gitdrive", version, about = "File manager backed by a GitHub repository")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List repositories visible to the configured token
    Repos,
    /// Create a private, auto-initialized repository
    RepoCreate {
        /// Repository name
        name: String,
    },
    /// List a folder
    Ls {
        /// Repository full name (owner/name)
        repo: String,
        /// Folder path ("" for the root)
        #[arg(default_value = "")]
        path: String,
    },
    /// Print a file's content to stdout
    Cat {
        repo: String,
        path: String,
    },
    /// Upload a local file
    Upload {
        repo: String,
        /// Destination path in the repository
        path: String,
        /// Local file to read
        file: PathBuf,
        /// Commit message override
        #[arg(long)]
        message: Option<String>,
    },
    /// Create an empty folder
    Mkdir {
        repo: String,
        path: String,
    },
    /// Delete a file, or a folder with --recursive
    Rm {
        repo: String,
        path: String,
        #[arg(long, short)]
        recursive: bool,
    },
    /// Move or rename a file or folder
    Mv {
        repo: String,
        old_path: String,
        new_path: String,
    },
    /// Copy a file next to itself as "<name> (copy)"
    Duplicate {
        repo: String,
        path: String,
    },
    /// Toggle the favorite flag on a file
    Favorite {
        repo: String,
        path: String,
    },
    /// Set a file's expiration timestamp
    Expire {
        repo: String,
        path: String,
        /// RFC3339 timestamp
        at: String,
    },
    /// Show recent activity
    Logs {
        /// Restrict to one repository
        #[arg(long)]
        repo: Option<String>,
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Manage API keys for the public upload API
    Keys {
        #[command(subcommand)]
        cmd: KeysCommand,
    },
    /// Run the HTTP API server
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Mint a new key for a user
    Generate { user: String },
    /// List a user's keys
    List { user: String },
    /// Revoke one of a user's keys by id
    Revoke { user: String, key_id: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.cmd {
        Command::Repos => cmd_repos::list(&config),
        Command::RepoCreate { name } => cmd_repos::create(&config, &name),
        Command::Ls { repo, path } => cmd_ls::execute(&config, &repo, &path),
        Command::Cat { repo, path } => cmd_cat::execute(&config, &repo, &path),
        Command::Upload {
            repo,
            path,
            file,
            message,
        } => cmd_upload::execute(&config, &repo, &path, &file, message.as_deref()),
        Command::Mkdir { repo, path } => cmd_mkdir::execute(&config, &repo, &path),
        Command::Rm {
            repo,
            path,
            recursive,
        } => cmd_rm::execute(&config, &repo, &path, recursive),
        Command::Mv {
            repo,
            old_path,
            new_path,
        } => cmd_mv::execute(&config, &repo, &old_path, &new_path),
        Command::Duplicate { repo, path } => cmd_duplicate::execute(&config, &repo, &path),
        Command::Favorite { repo, path } => cmd_favorite::execute(&config, &repo, &path),
        Command::Expire { repo, path, at } => cmd_expire::execute(&config, &repo, &path, &at),
        Command::Logs { repo, limit } => cmd_logs::execute(&config, repo.as_deref(), limit),
        Command::Keys { cmd } => match cmd {
            KeysCommand::Generate { user } => cmd_keys::generate(&config, &user),
            KeysCommand::List { user } => cmd_keys::list(&config, &user),
            KeysCommand::Revoke { user, key_id } => cmd_keys::revoke(&config, &user, &key_id),
        },
        Command::Serve { bind, port } => cmd_serve::execute(&config, &bind, port),
    }
}

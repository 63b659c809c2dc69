//! # roomchat
//!
//! Command-line client for a roomchat relay.
//!
//! ## Commands
//!
//! - `register` / `login`: Obtain a token and remember it
//! - `logout`: Forget the saved token
//! - `status`: Show who is logged in, and where
//! - `rooms`: List, search, create, show and delete rooms
//! - `join`: Chat in a room from the terminal
//!
//! ## Example
//!
//! ```bash
//! roomchat --server http://127.0.0.1:8000 register alice@example.com
//! roomchat rooms create general
//! roomchat join 1
//! ```

use anyhow::{Context, Result};
use chat_types::RoomId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod client;
mod commands;
mod config;

use client::ApiClient;
use commands::{account, join, rooms};
use config::{resolve_server, SessionConfig};

/// Command-line client for a roomchat relay.
#[derive(Parser, Debug)]
#[command(name = "roomchat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the saved login
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Relay HTTP address (defaults to the saved login's server)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and log in
    Register {
        /// Account email
        email: String,

        /// Password (prompted for if omitted)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Log in to an existing account
    Login {
        /// Account email
        email: String,

        /// Password (prompted for if omitted)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Forget the saved login
    Logout,

    /// Show the saved login
    Status,

    /// Manage rooms
    Rooms {
        #[command(subcommand)]
        command: RoomCommands,
    },

    /// Chat in a room (stdin is sent, room lines are printed)
    Join {
        /// Room id
        room: RoomId,
    },
}

#[derive(Subcommand, Debug)]
enum RoomCommands {
    /// List rooms you own
    List,

    /// Find rooms whose name contains a string
    Search {
        /// Substring to look for
        query: String,
    },

    /// Create a room
    Create {
        /// Room name
        name: String,
    },

    /// Show a room and how many people are in it
    Show {
        /// Room id
        room: RoomId,
    },

    /// Delete a room you own
    Delete {
        /// Room id
        room: RoomId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    let saved = SessionConfig::load(&data_dir).await.ok();
    let server = resolve_server(cli.server.as_deref(), saved.as_ref());

    match cli.command {
        Commands::Register { email, password } => {
            let password = account::password_or_prompt(password)?;
            account::register(&data_dir, &server, &email, &password).await?;
        }
        Commands::Login { email, password } => {
            let password = account::password_or_prompt(password)?;
            account::login(&data_dir, &server, &email, &password).await?;
        }
        Commands::Logout => {
            account::logout(&data_dir).await?;
        }
        Commands::Status => {
            account::status(&data_dir).await?;
        }
        Commands::Rooms { command } => {
            let session = SessionConfig::load(&data_dir).await?;
            let client = ApiClient::new(&server).with_token(&session.token);
            match command {
                RoomCommands::List => rooms::list(&client).await?,
                RoomCommands::Search { query } => rooms::search(&client, &query).await?,
                RoomCommands::Create { name } => rooms::create(&client, &name).await?,
                RoomCommands::Show { room } => rooms::show(&client, room).await?,
                RoomCommands::Delete { room } => rooms::delete(&client, room).await?,
            }
        }
        Commands::Join { room } => {
            let session = SessionConfig::load(&data_dir).await?;
            let client = ApiClient::new(&server).with_token(&session.token);
            join::run(&client, &session.token, room).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for roomchat.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "labaweb", "roomchat")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

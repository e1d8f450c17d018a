//! CLI entry and dispatch.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ores_core::{config, logging};

use crate::modes;

pub(crate) mod commands;

#[derive(Parser)]
#[command(name = "ores")]
#[command(version = "0.1")]
#[command(about = "Terminal viewer for the Supabase Ores table")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Read the table without requiring a session (signed-in users still
    /// send their token)
    #[arg(long, global = true)]
    anon: bool,
}

#[derive(clap::Args, Debug, Clone)]
struct CredentialArgs {
    /// Account email
    #[arg(long)]
    email: String,

    /// Account password (prompted on stdin when absent)
    #[arg(long, env = "ORES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Also write the page as HTML to this path
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Load the table once and print it
    Load {
        /// Also write the page as HTML to this path
        #[arg(long, value_name = "PATH")]
        html: Option<PathBuf>,
    },
    /// Sign in with email and password, then load the table
    Signin(CredentialArgs),
    /// Create an account, then load the table if signed in right away
    Signup(CredentialArgs),
    /// Sign out and clear the stored session
    Signout,
    /// Show the stored session
    Session,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Generate a fresh config from Rust defaults (for xtask)
    Generate,
}

/// Returned when the rendered page ends in an error state.
#[derive(Debug)]
pub struct PageFailed;

impl fmt::Display for PageFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("page finished with an error")
    }
}

impl std::error::Error for PageFailed {}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = logging::init().context("init logging")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;
    let Cli { command, anon } = cli;

    // default to interactive mode
    let Some(command) = command else {
        return modes::interactive::run(commands::build_app(config, anon)).await;
    };

    match command {
        Commands::Load { html } => commands::load::run(config, anon, html.as_deref()).await,
        Commands::Signin(args) => {
            let password = commands::auth::password_or_prompt(args.password).await?;
            commands::auth::sign_in(config, anon, &args.email, &password, args.html.as_deref())
                .await
        }
        Commands::Signup(args) => {
            let password = commands::auth::password_or_prompt(args.password).await?;
            commands::auth::sign_up(config, anon, &args.email, &password, args.html.as_deref())
                .await
        }
        Commands::Signout => commands::auth::sign_out(config, anon).await,
        Commands::Session => commands::auth::session(),
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::Generate => commands::config::generate(),
        },
    }
}

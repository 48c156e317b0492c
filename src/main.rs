use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repocourier::{AppState, Config, GitHubClient, GitHubConnector, ProjectScanner, RemoteHost};

#[derive(Parser)]
#[command(name = "repocourier")]
#[command(about = "Publish a local project into a GitHub repository over HTTP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address (overrides server.listen)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// List the files a push would upload
    Scan {
        /// Project directory (overrides push.root)
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show authentication status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load(&path)?,
        None => Config::load_or_default()?,
    };

    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting repocourier v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { listen } => cmd_serve(listen, config).await,
        Commands::Scan { root } => cmd_scan(root, config),
        Commands::Auth { auth_command } => cmd_auth(auth_command, &config).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let default_level = if verbose { "debug" } else { level };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Run the HTTP API until interrupted
async fn cmd_serve(listen: Option<String>, config: Config) -> Result<()> {
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let connector = Arc::new(GitHubConnector::new(config.github.clone()));

    info!("Publishing files from {:?}", config.push_root());

    let state = Arc::new(AppState::new(config, connector)?);
    repocourier::server::serve(state, &listen).await
}

/// Print the file set a push would upload, in upload order
fn cmd_scan(root: Option<String>, mut config: Config) -> Result<()> {
    if let Some(root) = root {
        config.push.root = root;
        config.expand_paths()?;
    }

    let scanner = ProjectScanner::from_config(&config.push)?;
    let files = scanner.scan()?;

    for file in &files {
        println!("{}", file.repo_path);
    }
    println!();
    println!("{} files under {:?}", files.len(), scanner.root());

    Ok(())
}

/// Handle authentication commands
async fn cmd_auth(auth_command: AuthCommands, config: &Config) -> Result<()> {
    match auth_command {
        AuthCommands::Status => {
            let client = match GitHubClient::new(&config.github).await {
                Ok(client) => client,
                Err(e) => {
                    println!("❌ Authentication failed: {}", e);
                    return Ok(());
                }
            };

            match client.authenticated_user().await {
                Ok(user) => {
                    println!("✅ Authentication successful");
                    println!("   Username: {}", user.login);
                }
                Err(e) => {
                    println!("❌ Authentication failed: {}", e);
                }
            }
            Ok(())
        }
    }
}

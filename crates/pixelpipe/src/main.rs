//! Pixelpipe CLI - render pipeline scripts and publish live snapshot streams.
//!
//! # Usage
//!
//! ```bash
//! # Render a script to a PNG
//! pixelpipe render scene.pxp -o scene.png
//!
//! # Blend two images
//! pixelpipe blend photo.jpg overlay.png --mode screen -o out.png
//!
//! # Serve the streams configured in config.toml
//! pixelpipe serve --bind 0.0.0.0:8080
//!
//! # View configuration
//! pixelpipe config show
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pixelpipe_core::Config;

mod cli;
mod logging;

/// Pixelpipe - concurrent image pipeline runtime.
#[derive(Parser, Debug)]
#[command(name = "pixelpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "PIXELPIPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Render pipeline scripts to PNG files
    Render(cli::render::RenderArgs),

    /// Blend two images with a named blend mode
    Blend(cli::blend::BlendArgs),

    /// List the available blend modes
    Modes(cli::modes::ModesArgs),

    /// Run the configured streams and serve their latest images over HTTP
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => match Config::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load config: {e}\n  \
                     Using default configuration. Check your config file with `pixelpipe config path`."
                );
                Config::default()
            }
        },
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Pixelpipe v{}", pixelpipe_core::VERSION);

    match cli.command {
        Commands::Render(args) => cli::render::execute(args, config).await,
        Commands::Blend(args) => cli::blend::execute(args, config).await,
        Commands::Modes(args) => cli::modes::execute(args),
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config, cli.config),
    }
}

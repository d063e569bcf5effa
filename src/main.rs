//! launch_sync CLI application
//!
//! Updates an application folder from its update service and starts the
//! application, with terminal progress and graceful Ctrl-C handling.

use std::process;
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use launch_sync::app::sync::{create_shutdown_token, SignalHandler};
use launch_sync::cli::{
    handle_cache, handle_eula, handle_launch, handle_run, handle_status, handle_sync, Cli,
    CommandContext, Commands, ProgressConfig, ProgressDisplay,
};
use launch_sync::config::AppConfig;
use launch_sync::constants::logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // A missing config directory only means there is nothing to initialize
    if cli.global.config.is_none() {
        if let Ok(Some(path)) = AppConfig::initialize_first_run().await {
            if !cli.global.quiet {
                eprintln!("Created default configuration file: {}", path.display());
            }
        }
    }

    let mut config = AppConfig::load(cli.global.config.clone())
        .await
        .context("could not load configuration")?;
    config.apply_overrides(&cli.overrides());

    init_logging(&cli, &config.logging.level)?;
    info!("launch_sync v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(source) = &config.source {
        debug!("Configuration read from {}", source.display());
    }

    let shutdown = create_shutdown_token();
    let _signal_task = SignalHandler::new(shutdown.clone()).setup();

    let display = ProgressDisplay::new(ProgressConfig {
        quiet: cli.global.quiet,
        ..Default::default()
    });
    let ctx = CommandContext {
        config,
        observer: Arc::new(display),
        shutdown,
        quiet: cli.global.quiet,
    };

    match cli.command {
        Commands::Run(args) => handle_run(&ctx, args).await?,
        Commands::Sync => handle_sync(&ctx).await?,
        Commands::Launch => handle_launch(&ctx).await?,
        Commands::Eula(args) => handle_eula(&ctx, args).await?,
        Commands::Cache(args) => handle_cache(&ctx, args).await?,
        Commands::Status => handle_status(&ctx).await?,
    }
    Ok(())
}

/// Initialize logging from the verbosity flags and the configured level
///
/// `RUST_LOG` directives are honoured; the crate's own level is added on top.
fn init_logging(cli: &Cli, configured_level: &str) -> anyhow::Result<()> {
    let level = cli.log_level(configured_level);
    let directive: Directive = format!("{}={}", logging::CRATE_TARGET, level)
        .parse()
        .with_context(|| format!("invalid log level '{}'", level))?;

    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    }
    Ok(())
}

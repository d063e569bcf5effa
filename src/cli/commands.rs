//! Command handlers for the launch_sync CLI
//!
//! This module implements the command handlers that connect parsed arguments
//! and the loaded configuration to the launcher session and the sync engine.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::cache::HashCache;
use crate::app::client::UpdateClient;
use crate::app::sync::{SyncObserver, SyncReport};
use crate::cli::{CacheAction, CacheArgs, EulaAction, EulaArgs, RunArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result, SyncError};
use crate::launcher::{InstallLayout, LauncherSession, ProcessHandoff, StartOutcome};

/// Everything a handler needs besides its own arguments
pub struct CommandContext {
    pub config: AppConfig,
    pub observer: Arc<dyn SyncObserver>,
    pub shutdown: CancellationToken,
    pub quiet: bool,
}

impl CommandContext {
    /// Launcher session for the configured service and layout
    ///
    /// With `require_service` the configuration is validated first, which
    /// catches a missing API key before anything is requested.
    fn session(&self, require_service: bool) -> Result<LauncherSession> {
        if require_service {
            self.config.validate()?;
        }

        let layout = self.config.layout()?;
        let client = UpdateClient::new(self.config.endpoint()?, self.config.client.clone())?;
        let handoff = Arc::new(ProcessHandoff::new(
            &layout,
            self.config.install.binary_args.clone(),
        ));

        Ok(
            LauncherSession::new(layout, client, Arc::clone(&self.observer), handoff)
                .with_options(self.config.sync_options())
                .with_eula_item(self.config.install.eula_item.clone())
                .with_shutdown(self.shutdown.clone()),
        )
    }

    fn layout(&self) -> Result<InstallLayout> {
        Ok(self.config.layout()?)
    }
}

/// Handle the run command
///
/// Shows the terms on first use, asks for acceptance on the terminal, then
/// updates and starts the application.
pub async fn handle_run(ctx: &CommandContext, args: RunArgs) -> Result<()> {
    let mut options = ctx.config.sync_options();
    options.launch = options.launch && !args.no_launch;
    let session = ctx.session(true)?.with_options(options);

    if args.accept_eula && !session.layout().eula_accepted() {
        info!("Accepting terms from the command line");
        session.layout().accept_eula().await?;
    }

    let report = match session.on_started().await? {
        StartOutcome::Synced(report) => report,
        StartOutcome::AwaitingEula => {
            if ask_accept(&ctx.shutdown).await? {
                session.on_eula_accepted().await?
            } else {
                session.on_eula_declined();
                println!("Terms declined; nothing was installed.");
                return Ok(());
            }
        }
    };

    print_report(ctx, &report);
    Ok(())
}

/// Handle the sync command: update only, no terms gate and no hand-off
pub async fn handle_sync(ctx: &CommandContext) -> Result<()> {
    let mut options = ctx.config.sync_options();
    options.launch = false;
    let session = ctx.session(true)?.with_options(options);

    let report = session.run_sync().await?;
    print_report(ctx, &report);
    Ok(())
}

/// Handle the launch command
pub async fn handle_launch(ctx: &CommandContext) -> Result<()> {
    let session = ctx.session(false)?;
    session.on_run_app()?;
    if !ctx.quiet {
        println!("Started {}", session.layout().binary().display());
    }
    Ok(())
}

/// Handle terms marker management
pub async fn handle_eula(ctx: &CommandContext, args: EulaArgs) -> Result<()> {
    let layout = ctx.layout()?;

    match args.action {
        EulaAction::Accept => {
            layout.accept_eula().await?;
            println!("Terms accepted ({})", layout.eula_marker().display());
        }
        EulaAction::Status => {
            if layout.eula_accepted() {
                println!("Terms accepted ({})", layout.eula_marker().display());
            } else {
                println!("Terms not accepted");
            }
        }
        EulaAction::Reset => {
            if layout.reset_eula().await? {
                println!("Terms acceptance removed; they will be shown on the next run");
            } else {
                println!("Terms were not accepted; nothing to reset");
            }
        }
    }
    Ok(())
}

/// Handle hash cache management
pub async fn handle_cache(ctx: &CommandContext, args: CacheArgs) -> Result<()> {
    let layout = ctx.layout()?;

    match args.action {
        CacheAction::Show { limit } => {
            let cache = HashCache::load(layout.cache_file()).await;
            println!("Hash cache: {}", cache.path().display());
            println!("{} entries", cache.len());

            let records = cache.records();
            let shown = limit.unwrap_or(records.len()).min(records.len());
            for record in records.iter().take(shown) {
                println!(
                    "  {}  {}  {}",
                    record.hash,
                    format_mtime(record.mtime),
                    record.path
                );
            }
            if shown < records.len() {
                println!("  ... {} more", records.len() - shown);
            }
        }
        CacheAction::Clear => match tokio::fs::remove_file(layout.cache_file()).await {
            Ok(()) => println!("Removed {}", layout.cache_file().display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                println!("No hash cache at {}", layout.cache_file().display())
            }
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

/// Handle the status command
pub async fn handle_status(ctx: &CommandContext) -> Result<()> {
    let config = &ctx.config;
    let layout = ctx.layout()?;

    println!("launch_sync v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Configuration");
    match &config.source {
        Some(path) => println!("  File:        {}", path.display()),
        None => println!("  File:        (defaults)"),
    }
    println!("  Service:     {}", config.service.url);
    println!("  OS key:      {}", config.service.os_key);
    println!(
        "  API key:     {}",
        if config.service.api_key.is_empty() {
            "(not set)"
        } else {
            "(set)"
        }
    );
    if let Err(e) = config.validate() {
        println!("  Problems:    {}", e);
    }

    println!();
    println!("Install layout");
    println!("  Root:        {}", layout.root().display());
    println!("  App folder:  {}", layout.app_dir().display());
    println!("  Hash cache:  {}", layout.cache_file().display());
    println!("  Binary:      {}", layout.binary().display());
    println!("  Installed:   {}", yes_no(layout.previous_install()));
    println!("  First run:   {}", yes_no(layout.first_install()));
    println!("  Terms:       {}", yes_no(layout.eula_accepted()));

    Ok(())
}

fn print_report(ctx: &CommandContext, report: &SyncReport) {
    if ctx.quiet {
        return;
    }
    println!("{}", report);
    if report.launched {
        println!("Application started");
    }
}

/// Ask whether the terms are accepted, giving up if `shutdown` is cancelled
async fn ask_accept(shutdown: &CancellationToken) -> Result<bool> {
    let prompt = tokio::task::spawn_blocking(prompt_accept);
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(SyncError::Cancelled.into()),
        answer = prompt => answer.map_err(|e| AppError::generic(e.to_string()))?,
    }
}

/// Ask on the terminal whether the terms are accepted
fn prompt_accept() -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        warn!("Terms not accepted and stdin is not a terminal");
        return Err(AppError::generic(
            "Terms must be accepted; rerun with --accept-eula",
        ));
    }

    print!("Accept these terms? [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Render a cache mtime (nanoseconds since the epoch)
fn format_mtime(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    match DateTime::<Utc>::from_timestamp(secs, subsec) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => nanos.to_string(),
    }
}

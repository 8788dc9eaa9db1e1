//! CLI command implementations

pub mod about;
pub mod analytics;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod links;
pub mod logs;
pub mod open;
pub mod shorten;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use clipo_core::config::default_clipo_dir;
use clipo_core::services::{EntryPoint, LogEvent, LoggingService};
use clipo_core::{ClipoContext, DateRange};

use crate::output;

/// The process-wide event log, opened on first use
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn logger() -> Option<Arc<LoggingService>> {
    static LOGGER: OnceLock<Option<Arc<LoggingService>>> = OnceLock::new();
    LOGGER
        .get_or_init(|| {
            let clipo_dir = get_clipo_dir();
            std::fs::create_dir_all(&clipo_dir).ok()?;
            LoggingService::new(&clipo_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
                .map(Arc::new)
                .map_err(|e| tracing::debug!(error = %e, "event log unavailable"))
                .ok()
        })
        .clone()
}

/// Log an event, ignoring any errors
pub fn log_event(event: LogEvent) {
    if let Some(l) = logger() {
        let _ = l.log(event);
    }
}

pub fn log_command(command: &str) {
    log_event(LogEvent::new("command_executed").with_command(command));
}

pub fn log_failure(command: &str, err: &anyhow::Error) {
    log_event(
        LogEvent::new("command_failed")
            .with_command(command)
            .with_error(format!("{:#}", err)),
    );
}

pub fn get_clipo_dir() -> PathBuf {
    default_clipo_dir()
}

/// Open the Clipo context with the error screen wired to every query
pub fn get_context() -> Result<ClipoContext> {
    let clipo_dir = get_clipo_dir();
    std::fs::create_dir_all(&clipo_dir)
        .with_context(|| format!("Failed to create Clipo directory: {:?}", clipo_dir))?;

    let ctx = ClipoContext::new(&clipo_dir).context("Failed to initialize Clipo context")?;

    ctx.on_fetch_error(|tag, failure| {
        if let Some(l) = logger() {
            let _ = l.log_fetch_failure(tag, failure);
        }
        output::error_screen(failure);
    });
    Ok(ctx)
}

/// A failure the error screen has already shown. The command still exits
/// non-zero, but no second message is printed.
#[derive(Debug)]
pub struct AlreadyReported(pub String);

impl fmt::Display for AlreadyReported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for AlreadyReported {}

/// Text to print for a failed command, or `None` when it was already shown
pub fn report_message(err: &anyhow::Error) -> Option<String> {
    if err.downcast_ref::<AlreadyReported>().is_some() {
        None
    } else {
        Some(format!("{:#}", err))
    }
}

/// Fail early with a hint when there is no session
pub fn require_login(ctx: &ClipoContext) -> Result<()> {
    if !ctx.session.is_authenticated() {
        anyhow::bail!("Not logged in. Run `clipo login` first.");
    }
    Ok(())
}

/// `--from/--to` if given, otherwise the configured range
pub fn resolve_range(ctx: &ClipoContext, from: Option<String>, to: Option<String>) -> Result<DateRange> {
    let default = ctx.config.date_range;
    let from = from.unwrap_or_else(|| default.start.format("%Y-%m-%d").to_string());
    let to = to.unwrap_or_else(|| default.end.format("%Y-%m-%d").to_string());
    Ok(DateRange::parse(&from, &to)?)
}

//! Config command - show and change settings.json

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use serde_json::json;

use clipo_core::config::{Config, SETTINGS_FILE};

use super::get_clipo_dir;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the backend API address
    SetBackend {
        /// e.g. https://api.clipo.example
        url: String,
    },
    /// Set the frontend address used in share links
    SetFrontend {
        /// e.g. https://clipo.example
        url: String,
    },
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let clipo_dir = get_clipo_dir();
    let mut config = Config::load(&clipo_dir)?;

    match command {
        ConfigCommands::Show { json } => {
            if json {
                let value = json!({
                    "directory": clipo_dir.to_string_lossy(),
                    "backendUrl": config.backend_url,
                    "frontendUrl": config.frontend_url,
                    "timeoutSecs": config.timeout.as_secs(),
                    "staleTimeMs": config.stale_time.as_millis() as u64,
                    "dateRange": config.date_range,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            println!("{}", "Clipo Settings".bold());
            let mut table = output::create_table();
            table.add_row(vec!["Directory".to_string(), clipo_dir.display().to_string()]);
            table.add_row(vec!["Backend".to_string(), config.backend_url.clone()]);
            table.add_row(vec!["Frontend".to_string(), config.frontend_url.clone()]);
            table.add_row(vec!["Timeout".to_string(), format!("{}s", config.timeout.as_secs())]);
            table.add_row(vec!["Cache".to_string(), format!("{}ms", config.stale_time.as_millis())]);
            table.add_row(vec![
                "Click range".to_string(),
                format!("{} to {}", config.date_range.start, config.date_range.end),
            ]);
            println!("{}", table);
        }
        ConfigCommands::SetBackend { url } => {
            config.set_backend_url(&url)?;
            config.save(&clipo_dir)?;
            output::success(&format!("Backend set to {} in {}", config.backend_url, SETTINGS_FILE));
        }
        ConfigCommands::SetFrontend { url } => {
            config.set_frontend_url(&url)?;
            config.save(&clipo_dir)?;
            output::success(&format!("Frontend set to {} in {}", config.frontend_url, SETTINGS_FILE));
        }
    }
    Ok(())
}

//! Clipo CLI - short links and their clicks in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{about, analytics, auth, config, dashboard, links, logs, open, shorten};

/// Clipo - shorten links and watch them get clicked
#[derive(Parser)]
#[command(name = "clipo", version, about, long_about = None)]
struct Cli {
    /// Print debug diagnostics to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        /// Username (prompted if omitted)
        #[arg(long, short)]
        username: Option<String>,
        /// Password (CLIPO_PASSWORD or prompt if omitted)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(long, short)]
        username: Option<String>,
        #[arg(long, short)]
        email: Option<String>,
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show who is signed in
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Totals, click chart and your links
    Dashboard {
        /// First day of the click range (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Last day of the click range (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List your short links, newest first
    Links {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a short link
    Shorten {
        /// URL to shorten
        url: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clicks per day for one short link
    Analytics {
        /// Short code
        code: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Follow a short link
    Open {
        /// Short code
        code: String,
        /// Ask the backend for the destination instead of printing the redirect address
        #[arg(long)]
        resolve: bool,
    },

    /// What Clipo is
    About,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    /// Name recorded in the event log
    fn name(&self) -> &'static str {
        match self {
            Commands::Login { .. } => "login",
            Commands::Register { .. } => "register",
            Commands::Logout => "logout",
            Commands::Whoami { .. } => "whoami",
            Commands::Dashboard { .. } => "dashboard",
            Commands::Links { .. } => "links",
            Commands::Shorten { .. } => "shorten",
            Commands::Analytics { .. } => "analytics",
            Commands::Open { .. } => "open",
            Commands::About => "about",
            Commands::Config { .. } => "config",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("CLIPO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(message) = commands::report_message(&e) {
                output::error(&message);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let name = cli.command.name();
    commands::log_command(name);

    let result = match cli.command {
        Commands::Login { username, password } => auth::login(username, password),
        Commands::Register { username, email, password } => auth::register(username, email, password),
        Commands::Logout => auth::logout(),
        Commands::Whoami { json } => auth::whoami(json),
        Commands::Dashboard { from, to, json } => dashboard::run(from, to, json),
        Commands::Links { json } => links::run(json),
        Commands::Shorten { url, json } => shorten::run(&url, json),
        Commands::Analytics { code, from, to, json } => analytics::run(&code, from, to, json),
        Commands::Open { code, resolve } => open::run(&code, resolve),
        Commands::About => about::run(),
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    };

    if let Err(e) = &result {
        commands::log_failure(name, e);
    }
    result
}

//! Output formatting utilities

use std::time::Duration;

use clipo_core::{ClickCount, FetchFailure, ShortLink, UserIdentity};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

/// Widest bar in a click chart
const CHART_WIDTH: usize = 40;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Loading indicator on stderr; hidden when stderr is not a terminal
pub fn spinner(msg: &str) -> ProgressBar {
    if atty::isnt(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Full-screen error view for a failed fetch
pub fn error_screen(failure: &FetchFailure) {
    eprintln!();
    eprintln!("{}", "Oops... Something went wrong".red().bold());
    eprintln!("  {}", failure.message);
    if let Some(status) = failure.status {
        eprintln!("  {}", format!("HTTP {} ({})", status, failure.kind).dimmed());
    }
    if failure.is_unauthorized() {
        eprintln!();
        eprintln!("  Your session may have expired. Run `clipo login` to sign in again.");
    }
    eprintln!();
}

/// Horizontal bar chart, one row per day in series order
pub fn click_chart(series: &[ClickCount]) -> Vec<String> {
    let max = series.iter().map(|c| c.count).max().unwrap_or(0);
    series
        .iter()
        .map(|point| {
            let width = if max == 0 {
                0
            } else {
                ((point.count as f64 / max as f64) * CHART_WIDTH as f64).round() as usize
            };
            format!("{:<10} {} {}", point.click_date, "█".repeat(width), point.count)
        })
        .collect()
}

pub fn print_click_chart(series: &[ClickCount]) {
    if series.is_empty() {
        println!("{}", "No clicks in this range.".dimmed());
        return;
    }
    for line in click_chart(series) {
        println!("  {}", line);
    }
}

/// Link list as shown on the dashboard
pub fn links_table(links: &[ShortLink], display_url: impl Fn(&str) -> String) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Short URL", "Original URL", "Clicks", "Created"]);
    for link in links {
        table.add_row(vec![
            display_url(&link.short_code),
            link.original_url.clone(),
            link.click_count.to_string(),
            link.created_date.format("%b %-d, %Y").to_string(),
        ]);
    }
    table
}

/// Avatar initial plus name
pub fn identity_line(identity: Option<&UserIdentity>) -> String {
    match identity {
        Some(id) => format!("[{}] {}", id.initial(), id.display_name()),
        None => "[U] User".to_string(),
    }
}

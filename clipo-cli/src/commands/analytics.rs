//! Analytics command - clicks per day for one short link

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use clipo_core::domain::clicks::total_clicks;

use super::{get_context, require_login, resolve_range, AlreadyReported};
use crate::output;

pub fn run(code: &str, from: Option<String>, to: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    require_login(&ctx)?;
    let range = resolve_range(&ctx, from, to)?;
    let query = ctx.link_analytics(code, range)?;

    let spinner = output::spinner("Loading analytics...");
    let state = query.fetch();
    spinner.finish_and_clear();

    let Some(series) = state.into_data() else {
        return Err(AlreadyReported(format!("Analytics for '{}' could not be loaded", code)).into());
    };

    if json {
        let value = json!({ "shortCode": code, "range": range, "clicks": series });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{} {}  ({} to {})",
        "Analytics".bold(),
        ctx.link_service.display_url(code),
        range.start,
        range.end
    );
    println!("Total clicks: {}", total_clicks(&series));
    println!();
    output::print_click_chart(&series);
    Ok(())
}

//! Dashboard command - totals, click chart and link list

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::{get_context, require_login, resolve_range, AlreadyReported};
use crate::output;

pub fn run(from: Option<String>, to: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    require_login(&ctx)?;
    ctx.dashboard.set_range(resolve_range(&ctx, from, to)?);

    let spinner = output::spinner("Loading dashboard...");
    let view = ctx.dashboard.load();
    spinner.finish_and_clear();

    let (Some(links), Some(clicks)) = (view.links.data(), view.clicks.data()) else {
        return Err(AlreadyReported("Dashboard could not be loaded".to_string()).into());
    };
    let range = ctx.dashboard.range();
    let summary = view.summary().unwrap_or_default();

    if json {
        let value = json!({
            "range": range,
            "summary": summary,
            "clicks": clicks,
            "links": links,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!(
        "{}",
        output::identity_line(ctx.session.identity().as_ref()).bold()
    );
    println!();

    let mut totals = output::create_table();
    totals.add_row(vec!["Total links".to_string(), summary.total_links.to_string()]);
    totals.add_row(vec!["Total clicks".to_string(), summary.total_clicks.to_string()]);
    println!("{}", totals);
    println!();

    println!("{} {} to {}", "Clicks".bold(), range.start, range.end);
    output::print_click_chart(clicks);
    println!();

    if links.is_empty() {
        output::info("You haven't created any short link yet. Try `clipo shorten <url>`.");
        return Ok(());
    }
    println!("{}", "Your links".bold());
    println!(
        "{}",
        output::links_table(links, |code| ctx.link_service.display_url(code))
    );
    Ok(())
}

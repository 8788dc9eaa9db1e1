//! Shorten command - create a short link

use anyhow::Result;
use serde_json::json;

use clipo_core::services::LogEvent;

use super::{get_context, log_event, require_login};
use crate::output;

pub fn run(url: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    require_login(&ctx)?;

    let spinner = output::spinner("Creating short URL...");
    let created = ctx.link_service.shorten(url);
    spinner.finish_and_clear();
    let link = created?;
    log_event(LogEvent::new("link_created"));

    // The list is stale now
    let total = ctx.dashboard.links().refetch().data().map(|links| links.len());
    let share_url = ctx.link_service.share_url(&link.short_code);

    if json {
        let value = json!({ "link": link, "shareUrl": share_url, "totalLinks": total });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    output::success("Short URL Created Successfully");
    println!("{}", share_url);
    if let Some(total) = total {
        println!("You now have {} short links.", total);
    }
    Ok(())
}

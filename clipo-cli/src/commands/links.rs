//! Links command - list short links, newest first

use anyhow::Result;

use super::{get_context, require_login, AlreadyReported};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    require_login(&ctx)?;

    let spinner = output::spinner("Loading links...");
    let state = ctx.dashboard.links().fetch();
    spinner.finish_and_clear();

    let Some(links) = state.into_data() else {
        return Err(AlreadyReported("Links could not be loaded".to_string()).into());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&links)?);
        return Ok(());
    }

    if links.is_empty() {
        println!("No short links yet.");
        return Ok(());
    }
    println!(
        "{}",
        output::links_table(&links, |code| ctx.link_service.display_url(code))
    );
    Ok(())
}

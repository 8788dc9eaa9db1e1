//! Open command - follow a short link through the backend

use std::thread;

use anyhow::Result;

use clipo_core::services::redirect::{REDIRECT_DELAY, REDIRECT_MESSAGE};

use super::get_context;
use crate::output;

pub fn run(code: &str, resolve: bool) -> Result<()> {
    let ctx = get_context()?;
    let target = ctx.redirect_service.target(code)?;

    let spinner = output::spinner(REDIRECT_MESSAGE);
    thread::sleep(REDIRECT_DELAY);
    let destination = if resolve {
        Some(ctx.redirect_service.resolve(code))
    } else {
        None
    };
    spinner.finish_and_clear();

    match destination {
        Some(result) => println!("{}", result?),
        None => println!("{}", target),
    }
    Ok(())
}

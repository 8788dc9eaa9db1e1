//! About command

use anyhow::Result;
use colored::Colorize;

const FEATURES: &[(&str, &str)] = &[
    (
        "Simple URL Shortening",
        "Turn long links into short ones you can share anywhere.",
    ),
    (
        "Powerful Analytics",
        "See how many clicks each link gets, day by day.",
    ),
    (
        "Enhanced Security",
        "Every link is tied to your account and only you see its numbers.",
    ),
    (
        "Fast and Reliable",
        "Short links resolve straight through the Clipo backend.",
    ),
];

pub fn run() -> Result<()> {
    println!("{}", "About Clipo".bold());
    println!();
    println!("Clipo shortens URLs and tracks how they perform.");
    println!();
    for (title, text) in FEATURES {
        println!("  {}", title.cyan().bold());
        println!("    {}", text);
    }
    println!();
    println!("Get started with `clipo register` or `clipo login`.");
    Ok(())
}

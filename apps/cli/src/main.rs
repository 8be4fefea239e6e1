//! Stundenplan CLI: crawl a myStundenplan tenant into JSON-lines records.
//!
//! Logs in once, walks semesters, courses, classes and rooms, and writes one
//! record per fetched document.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

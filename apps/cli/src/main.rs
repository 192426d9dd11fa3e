//! textcrawl CLI: breadth-first crawl of a wiki into a plain-text corpus.
//!
//! Fetches article pages, keeps the useful paragraphs, and appends each new
//! one to a corpus file.

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

//! `roster-overlap` binary: thin CLI over the library.

mod cli;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.init_logging();
    cli.execute()
}

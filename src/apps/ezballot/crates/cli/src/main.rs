use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod script;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.run()
}

use clap::Parser;
use pmp_cache_aside::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Demo(args) => cli::demo::run(args).await,
        Command::Stats(args) => cli::stats::run(args).await,
        Command::Flush => cli::flush::run().await,
    }
}

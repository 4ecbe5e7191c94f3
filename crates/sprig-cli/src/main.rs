//! sprig - build recipes, staged sources

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sprig_cli::cmd::{self, Context};
use sprig_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut ctx = Context::load(!cli.no_checksum)?;

    match cli.command {
        Commands::List => cmd::list::list(&mut ctx),
        Commands::Info { package } => cmd::info::info(&mut ctx, &package),
        Commands::Providers { spec } => cmd::providers::providers(&mut ctx, &spec),
        Commands::Graph { title } => cmd::graph::graph(&mut ctx, &title),
        Commands::Fetch { specs } => cmd::stage::fetch(&mut ctx, &specs).await,
        Commands::Stage { specs } => cmd::stage::stage(&mut ctx, &specs).await,
        Commands::Restage { specs } => cmd::stage::restage(&mut ctx, &specs).await,
        Commands::Clean { specs } => cmd::clean::clean(&mut ctx, &specs).await,
        Commands::Purge => cmd::clean::purge(&ctx),
        Commands::Find { spec } => cmd::find::find(&mut ctx, spec.as_deref()),
        Commands::Mirrors => cmd::mirrors::mirrors(&ctx),
    }
}

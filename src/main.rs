use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flocking::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    run_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a fresh swarm checkpoint.
    Init {
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Process every pending snapshot.
    Run,

    Analyze,

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.run_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Init { seed } => mgr.init_swarm(seed)?,
        Command::Run => mgr.run_swarm()?,
        Command::Analyze => mgr.analyze_run()?,
        Command::Clean => mgr.clean_run()?,
    }

    Ok(())
}

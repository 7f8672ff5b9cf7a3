use crate::Result;
use crate::settings::Settings;
use crate::supervisor::Supervisor;
use clap::Parser;
use std::sync::Arc;

mod config;
mod kill_port;
mod serve;
mod targets;

#[derive(Debug, clap::Parser)]
#[clap(name = "promsync", version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    Config(config::Config),
    KillPort(kill_port::KillPort),
    Serve(serve::Serve),
    Targets(targets::Targets),
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Command::Config(config) => config.run().await,
        Command::KillPort(kill_port) => kill_port.run().await,
        Command::Serve(serve) => serve.run().await,
        Command::Targets(targets) => targets.run().await,
    }
}

fn supervisor(settings: Settings) -> Result<Arc<Supervisor>> {
    let registry = settings.registry()?;
    Ok(Supervisor::new(settings, registry))
}

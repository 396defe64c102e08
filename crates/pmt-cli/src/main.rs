use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Optimize(args) => commands::optimize::run(args),
        Commands::Detect(args) => commands::detect::run(args),
        Commands::Validate(args) => commands::validate::run(args),
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(1);
    }
}

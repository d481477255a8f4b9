use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

use merit_cli::cli::{Cli, Commands};

mod commands;

use commands::{dispatch, events, stack};

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let result = match &cli.command {
        Commands::Dispatch(args) => dispatch::handle(args),
        Commands::Events(args) => events::handle(args),
        Commands::Stack(args) => stack::handle(args),
    };

    if let Err(err) = result {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

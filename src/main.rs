use clap::Parser;
use optstore::cli::Cli;
use optstore::cli_handlers;
use std::process;

fn main() {
    // Logs go to stderr so stdout carries only command output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli_handlers::run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

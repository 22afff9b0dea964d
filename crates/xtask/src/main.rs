#![forbid(unsafe_code)]

mod error;
mod manifest_show;
mod smoke_test;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "xtask")]
#[command(about = "Operational tooling for the formatter bridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Spawn the host, run initialize + shutdown, and fail on any error
    /// notification observed along the way.
    SmokeTest(smoke_test::SmokeTestArgs),
    /// Print the binary manifest entry resolved for this platform.
    ManifestShow(manifest_show::ManifestShowArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::SmokeTest(args) => match smoke_test::run(args).await {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        Command::ManifestShow(args) => match manifest_show::run(args) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
    };

    std::process::exit(exit_code);
}

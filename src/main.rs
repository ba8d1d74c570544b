use anyhow::Result;
use clap::Parser;
use object_drive::{
    cli::Commands,
    config::{AppConfig, Cli, ClientConfig, Command},
    server,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let Cli {
        gateway,
        timeout_secs,
        command,
    } = Cli::parse();

    match command {
        Command::Serve(args) => {
            let cfg = AppConfig::from_env_and_args(&args)?;
            server::run(cfg, args.migrate).await
        }
        Command::Client(command) => {
            let cfg = ClientConfig::from_env_and_args(gateway, timeout_secs)?;
            Commands::new(&cfg)?.run(command).await
        }
    }
}

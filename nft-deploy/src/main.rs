use clap::Parser;
use nft_deploy::{cli::Cli, credentials::EnvCredentials, errors::DeployError};

#[tokio::main]
async fn main() -> Result<(), DeployError> {
    let Cli { command } = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .pretty()
        .init();

    let credentials = EnvCredentials::load();
    command.run(&credentials).await
}

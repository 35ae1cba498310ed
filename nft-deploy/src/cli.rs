//! Definitions of CLI arguments and commands for the deploy tool

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{deploy, list_networks, list_parameter_sets},
    constants::{
        CONFIG_PATH_ENV_VAR, DEFAULT_ARTIFACT_PATH, DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        DEFAULT_DEPLOYMENTS_PATH, DEFAULT_PARAMETER_SET, NUM_DEPLOY_CONFIRMATIONS,
        RECEIPT_POLL_INTERVAL,
    },
    credentials::CredentialSource,
    errors::DeployError,
    runner::RunOptions,
};

/// Deploy the NFT contract to an EVM network
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The commands of the deploy tool
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the NFT contract
    Deploy(DeployArgs),
    /// List the known network profiles
    Networks(ConfigArgs),
    /// List the known parameter sets
    Params(ConfigArgs),
}

impl Command {
    /// Run the command
    pub async fn run(self, credentials: &impl CredentialSource) -> Result<(), DeployError> {
        match self {
            Command::Deploy(args) => deploy(args, credentials).await,
            Command::Networks(args) => list_networks(args, credentials),
            Command::Params(args) => list_parameter_sets(args),
        }
    }
}

/// Where to find the deploy config
#[derive(Args)]
pub struct ConfigArgs {
    /// A JSON config file extending the built-in networks and parameter sets
    #[arg(short, long, env = CONFIG_PATH_ENV_VAR)]
    pub config: Option<PathBuf>,
}

/// Deploy the NFT contract with one parameter set to one network
#[derive(Args)]
pub struct DeployArgs {
    /// The network profile to deploy to
    #[arg(short, long)]
    pub network: String,

    /// The parameter set to pass to the constructor
    #[arg(short, long, default_value = DEFAULT_PARAMETER_SET)]
    pub params: String,

    /// Path to the compiled contract artifact (JSON, or `.bin` hex)
    #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
    pub artifact: PathBuf,

    /// Where to find the deploy config
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Path to the deployments ledger
    #[arg(short, long, default_value = DEFAULT_DEPLOYMENTS_PATH)]
    pub deployments_path: PathBuf,

    /// The number of confirmations to wait for
    #[arg(long, default_value_t = NUM_DEPLOY_CONFIRMATIONS)]
    pub confirmations: u64,

    /// Seconds to wait for confirmation before giving up
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Only simulate the creation; nothing is submitted
    #[arg(long)]
    pub dry_run: bool,

    /// Deploy even if the ledger already records this deployment
    #[arg(long)]
    pub force: bool,
}

impl DeployArgs {
    /// The run options selected by the arguments
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            confirmations: self.confirmations,
            timeout: Duration::from_secs(self.timeout_secs),
            poll_interval: RECEIPT_POLL_INTERVAL,
            dry_run_only: self.dry_run,
            force: self.force,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "nft-deploy",
            "deploy",
            "--network",
            "rinkeby",
            "--params",
            "mad-lads-testnet",
            "--dry-run",
        ])
        .unwrap();

        let Command::Deploy(args) = cli.command else {
            panic!("expected the deploy command");
        };
        assert_eq!(args.network, "rinkeby");
        assert_eq!(args.params, "mad-lads-testnet");
        assert_eq!(args.deployments_path.to_str(), Some("deployments.json"));

        let options = args.run_options();
        assert!(options.dry_run_only);
        assert!(!options.force);
        assert_eq!(options.confirmations, 1);
    }

    #[test]
    fn test_deploy_requires_network() {
        assert!(Cli::try_parse_from(["nft-deploy", "deploy"]).is_err());
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["nft-deploy", "deploy", "-n", "mainnet"]).unwrap();
        let Command::Deploy(args) = cli.command else {
            panic!("expected the deploy command");
        };
        assert_eq!(args.params, "dev");
        assert_eq!(args.artifact.to_str(), Some("artifacts/NFT.json"));
        assert_eq!(args.timeout_secs, 600);
    }
}

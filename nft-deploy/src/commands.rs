//! Implementations of the deploy tool's commands

use std::future::{self, Future};

use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{
    artifact::ContractArtifact,
    cli::{ConfigArgs, DeployArgs},
    config::DeployConfig,
    credentials::CredentialSource,
    errors::DeployError,
    ledger::LedgerFile,
    provider::HttpConnector,
    runner::{DeployRequest, Deployer, DeploymentOutcome},
};

/// Deploy the NFT contract and print the result
pub async fn deploy(
    args: DeployArgs,
    credentials: &impl CredentialSource,
) -> Result<(), DeployError> {
    let interrupt = interrupt();
    let config = DeployConfig::load(args.config.config.as_deref())?;
    let artifact = ContractArtifact::load(&args.artifact)?;
    if let Some(name) = &artifact.contract_name {
        info!("loaded artifact `{name}` from {}", args.artifact.display());
    }

    let ledger = LedgerFile::new(&args.deployments_path);
    let request = DeployRequest::new(&args.network)
        .with_parameter_set(&args.params)
        .with_options(args.run_options());

    let connector = HttpConnector;
    let deployer = Deployer::new(&config, credentials, &connector).with_ledger(&ledger);

    match deployer.run(&request, &artifact, interrupt).await? {
        DeploymentOutcome::Deployed(result) => {
            println!("{result}");
        }
        DeploymentOutcome::Simulated {
            network,
            gas_estimate,
            predicted_address,
        } => {
            println!(
                "Dry run on {network}: estimated gas {gas_estimate}, would deploy at {predicted_address:#x}"
            );
        }
    }

    Ok(())
}

/// Print the network profiles and whether their credentials are available
pub fn list_networks(
    args: ConfigArgs,
    credentials: &impl CredentialSource,
) -> Result<(), DeployError> {
    let config = DeployConfig::load(args.config.as_deref())?;

    for (name, profile) in &config.networks {
        let signing_key = availability(credentials, Some(&profile.signing_key_source));
        let verification_key = availability(credentials, profile.verification_key_source.as_ref());
        println!("{name}");
        println!("\tchain id: {}", profile.network_id);
        println!("\trpc url: {}", profile.rpc_url);
        println!("\tgas price: {} wei", profile.gas_price_wei);
        println!("\tdry run: {}", !profile.skip_dry_run);
        println!(
            "\tsigning key ({}): {signing_key}",
            profile.signing_key_source
        );
        println!("\tverification key: {verification_key}");
    }

    Ok(())
}

/// Print the parameter sets
pub fn list_parameter_sets(args: ConfigArgs) -> Result<(), DeployError> {
    let config = DeployConfig::load(args.config.as_deref())?;

    for (key, params) in &config.parameter_sets {
        println!("{key}");
        println!("\tname: {}", params.name);
        println!("\tsymbol: {}", params.symbol);
        println!("\tunit cost: {} wei", params.unit_cost_wei);
        println!("\tmax supply: {}", params.max_supply);
    }

    Ok(())
}

/// Describe whether a named credential is set, without revealing it
fn availability(credentials: &impl CredentialSource, name: Option<&String>) -> &'static str {
    match name {
        Some(name) if credentials.lookup(name).is_some() => "set",
        Some(_) => "missing",
        None => "not used",
    }
}

/// Resolves once the operator presses Ctrl-C.
///
/// The handler is installed right away, so a Ctrl-C that arrives while the
/// creation is being broadcast is held until the runner next checks for it
/// instead of killing the process.
fn interrupt() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => warn!("could not listen for Ctrl-C: {e}"),
        }
    });

    async move {
        if rx.await.is_err() {
            // Without a signal handler the run can only end on its own
            future::pending::<()>().await;
        }
    }
}

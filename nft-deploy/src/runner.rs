//! The deploy runner: drives a single contract creation to completion.
//!
//! A run resolves a network profile and a parameter set, connects a signing
//! provider, signs exactly one creation transaction pinned to the deployer's
//! next nonce, records it as pending, broadcasts it and waits for it to
//! confirm. Nothing is ever resubmitted: an error or an interrupt once the
//! record is written leaves the run failed and the pending ledger record in
//! place for the operator to inspect.

use std::{
    fmt::{self, Display, Formatter},
    future::Future,
    str::FromStr,
    time::Duration,
};

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, B256};
use tracing::{info, warn};

use crate::{
    artifact::ContractArtifact,
    config::{DeployConfig, NetworkProfile, ParameterSet},
    constants::{
        DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_PARAMETER_SET, NUM_DEPLOY_CONFIRMATIONS,
        RECEIPT_POLL_INTERVAL,
    },
    credentials::{resolve_template, CredentialSource},
    errors::DeployError,
    ledger::{DeploymentRecord, LedgerFile, RecordStatus},
    provider::{
        CreationReceipt, CreationTransaction, DeploymentProvider, ProviderConnector,
        ResolvedNetwork, SignedCreation,
    },
};

// ---------
// | Types |
// ---------

/// What to deploy and where
#[derive(Clone, Debug)]
pub struct DeployRequest {
    /// The name of the network profile
    pub network: String,
    /// The key of the parameter set
    pub parameter_set: String,
    /// How the run behaves
    pub options: RunOptions,
}

impl DeployRequest {
    /// A request with the default parameter set and options
    pub fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            parameter_set: DEFAULT_PARAMETER_SET.to_string(),
            options: RunOptions::default(),
        }
    }

    /// Select a parameter set
    pub fn with_parameter_set(mut self, key: &str) -> Self {
        self.parameter_set = key.to_string();
        self
    }

    /// Replace the run options
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }
}

/// Knobs of a deployment run
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// The number of confirmations to wait for
    pub confirmations: u64,
    /// How long to wait for confirmation before giving up
    pub timeout: Duration,
    /// How often to poll for the receipt
    pub poll_interval: Duration,
    /// Simulate the creation and stop before submitting
    pub dry_run_only: bool,
    /// Deploy even if the ledger already holds a deployment
    pub force: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            confirmations: NUM_DEPLOY_CONFIRMATIONS,
            timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            poll_interval: RECEIPT_POLL_INTERVAL,
            dry_run_only: false,
            force: false,
        }
    }
}

/// The outcome of a successful deployment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentResult {
    /// The address of the deployed contract
    pub contract_address: Address,
    /// The network deployed to
    pub network: String,
    /// The parameter set deployed
    pub parameter_set: String,
    /// The creation transaction hash
    pub tx_hash: B256,
    /// The deployer address
    pub deployer: Address,
    /// The block the creation was included in
    pub block_number: Option<u64>,
    /// The gas used by the creation
    pub gas_used: u64,
}

impl Display for DeploymentResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Deployed {:#x} on {} (parameter set `{}`, tx {:#x})",
            self.contract_address, self.network, self.parameter_set, self.tx_hash
        )
    }
}

/// What a run produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// The contract was deployed
    Deployed(DeploymentResult),
    /// The creation was only simulated
    Simulated {
        /// The network simulated against
        network: String,
        /// The estimated gas of the creation
        gas_estimate: u64,
        /// The address the contract would be deployed at
        predicted_address: Address,
    },
}

/// How far a run got before the broadcast
enum Preparation<T> {
    /// The run stopped after the simulation
    Simulated(DeploymentOutcome),
    /// The creation is signed and ready to broadcast
    Signed {
        /// The provider the creation was prepared with
        provider: T,
        /// The signed creation
        signed: SignedCreation,
        /// The pending record to persist before broadcasting
        record: DeploymentRecord,
    },
}

/// The lifecycle of a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    /// Nothing has been sent to the network
    NotStarted,
    /// The creation transaction has been broadcast
    Submitted {
        /// The creation transaction hash
        tx_hash: B256,
    },
    /// The creation has been confirmed
    Confirmed {
        /// The deployed contract address
        contract_address: Address,
    },
    /// The run failed; terminal
    Failed,
}

impl DeploymentState {
    /// Whether the state machine may move from `self` to `next`
    pub fn can_advance_to(&self, next: &DeploymentState) -> bool {
        use DeploymentState::*;
        matches!(
            (self, next),
            (NotStarted, Submitted { .. })
                | (NotStarted, Failed)
                | (Submitted { .. }, Confirmed { .. })
                | (Submitted { .. }, Failed)
        )
    }

    /// Whether the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentState::Confirmed { .. } | DeploymentState::Failed
        )
    }
}

impl Display for DeploymentState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentState::NotStarted => write!(f, "not started"),
            DeploymentState::Submitted { tx_hash } => write!(f, "submitted ({tx_hash:#x})"),
            DeploymentState::Confirmed { contract_address } => {
                write!(f, "confirmed ({contract_address:#x})")
            }
            DeploymentState::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks the state of a run and logs its transitions
#[derive(Debug)]
struct StateTracker {
    /// The current state
    state: DeploymentState,
}

impl StateTracker {
    /// A tracker in the initial state
    fn new() -> Self {
        Self {
            state: DeploymentState::NotStarted,
        }
    }

    /// Move to the next state
    fn advance(&mut self, next: DeploymentState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {} -> {next}",
            self.state
        );
        info!("deployment {} -> {next}", self.state);
        self.state = next;
    }

    /// Move to `Failed` and pass the error through
    fn fail(&mut self, err: DeployError) -> DeployError {
        if !self.state.is_terminal() {
            self.advance(DeploymentState::Failed);
        }
        err
    }
}

// ----------
// | Runner |
// ----------

/// Runs deployments against a config, a credential source and a connector
pub struct Deployer<'a, C, P> {
    /// The profiles and parameter sets
    config: &'a DeployConfig,
    /// Where credentials are looked up
    credentials: &'a C,
    /// Builds the provider for the selected network
    connector: &'a P,
    /// The deployments ledger, if one is kept
    ledger: Option<&'a LedgerFile>,
}

impl<'a, C: CredentialSource, P: ProviderConnector> Deployer<'a, C, P> {
    /// Construct a runner
    pub fn new(config: &'a DeployConfig, credentials: &'a C, connector: &'a P) -> Self {
        Self {
            config,
            credentials,
            connector,
            ledger: None,
        }
    }

    /// Record deployments in the given ledger and refuse duplicates
    pub fn with_ledger(mut self, ledger: &'a LedgerFile) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Deploy the artifact as described by `request`.
    ///
    /// `interrupt` is raced against the preparation and the confirmation wait;
    /// if it resolves first the run fails with [`DeployError::Interrupted`].
    /// The broadcast itself is never cut short.
    pub async fn run(
        &self,
        request: &DeployRequest,
        artifact: &ContractArtifact,
        interrupt: impl Future<Output = ()>,
    ) -> Result<DeploymentOutcome, DeployError> {
        let ctx = format!(
            "network `{}`, parameter set `{}`",
            request.network, request.parameter_set
        );

        self.run_inner(request, artifact, interrupt)
            .await
            .map_err(|e| e.context(ctx))
    }

    /// The body of [`Deployer::run`], without error context
    async fn run_inner(
        &self,
        request: &DeployRequest,
        artifact: &ContractArtifact,
        interrupt: impl Future<Output = ()>,
    ) -> Result<DeploymentOutcome, DeployError> {
        let mut state = StateTracker::new();
        tokio::pin!(interrupt);

        let preparation = tokio::select! {
            biased;
            _ = &mut interrupt => {
                return Err(state.fail(DeployError::Interrupted(
                    "stopped before the creation transaction was broadcast".to_string(),
                )));
            },
            preparation = self.prepare(request, artifact) => {
                preparation.map_err(|e| state.fail(e))?
            },
        };
        let (provider, signed, mut record) = match preparation {
            Preparation::Simulated(outcome) => return Ok(outcome),
            Preparation::Signed {
                provider,
                signed,
                record,
            } => (provider, signed, record),
        };
        let tx_hash = signed.tx_hash;

        // The pending record has to exist before the transaction can reach the node
        self.persist_record(request, &record).map_err(|e| state.fail(e))?;

        info!("Deploying contract...");
        provider.broadcast(&signed).await.map_err(|e| {
            state.fail(e.context(format!(
                "creation transaction {tx_hash:#x} may have reached the node and was not \
                 resubmitted"
            )))
        })?;
        state.advance(DeploymentState::Submitted { tx_hash });

        let receipt = tokio::select! {
            receipt = self.await_receipt(&provider, tx_hash, &request.options) => {
                receipt.map_err(|e| state.fail(e))?
            },
            _ = &mut interrupt => {
                return Err(state.fail(DeployError::Interrupted(format!(
                    "stopped waiting for creation transaction {tx_hash:#x}; it was not \
                     resubmitted, inspect it before deploying again"
                ))));
            },
        };

        record.block_number = receipt.block_number;
        if !receipt.success {
            record.status = RecordStatus::Reverted;
            self.write_record(request, &record);
            return Err(state.fail(DeployError::TransactionRejected(format!(
                "creation transaction {tx_hash:#x} reverted"
            ))));
        }

        let predicted_address = record.predicted_address;
        let contract_address = receipt.contract_address.unwrap_or(predicted_address);
        if contract_address != predicted_address {
            warn!(
                "contract deployed at {contract_address:#x}, expected {predicted_address:#x}"
            );
        }
        state.advance(DeploymentState::Confirmed { contract_address });
        info!(
            gas_used = receipt.gas_used,
            block_number = receipt.block_number,
            "creation confirmed"
        );

        record.status = RecordStatus::Confirmed;
        record.contract_address = Some(contract_address);
        self.write_record(request, &record);

        Ok(DeploymentOutcome::Deployed(DeploymentResult {
            contract_address,
            network: request.network.clone(),
            parameter_set: request.parameter_set.clone(),
            tx_hash,
            deployer: record.deployer,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }))
    }

    /// Everything up to the broadcast: resolve, connect, simulate and sign
    async fn prepare(
        &self,
        request: &DeployRequest,
        artifact: &ContractArtifact,
    ) -> Result<Preparation<P::Provider>, DeployError> {
        let options = &request.options;
        let profile = self.config.network(&request.network)?;
        let params = self.config.parameter_set(&request.parameter_set)?;
        let args = params.constructor_args()?;

        if !options.dry_run_only {
            self.check_ledger(request)?;
        }

        if !artifact.matches_compiler(&self.config.compiler.solc) {
            warn!(
                "artifact was compiled with solc {}, expected {}",
                artifact.compiler_version.as_deref().unwrap_or("unknown"),
                self.config.compiler.solc
            );
        }

        let network = self.resolve_network(&request.network, profile)?;
        info!("Deploying on {}...", request.network);
        log_parameters(params);

        let provider = self.connector.connect(&network).await?;

        let chain_id = provider.chain_id().await?;
        if chain_id != profile.network_id {
            return Err(DeployError::Configuration(format!(
                "endpoint reports chain id {chain_id}, profile expects {}",
                profile.network_id
            )));
        }

        let deployer = provider.deployer();
        let nonce = provider.nonce().await?;
        let predicted_address = deployer.create(nonce);
        info!("deployer {deployer:#x}, nonce {nonce}, expected address {predicted_address:#x}");

        let tx = CreationTransaction {
            init_code: artifact.init_code(&args.abi_encode()),
            gas_price_wei: u128::from(profile.gas_price_wei),
            nonce,
            chain_id,
        };

        if options.dry_run_only || !profile.skip_dry_run {
            let gas_estimate = provider.simulate(&tx).await?;
            info!("dry run succeeded, estimated gas {gas_estimate}");

            if options.dry_run_only {
                return Ok(Preparation::Simulated(DeploymentOutcome::Simulated {
                    network: request.network.clone(),
                    gas_estimate,
                    predicted_address,
                }));
            }
        } else {
            info!("skipping dry run on `{}`", request.network);
        }

        let signed = provider.sign(&tx).await?;
        let record = DeploymentRecord {
            status: RecordStatus::Pending,
            tx_hash: signed.tx_hash,
            nonce,
            deployer,
            predicted_address,
            contract_address: None,
            block_number: None,
        };

        Ok(Preparation::Signed {
            provider,
            signed,
            record,
        })
    }

    /// Refuse to deploy over an existing ledger record unless forced
    fn check_ledger(&self, request: &DeployRequest) -> Result<(), DeployError> {
        let Some(ledger) = self.ledger else {
            return Ok(());
        };
        let Some(existing) = ledger.lookup(&request.network, &request.parameter_set)? else {
            return Ok(());
        };
        if !existing.status.blocks_redeploy() {
            return Ok(());
        }

        if request.options.force {
            warn!(
                "forcing deployment over {} record (tx {:#x})",
                existing.status, existing.tx_hash
            );
            return Ok(());
        }

        Err(DeployError::Configuration(format!(
            "{} already records a {} deployment (tx {:#x}); pass --force to deploy again",
            ledger.path().display(),
            existing.status,
            existing.tx_hash
        )))
    }

    /// Write a record to the ledger, if one is kept
    fn persist_record(
        &self,
        request: &DeployRequest,
        record: &DeploymentRecord,
    ) -> Result<(), DeployError> {
        match self.ledger {
            Some(ledger) => {
                ledger.record(&request.network, &request.parameter_set, record.clone())
            }
            None => Ok(()),
        }
    }

    /// Update the ledger once the transaction is in flight.
    ///
    /// A failure here is reported rather than aborting the wait.
    fn write_record(&self, request: &DeployRequest, record: &DeploymentRecord) {
        if let Err(e) = self.persist_record(request, record) {
            warn!(
                "could not record {} deployment (tx {:#x}): {e}",
                record.status, record.tx_hash
            );
        }
    }

    /// Resolve the signer and endpoint of a profile from credentials
    fn resolve_network(
        &self,
        name: &str,
        profile: &NetworkProfile,
    ) -> Result<ResolvedNetwork, DeployError> {
        let key = self
            .credentials
            .lookup(&profile.signing_key_source)
            .ok_or_else(|| {
                DeployError::Configuration(format!(
                    "missing signing key `{}`",
                    profile.signing_key_source
                ))
            })?;
        // The parse error may echo the key, so it is dropped
        let signer = PrivateKeySigner::from_str(key.expose()).map_err(|_| {
            DeployError::Configuration(format!(
                "signing key `{}` is not a valid private key",
                profile.signing_key_source
            ))
        })?;

        let rpc_url = resolve_template(&profile.rpc_url, self.credentials)?;

        Ok(ResolvedNetwork {
            name: name.to_string(),
            profile: profile.clone(),
            rpc_url,
            signer,
        })
    }

    /// Wait for the receipt, giving up after the configured timeout
    async fn await_receipt(
        &self,
        provider: &P::Provider,
        tx_hash: B256,
        options: &RunOptions,
    ) -> Result<CreationReceipt, DeployError> {
        tokio::time::timeout(options.timeout, self.poll_receipt(provider, tx_hash, options))
            .await
            .map_err(|_| {
                DeployError::Provider(format!(
                    "timed out after {}s waiting for creation transaction {tx_hash:#x}; it was \
                     not resubmitted",
                    options.timeout.as_secs()
                ))
            })?
    }

    /// Poll for the receipt until it has the requested confirmations
    async fn poll_receipt(
        &self,
        provider: &P::Provider,
        tx_hash: B256,
        options: &RunOptions,
    ) -> Result<CreationReceipt, DeployError> {
        loop {
            if let Some(receipt) = provider.receipt(tx_hash).await? {
                if !receipt.success || options.confirmations <= 1 {
                    return Ok(receipt);
                }

                if let Some(included) = receipt.block_number {
                    let latest = provider.block_number().await?;
                    if latest.saturating_sub(included) + 1 >= options.confirmations {
                        return Ok(receipt);
                    }
                }
            }

            tokio::time::sleep(options.poll_interval).await;
        }
    }
}

/// Log the constructor arguments of a run
fn log_parameters(params: &ParameterSet) {
    info!(
        name = %params.name,
        symbol = %params.symbol,
        unit_cost_wei = %params.unit_cost_wei,
        max_supply = params.max_supply,
        "constructor arguments"
    );
}

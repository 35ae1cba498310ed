//! The seam between the deploy runner and the network.
//!
//! The runner only needs a handful of RPC capabilities, captured by
//! [`DeploymentProvider`]. [`HttpConnector`] builds the alloy-backed
//! implementation from a resolved network profile.

use alloy::{
    eips::Encodable2718,
    network::{EthereumWallet, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{http::reqwest::Url, RpcError, TransportError},
};
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use tracing::debug;

use crate::{config::NetworkProfile, credentials::ResolvedTemplate, errors::DeployError};

/// A contract-creation transaction, fully determined before submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreationTransaction {
    /// Creation bytecode followed by the encoded constructor arguments
    pub init_code: Bytes,
    /// The gas price to pay, in wei
    pub gas_price_wei: u128,
    /// The deployer nonce the transaction is pinned to
    pub nonce: u64,
    /// The chain id the transaction is signed for
    pub chain_id: u64,
}

/// A creation transaction signed locally, not yet broadcast
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedCreation {
    /// The hash the transaction will have on chain
    pub tx_hash: B256,
    /// The EIP-2718 encoded signed transaction
    pub raw: Bytes,
}

/// The parts of a transaction receipt the runner inspects
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreationReceipt {
    /// The transaction hash
    pub tx_hash: B256,
    /// Whether the transaction executed successfully
    pub success: bool,
    /// The address of the created contract, if any
    pub contract_address: Option<Address>,
    /// The block the transaction was included in
    pub block_number: Option<u64>,
    /// The gas used by the transaction
    pub gas_used: u64,
}

impl From<TransactionReceipt> for CreationReceipt {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            tx_hash: receipt.transaction_hash,
            success: receipt.status(),
            contract_address: receipt.contract_address,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }
    }
}

/// The RPC capabilities a deployment needs
#[async_trait]
pub trait DeploymentProvider: Send + Sync {
    /// The address transactions are signed by
    fn deployer(&self) -> Address;

    /// The chain id reported by the endpoint
    async fn chain_id(&self) -> Result<u64, DeployError>;

    /// The next nonce of the deployer, including pending transactions
    async fn nonce(&self) -> Result<u64, DeployError>;

    /// The latest block number
    async fn block_number(&self) -> Result<u64, DeployError>;

    /// Simulate the creation, returning the estimated gas
    async fn simulate(&self, tx: &CreationTransaction) -> Result<u64, DeployError>;

    /// Sign the creation locally; the transaction is not broadcast
    async fn sign(&self, tx: &CreationTransaction) -> Result<SignedCreation, DeployError>;

    /// Broadcast a signed creation
    async fn broadcast(&self, signed: &SignedCreation) -> Result<(), DeployError>;

    /// Fetch the receipt of a transaction, if it has been included
    async fn receipt(&self, tx_hash: B256) -> Result<Option<CreationReceipt>, DeployError>;
}

/// A network profile with its credentials resolved
#[derive(Clone, Debug)]
pub struct ResolvedNetwork {
    /// The network name
    pub name: String,
    /// The network profile
    pub profile: NetworkProfile,
    /// The RPC endpoint, which may embed credentials
    pub rpc_url: ResolvedTemplate,
    /// The deployer's signer
    pub signer: PrivateKeySigner,
}

/// Builds a [`DeploymentProvider`] for a resolved network
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    /// The provider type produced
    type Provider: DeploymentProvider;

    /// Connect to the network
    async fn connect(&self, network: &ResolvedNetwork) -> Result<Self::Provider, DeployError>;
}

/// Connects to the network over HTTP with a local private key wallet
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpConnector;

#[async_trait]
impl ProviderConnector for HttpConnector {
    type Provider = AlloyDeploymentProvider;

    async fn connect(&self, network: &ResolvedNetwork) -> Result<Self::Provider, DeployError> {
        // The URL may embed an API key, so the parse error is not echoed
        let url = Url::parse(network.rpc_url.value.expose()).map_err(|_| {
            DeployError::Configuration(format!("invalid RPC URL `{}`", network.profile.rpc_url))
        })?;

        let provider = ProviderBuilder::new()
            .wallet(network.signer.clone())
            .connect_http(url)
            .erased();
        debug!("connected to `{}`", network.name);

        Ok(AlloyDeploymentProvider {
            provider,
            wallet: EthereumWallet::from(network.signer.clone()),
            deployer: network.signer.address(),
            rpc_url: network.rpc_url.clone(),
        })
    }
}

/// A [`DeploymentProvider`] backed by an alloy HTTP provider
pub struct AlloyDeploymentProvider {
    /// The signing provider
    provider: DynProvider,
    /// Signs creations locally, so their hash is known before broadcast
    wallet: EthereumWallet,
    /// The address of the signer
    deployer: Address,
    /// The endpoint, kept to scrub it from error messages
    rpc_url: ResolvedTemplate,
}

impl AlloyDeploymentProvider {
    /// Build the transaction request for a creation
    fn request(&self, tx: &CreationTransaction) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.deployer)
            .with_deploy_code(tx.init_code.clone())
            .with_gas_price(tx.gas_price_wei)
            .with_nonce(tx.nonce)
            .with_chain_id(tx.chain_id)
    }

    /// Classify an RPC error, scrubbing credentials from its message
    fn rpc_error(&self, context: &str, call: RpcCall, err: TransportError) -> DeployError {
        match classify_rpc_error(context, call, err) {
            DeployError::Provider(msg) => DeployError::Provider(self.rpc_url.redact_in(&msg)),
            DeployError::TransactionRejected(msg) => {
                DeployError::TransactionRejected(self.rpc_url.redact_in(&msg))
            }
            other => other,
        }
    }
}

#[async_trait]
impl DeploymentProvider for AlloyDeploymentProvider {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64, DeployError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| self.rpc_error("error fetching chain id", RpcCall::Read, e))
    }

    async fn nonce(&self) -> Result<u64, DeployError> {
        self.provider
            .get_transaction_count(self.deployer)
            .pending()
            .await
            .map_err(|e| self.rpc_error("error fetching nonce", RpcCall::Read, e))
    }

    async fn block_number(&self) -> Result<u64, DeployError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| self.rpc_error("error fetching block number", RpcCall::Read, e))
    }

    async fn simulate(&self, tx: &CreationTransaction) -> Result<u64, DeployError> {
        self.provider
            .estimate_gas(self.request(tx))
            .await
            .map_err(|e| {
                self.rpc_error("error simulating contract creation", RpcCall::Transaction, e)
            })
    }

    async fn sign(&self, tx: &CreationTransaction) -> Result<SignedCreation, DeployError> {
        let gas_limit = self
            .provider
            .estimate_gas(self.request(tx))
            .await
            .map_err(|e| {
                self.rpc_error("error estimating creation gas", RpcCall::Transaction, e)
            })?;

        let envelope = self
            .request(tx)
            .with_gas_limit(gas_limit)
            .build(&self.wallet)
            .await
            .map_err(|e| DeployError::Provider(format!("error signing contract creation: {e}")))?;

        Ok(SignedCreation {
            tx_hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }

    async fn broadcast(&self, signed: &SignedCreation) -> Result<(), DeployError> {
        self.provider
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(|e| {
                self.rpc_error("error broadcasting contract creation", RpcCall::Transaction, e)
            })?;

        Ok(())
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<CreationReceipt>, DeployError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.rpc_error("error fetching receipt", RpcCall::Read, e))?;

        Ok(receipt.map(CreationReceipt::from))
    }
}

/// What an RPC call was doing when it failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcCall {
    /// Reading chain state: chain id, nonce, blocks, receipts
    Read,
    /// Estimating or broadcasting the creation transaction
    Transaction,
}

/// Map an RPC error onto the deploy error taxonomy.
///
/// An error response to a call carrying the creation (insufficient funds, a
/// constructor revert, an underpriced transaction) is a rejection of the
/// transaction. Everything else is a failure to talk to the node, including
/// error responses to reads such as rate limits.
pub fn classify_rpc_error(context: &str, call: RpcCall, err: TransportError) -> DeployError {
    match (call, err) {
        (RpcCall::Transaction, RpcError::ErrorResp(payload)) => {
            DeployError::TransactionRejected(format!("{context}: {payload}"))
        }
        (_, other) => DeployError::Provider(format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy::{
        rpc::json_rpc::ErrorPayload,
        signers::local::PrivateKeySigner,
        transports::{RpcError, TransportErrorKind},
    };

    use crate::{
        config::DeployConfig,
        credentials::{resolve_template, StaticCredentials},
        errors::DeployError,
        mock::TEST_PRIVATE_KEY,
    };

    use super::{classify_rpc_error, HttpConnector, ProviderConnector, ResolvedNetwork, RpcCall};

    /// An error response with the given code and message
    fn error_response(code: i64, message: &str) -> RpcError<TransportErrorKind> {
        RpcError::ErrorResp(ErrorPayload {
            code,
            message: message.to_string().into(),
            data: None,
        })
    }

    #[test]
    fn test_error_response_is_rejection() {
        let err = classify_rpc_error(
            "submitting",
            RpcCall::Transaction,
            error_response(-32000, "insufficient funds for gas * price + value"),
        );

        assert!(matches!(err, DeployError::TransactionRejected(_)));
        assert!(err.message().contains("insufficient funds"));
    }

    #[test]
    fn test_error_response_to_read_is_provider_error() {
        let err = classify_rpc_error(
            "error fetching chain id",
            RpcCall::Read,
            error_response(-32005, "daily request count exceeded"),
        );

        assert!(matches!(err, DeployError::Provider(_)));
        assert!(err.message().contains("daily request count exceeded"));
    }

    #[test]
    fn test_transport_failure_is_provider_error() {
        let err = classify_rpc_error(
            "fetching chain id",
            RpcCall::Transaction,
            TransportErrorKind::custom_str("connection refused"),
        );

        assert!(matches!(err, DeployError::Provider(_)));
        assert!(err.message().starts_with("fetching chain id"));
    }

    #[tokio::test]
    async fn test_rpc_errors_do_not_leak_the_api_id() -> eyre::Result<()> {
        let config = DeployConfig::builtin();
        let profile = config.network("rinkeby")?.clone();
        let creds = StaticCredentials::default().with("INFURA_ID", "s3cr3t-project-id");
        let network = ResolvedNetwork {
            name: "rinkeby".to_string(),
            rpc_url: resolve_template(&profile.rpc_url, &creds)?,
            profile,
            signer: PrivateKeySigner::from_str(TEST_PRIVATE_KEY)?,
        };
        let provider = HttpConnector.connect(&network).await?;

        let transport = TransportErrorKind::custom_str(
            "error sending request for url (https://rinkeby.infura.io/v3/s3cr3t-project-id)",
        );
        let err = provider.rpc_error("error fetching nonce", RpcCall::Read, transport);
        assert!(matches!(err, DeployError::Provider(_)));
        assert!(!err.to_string().contains("s3cr3t-project-id"));
        assert!(err.message().contains("<redacted>"));

        let response = error_response(-32000, "invalid project id s3cr3t-project-id");
        let err = provider.rpc_error("error broadcasting", RpcCall::Transaction, response);
        assert!(matches!(err, DeployError::TransactionRejected(_)));
        assert!(!err.to_string().contains("s3cr3t-project-id"));
        Ok(())
    }
}

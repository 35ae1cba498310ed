//! A simulated network for exercising the runner without an RPC endpoint

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use alloy_primitives::{address, keccak256, Address, B256};
use async_trait::async_trait;

use crate::{
    errors::DeployError,
    provider::{
        CreationReceipt, CreationTransaction, DeploymentProvider, ProviderConnector,
        ResolvedNetwork, SignedCreation,
    },
};

/// The first default anvil account
pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// The address of [`TEST_PRIVATE_KEY`]
pub const TEST_DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// The nonce of the simulated deployer before any broadcast
pub const MOCK_NONCE: u64 = 0;

/// The address the first creation of [`TEST_DEPLOYER`] lands at
pub const MOCK_CONTRACT_ADDRESS: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

/// Stand-in creation bytecode
pub const MOCK_BYTECODE: &str = "0x6080604052348015600f57600080fd5b50";

/// The block the simulated chain starts at
const START_BLOCK: u64 = 100;

/// How the simulated network treats the creation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockMode {
    /// Include and succeed on the first receipt poll
    Confirm,
    /// Include but revert
    Revert,
    /// Refuse the transaction at broadcast
    RejectOnBroadcast,
    /// Accept the broadcast but fail to answer it
    LoseBroadcastResponse,
    /// Revert the simulation
    RejectOnSimulate,
    /// Never include the transaction
    NeverConfirm,
}

/// State shared between the connector and the providers it creates
#[derive(Debug)]
pub struct MockState {
    /// The behavior of the network
    mode: MockMode,
    /// The chain id the network reports
    chain_id: u64,
    /// Creations signed so far, by hash
    signed: Mutex<HashMap<B256, CreationTransaction>>,
    /// Every creation that reached the node
    submitted: Mutex<Vec<CreationTransaction>>,
    /// The number of simulations run
    pub simulations: AtomicUsize,
    /// The number of block number queries
    pub block_polls: AtomicUsize,
    /// The current block height
    block: AtomicU64,
}

impl MockState {
    /// The creations that reached the node so far
    pub fn submissions(&self) -> Vec<CreationTransaction> {
        self.submitted.lock().unwrap().clone()
    }
}

/// A connector handing out providers over a shared [`MockState`]
pub struct MockConnector {
    /// The shared network state
    pub state: Arc<MockState>,
    /// The number of connections made
    pub connects: AtomicUsize,
}

impl MockConnector {
    /// A simulated network reporting `chain_id`
    pub fn new(chain_id: u64, mode: MockMode) -> Self {
        Self {
            state: Arc::new(MockState {
                mode,
                chain_id,
                signed: Mutex::new(HashMap::new()),
                submitted: Mutex::new(Vec::new()),
                simulations: AtomicUsize::new(0),
                block_polls: AtomicUsize::new(0),
                block: AtomicU64::new(START_BLOCK),
            }),
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProviderConnector for MockConnector {
    type Provider = MockProvider;

    async fn connect(&self, network: &ResolvedNetwork) -> Result<MockProvider, DeployError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockProvider {
            state: self.state.clone(),
            deployer: network.signer.address(),
        })
    }
}

/// A provider backed by [`MockState`]
pub struct MockProvider {
    /// The shared network state
    state: Arc<MockState>,
    /// The signer's address
    deployer: Address,
}

#[async_trait]
impl DeploymentProvider for MockProvider {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn chain_id(&self) -> Result<u64, DeployError> {
        Ok(self.state.chain_id)
    }

    async fn nonce(&self) -> Result<u64, DeployError> {
        Ok(MOCK_NONCE + self.state.submitted.lock().unwrap().len() as u64)
    }

    async fn block_number(&self) -> Result<u64, DeployError> {
        self.state.block_polls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.block.fetch_add(1, Ordering::SeqCst))
    }

    async fn simulate(&self, _tx: &CreationTransaction) -> Result<u64, DeployError> {
        self.state.simulations.fetch_add(1, Ordering::SeqCst);
        match self.state.mode {
            MockMode::RejectOnSimulate => Err(DeployError::TransactionRejected(
                "execution reverted".to_string(),
            )),
            _ => Ok(1_500_000),
        }
    }

    async fn sign(&self, tx: &CreationTransaction) -> Result<SignedCreation, DeployError> {
        let tx_hash = keccak256(tx.nonce.to_be_bytes());
        self.state.signed.lock().unwrap().insert(tx_hash, tx.clone());
        Ok(SignedCreation {
            tx_hash,
            raw: tx.init_code.clone(),
        })
    }

    async fn broadcast(&self, signed: &SignedCreation) -> Result<(), DeployError> {
        if self.state.mode == MockMode::RejectOnBroadcast {
            return Err(DeployError::TransactionRejected(
                "insufficient funds for gas * price + value".to_string(),
            ));
        }

        let tx = self.state.signed.lock().unwrap()[&signed.tx_hash].clone();
        self.state.submitted.lock().unwrap().push(tx);

        if self.state.mode == MockMode::LoseBroadcastResponse {
            return Err(DeployError::Provider("operation timed out".to_string()));
        }
        Ok(())
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<CreationReceipt>, DeployError> {
        let success = match self.state.mode {
            MockMode::NeverConfirm | MockMode::LoseBroadcastResponse => return Ok(None),
            MockMode::Revert => false,
            _ => true,
        };

        let nonce = self.state.signed.lock().unwrap()[&tx_hash].nonce;
        Ok(Some(CreationReceipt {
            tx_hash,
            success,
            contract_address: success.then(|| self.deployer.create(nonce)),
            block_number: Some(START_BLOCK),
            gas_used: 1_400_000,
        }))
    }
}

//! Constants used in the deploy scripts

use std::time::Duration;

/// The version of the deploy configuration record understood by this tool
pub const CONFIG_VERSION: u32 = 1;

/// The solc version the NFT artifact is expected to be compiled with
pub const SOLC_VERSION: &str = "0.8.4";

/// The key of the parameter set used when none is given
pub const DEFAULT_PARAMETER_SET: &str = "dev";

/// The default location of the compiled NFT artifact
pub const DEFAULT_ARTIFACT_PATH: &str = "artifacts/NFT.json";

/// The default location of the deployments ledger
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The number of confirmations to wait for the contract deployment transaction
pub const NUM_DEPLOY_CONFIRMATIONS: u64 = 1;

/// How long to wait for the creation transaction to confirm, in seconds
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 600;

/// The interval at which the transaction receipt is polled
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The environment variable holding the deployer's private key
pub const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

/// The environment variable holding the block explorer verification key
pub const VERIFICATION_KEY_ENV_VAR: &str = "ETHERSCAN_API_KEY";

/// The environment variable pointing at an optional deploy config file
pub const CONFIG_PATH_ENV_VAR: &str = "NFT_DEPLOY_CONFIG";

/// The Rinkeby testnet chain id
pub const RINKEBY_NETWORK_ID: u64 = 4;

/// The Rinkeby RPC endpoint template, keyed by the `INFURA_ID` credential
pub const RINKEBY_RPC_URL: &str = "https://rinkeby.infura.io/v3/{INFURA_ID}";

/// The gas price used on Rinkeby, 50 gwei
pub const RINKEBY_GAS_PRICE_WEI: u64 = 50_000_000_000;

/// The Ethereum mainnet chain id
pub const MAINNET_NETWORK_ID: u64 = 1;

/// The mainnet RPC endpoint template
pub const MAINNET_RPC_URL: &str = "https://mainnet.infura.io/v3/{INFURA_ID}";

/// The gas price used on mainnet, 40 gwei
pub const MAINNET_GAS_PRICE_WEI: u64 = 40_000_000_000;

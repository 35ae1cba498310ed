//! The deploy configuration record: network profiles and parameter sets.
//!
//! A [`DeployConfig`] starts from the built-in profiles and parameter sets and
//! may be extended or overridden by a versioned JSON file selected at
//! invocation time.

use std::{collections::BTreeMap, fs, path::Path};

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        CONFIG_VERSION, MAINNET_GAS_PRICE_WEI, MAINNET_NETWORK_ID, MAINNET_RPC_URL,
        PRIVATE_KEY_ENV_VAR, RINKEBY_GAS_PRICE_WEI, RINKEBY_NETWORK_ID, RINKEBY_RPC_URL,
        SOLC_VERSION, VERIFICATION_KEY_ENV_VAR,
    },
    errors::DeployError,
    solidity::ConstructorArgs,
};

// -----------------
// | Parameter Set |
// -----------------

/// The constructor arguments for one deployment of the NFT contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// The collection name
    pub name: String,
    /// The collection symbol
    pub symbol: String,
    /// The mint price in wei, as a base-10 integer string
    pub unit_cost_wei: String,
    /// The maximum number of tokens
    pub max_supply: u64,
}

impl ParameterSet {
    /// Construct a parameter set
    pub fn new(name: &str, symbol: &str, unit_cost_wei: &str, max_supply: u64) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            unit_cost_wei: unit_cost_wei.to_string(),
            max_supply,
        }
    }

    /// Parse the mint price without going through a floating point value
    pub fn unit_cost(&self) -> Result<U256, DeployError> {
        let digits = self.unit_cost_wei.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DeployError::Configuration(format!(
                "unit cost `{digits}` is not a base-10 integer"
            )));
        }

        U256::from_str_radix(digits, 10).map_err(|e| {
            DeployError::Configuration(format!("unit cost `{digits}` is out of range: {e}"))
        })
    }

    /// Check the invariants of the parameter set
    pub fn validate(&self) -> Result<(), DeployError> {
        self.unit_cost()?;
        if self.max_supply == 0 {
            return Err(DeployError::Configuration(
                "max supply must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The constructor arguments, in the order the contract declares them
    pub fn constructor_args(&self) -> Result<ConstructorArgs, DeployError> {
        self.validate()?;
        Ok(ConstructorArgs {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            unit_cost_wei: self.unit_cost()?,
            max_supply: U256::from(self.max_supply),
        })
    }
}

// -------------------
// | Network Profile |
// -------------------

/// How to reach and sign for a target network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// The chain id the endpoint must report
    pub network_id: u64,
    /// The RPC endpoint; `{NAME}` placeholders are filled from credentials
    pub rpc_url: String,
    /// The gas price of the creation transaction, in wei
    pub gas_price_wei: u64,
    /// The name of the credential holding the deployer's private key
    #[serde(default = "default_signing_key_source")]
    pub signing_key_source: String,
    /// The name of the credential holding the block explorer key, if any
    #[serde(default)]
    pub verification_key_source: Option<String>,
    /// Whether to submit without simulating the creation first
    #[serde(default)]
    pub skip_dry_run: bool,
}

/// The credential holding the deployer key when a profile names none
fn default_signing_key_source() -> String {
    PRIVATE_KEY_ENV_VAR.to_string()
}

impl NetworkProfile {
    /// Check the invariants of the profile
    pub fn validate(&self) -> Result<(), DeployError> {
        if self.rpc_url.is_empty() {
            return Err(DeployError::Configuration("empty RPC URL".to_string()));
        }
        if self.signing_key_source.is_empty() {
            return Err(DeployError::Configuration(
                "empty signing key source".to_string(),
            ));
        }

        Ok(())
    }
}

// -----------------
// | Deploy Config |
// -----------------

/// The compiler settings the artifact is expected to have been built with
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// The solc version
    pub solc: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            solc: SOLC_VERSION.to_string(),
        }
    }
}

/// The full set of profiles and parameter sets available to a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// The version of the configuration record
    pub version: u32,
    /// Compiler expectations for the artifact
    #[serde(default)]
    pub compiler: CompilerConfig,
    /// Network profiles by name
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkProfile>,
    /// Parameter sets by key
    #[serde(default)]
    pub parameter_sets: BTreeMap<String, ParameterSet>,
}

/// The on-disk form of a config file; omitted sections keep the built-ins
#[derive(Deserialize)]
struct ConfigFile {
    /// The version of the configuration record
    version: u32,
    /// Compiler expectations, overriding the built-in ones when present
    #[serde(default)]
    compiler: Option<CompilerConfig>,
    /// Additional or overriding network profiles
    #[serde(default)]
    networks: BTreeMap<String, NetworkProfile>,
    /// Additional or overriding parameter sets
    #[serde(default)]
    parameter_sets: BTreeMap<String, ParameterSet>,
}

impl DeployConfig {
    /// The profiles and parameter sets shipped with the tool
    pub fn builtin() -> Self {
        let networks = BTreeMap::from([
            (
                "rinkeby".to_string(),
                NetworkProfile {
                    network_id: RINKEBY_NETWORK_ID,
                    rpc_url: RINKEBY_RPC_URL.to_string(),
                    gas_price_wei: RINKEBY_GAS_PRICE_WEI,
                    signing_key_source: default_signing_key_source(),
                    verification_key_source: Some(VERIFICATION_KEY_ENV_VAR.to_string()),
                    skip_dry_run: false,
                },
            ),
            (
                "mainnet".to_string(),
                NetworkProfile {
                    network_id: MAINNET_NETWORK_ID,
                    rpc_url: MAINNET_RPC_URL.to_string(),
                    gas_price_wei: MAINNET_GAS_PRICE_WEI,
                    signing_key_source: default_signing_key_source(),
                    verification_key_source: Some(VERIFICATION_KEY_ENV_VAR.to_string()),
                    skip_dry_run: true,
                },
            ),
        ]);

        let parameter_sets = BTreeMap::from([
            (
                "dev".to_string(),
                ParameterSet::new("Dev NFT", "dNFT", "10000000000000000", 100),
            ),
            (
                "fud-monsters".to_string(),
                ParameterSet::new("FUD Monsters", "FM", "50000000000000000", 8888),
            ),
            (
                "mad-lads-testnet".to_string(),
                ParameterSet::new("Mad Lads Testnet", "MLT", "10000000000000000", 500),
            ),
            (
                "mad-lads".to_string(),
                ParameterSet::new("Mad Lads", "ML", "20000000000000000", 8888),
            ),
        ]);

        Self {
            version: CONFIG_VERSION,
            compiler: CompilerConfig::default(),
            networks,
            parameter_sets,
        }
    }

    /// The built-in config, extended by the file at `path` when one is given
    pub fn load(path: Option<&Path>) -> Result<Self, DeployError> {
        let config = Self::builtin();
        match path {
            Some(path) => {
                let contents = fs::read_to_string(path).map_err(|e| {
                    DeployError::Configuration(format!(
                        "error reading config {}: {e}",
                        path.display()
                    ))
                })?;
                config
                    .extend_from_json(&contents)
                    .map_err(|e| e.context(format!("config {}", path.display())))
            }
            None => Ok(config),
        }
    }

    /// Merge a JSON config file into this config; entries in the file win
    pub fn extend_from_json(mut self, json: &str) -> Result<Self, DeployError> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| DeployError::Configuration(format!("error parsing config: {e}")))?;

        if file.version != CONFIG_VERSION {
            return Err(DeployError::Configuration(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                file.version
            )));
        }

        if let Some(compiler) = file.compiler {
            self.compiler = compiler;
        }
        self.networks.extend(file.networks);
        self.parameter_sets.extend(file.parameter_sets);

        self.validate()?;
        Ok(self)
    }

    /// Check every profile and parameter set
    pub fn validate(&self) -> Result<(), DeployError> {
        for (name, profile) in &self.networks {
            profile
                .validate()
                .map_err(|e| e.context(format!("network `{name}`")))?;
        }
        for (key, params) in &self.parameter_sets {
            params
                .validate()
                .map_err(|e| e.context(format!("parameter set `{key}`")))?;
        }

        Ok(())
    }

    /// Look up a network profile by name
    pub fn network(&self, name: &str) -> Result<&NetworkProfile, DeployError> {
        self.networks.get(name).ok_or_else(|| {
            let known = self.networks.keys().cloned().collect::<Vec<_>>().join(", ");
            DeployError::Configuration(format!("unknown network `{name}` (known: {known})"))
        })
    }

    /// Look up a parameter set by key
    pub fn parameter_set(&self, key: &str) -> Result<&ParameterSet, DeployError> {
        self.parameter_sets.get(key).ok_or_else(|| {
            let known = self
                .parameter_sets
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            DeployError::Configuration(format!("unknown parameter set `{key}` (known: {known})"))
        })
    }
}

//! The deployments ledger.
//!
//! Every creation transaction is recorded in a JSON file as soon as it is
//! submitted, keyed by network and parameter set. The runner consults it before
//! submitting so that the same collection is not deployed twice by accident.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// The state of a recorded deployment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Submitted, confirmation not observed
    Pending,
    /// Confirmed on chain
    Confirmed,
    /// Included on chain but reverted
    Reverted,
}

impl RecordStatus {
    /// Whether a record in this state blocks another deployment
    pub fn blocks_redeploy(&self) -> bool {
        !matches!(self, RecordStatus::Reverted)
    }
}

impl Display for RecordStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Pending => write!(f, "pending"),
            RecordStatus::Confirmed => write!(f, "confirmed"),
            RecordStatus::Reverted => write!(f, "reverted"),
        }
    }
}

/// A single deployment in the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The state of the deployment
    pub status: RecordStatus,
    /// The creation transaction hash
    pub tx_hash: B256,
    /// The deployer nonce the transaction was pinned to
    pub nonce: u64,
    /// The deployer address
    pub deployer: Address,
    /// The contract address derived from deployer and nonce
    pub predicted_address: Address,
    /// The contract address reported by the receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<Address>,
    /// The block the transaction was included in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// The contents of the ledger file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployments {
    /// Records by network name, then by parameter set key
    #[serde(default)]
    pub deployments: BTreeMap<String, BTreeMap<String, DeploymentRecord>>,
}

impl Deployments {
    /// Look up the record for a network and parameter set
    pub fn get(&self, network: &str, parameter_set: &str) -> Option<&DeploymentRecord> {
        self.deployments.get(network)?.get(parameter_set)
    }
}

/// A ledger stored at a path on disk
#[derive(Clone, Debug)]
pub struct LedgerFile {
    /// The path of the JSON file
    path: PathBuf,
}

impl LedgerFile {
    /// A ledger at the given path; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger, treating a missing file as empty
    pub fn read(&self) -> Result<Deployments, DeployError> {
        if !self.path.exists() {
            return Ok(Deployments::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|e| {
            DeployError::Configuration(format!(
                "error reading deployments {}: {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            DeployError::Configuration(format!(
                "error parsing deployments {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Look up the record for a network and parameter set
    pub fn lookup(
        &self,
        network: &str,
        parameter_set: &str,
    ) -> Result<Option<DeploymentRecord>, DeployError> {
        Ok(self.read()?.get(network, parameter_set).cloned())
    }

    /// Insert or replace the record for a network and parameter set
    pub fn record(
        &self,
        network: &str,
        parameter_set: &str,
        record: DeploymentRecord,
    ) -> Result<(), DeployError> {
        let mut deployments = self.read()?;
        deployments
            .deployments
            .entry(network.to_string())
            .or_default()
            .insert(parameter_set.to_string(), record);

        self.write(&deployments)
    }

    /// Write the ledger, replacing the file in one rename
    fn write(&self, deployments: &Deployments) -> Result<(), DeployError> {
        let write_err = |e: std::io::Error| {
            DeployError::Configuration(format!(
                "error writing deployments {}: {e}",
                self.path.display()
            ))
        };

        let json = serde_json::to_string_pretty(deployments)
            .map_err(|e| DeployError::Configuration(format!("error serializing deployments: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)
    }
}

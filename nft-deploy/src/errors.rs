//! Definitions of errors that can occur while deploying the NFT contract

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during a deployment run.
///
/// Every variant is terminal for the run; none of them is retried.
#[derive(Debug)]
pub enum DeployError {
    /// Bad or missing input: unknown network or parameter set, missing
    /// credentials, malformed artifact or config, chain id mismatch
    Configuration(String),
    /// The RPC endpoint could not be reached or misbehaved
    Provider(String),
    /// The network or the contract rejected the creation transaction
    TransactionRejected(String),
    /// The run was aborted by the operator while awaiting confirmation
    Interrupted(String),
}

impl DeployError {
    /// Prefix the error message with the given context, keeping the error kind
    pub fn context(self, ctx: impl Display) -> Self {
        match self {
            DeployError::Configuration(s) => DeployError::Configuration(format!("{ctx}: {s}")),
            DeployError::Provider(s) => DeployError::Provider(format!("{ctx}: {s}")),
            DeployError::TransactionRejected(s) => {
                DeployError::TransactionRejected(format!("{ctx}: {s}"))
            }
            DeployError::Interrupted(s) => DeployError::Interrupted(format!("{ctx}: {s}")),
        }
    }

    /// The message carried by the error
    pub fn message(&self) -> &str {
        match self {
            DeployError::Configuration(s)
            | DeployError::Provider(s)
            | DeployError::TransactionRejected(s)
            | DeployError::Interrupted(s) => s,
        }
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Configuration(s) => write!(f, "configuration error: {}", s),
            DeployError::Provider(s) => write!(f, "provider error: {}", s),
            DeployError::TransactionRejected(s) => write!(f, "transaction rejected: {}", s),
            DeployError::Interrupted(s) => write!(f, "deployment interrupted: {}", s),
        }
    }
}

impl Error for DeployError {}

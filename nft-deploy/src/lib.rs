//! Tooling for deploying the NFT contract to an EVM network.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifact;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod errors;
pub mod ledger;
pub mod provider;
pub mod runner;
mod solidity;

#[cfg(test)]
pub(crate) mod mock;

pub use solidity::ConstructorArgs;

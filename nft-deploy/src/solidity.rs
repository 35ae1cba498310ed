//! Definitions of the Solidity interface used during deployment

use alloy_primitives::U256;
use alloy_sol_types::{sol, SolConstructor};

sol! {
    /// The deployed NFT collection contract
    contract NFT {
        /// Initializes the collection's name, symbol, mint price and supply cap
        constructor(string name, string symbol, uint256 cost, uint256 maxSupply);
    }
}

/// The constructor arguments of the NFT contract, in declaration order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstructorArgs {
    /// The collection name
    pub name: String,
    /// The collection symbol
    pub symbol: String,
    /// The mint price of a single token, in wei
    pub unit_cost_wei: U256,
    /// The maximum number of tokens that can be minted
    pub max_supply: U256,
}

impl ConstructorArgs {
    /// ABI-encode the arguments as they are appended to the contract bytecode
    pub fn abi_encode(&self) -> Vec<u8> {
        NFT::constructorCall {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            cost: self.unit_cost_wei,
            maxSupply: self.max_supply,
        }
        .abi_encode()
    }
}

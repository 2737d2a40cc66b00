/*
[INPUT]:  Network tables fetched from the authority or configuration
[OUTPUT]: Network, WalletContext and WalletState types
[POS]:    Data layer - chain descriptions
[UPDATE]: When network metadata or wallet deployment context changes
*/

use alloy_primitives::{Address, B256, address, b256, keccak256};
use serde::{Deserialize, Serialize};

/// A supported network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub chain_id: u64,
    pub name: String,
    #[serde(default, alias = "isDefaultChain")]
    pub is_default: bool,
    pub rpc_url: String,
}

impl Network {
    pub fn new(chain_id: u64, name: &str, rpc_url: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            is_default: false,
            rpc_url: rpc_url.to_string(),
        }
    }

    /// Same network flagged as the default
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Deployment parameters of counterfactual smart-contract wallets.
///
/// A wallet owned by key `owner` lives at
/// `CREATE2(factory, keccak256(owner as bytes32), init_code_hash)` on every chain,
/// whether or not it has been deployed there yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletContext {
    pub factory: Address,
    pub init_code_hash: B256,
}

impl WalletContext {
    /// Deterministic wallet address for an owner key
    pub fn counterfactual_address(&self, owner: Address) -> Address {
        let salt = keccak256(owner.into_word());
        self.factory.create2(salt, self.init_code_hash)
    }
}

/// Deployment status of the session wallet on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub chain_id: u64,
    pub address: Address,
    pub deployed: bool,
}

impl Default for WalletContext {
    fn default() -> Self {
        Self {
            factory: address!("f9D09D634Fb818b05149329C1dcCFAeA53639d96"),
            init_code_hash: b256!(
                "21c4928109acb0659d88ae5329b5374a3024694c0ad8ad64f5d2a6e93b6e7fe3"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_deserializes_wire_names() {
        let json = r#"{"chainId":137,"name":"polygon","isDefaultChain":true,"rpcUrl":"https://polygon-rpc.com"}"#;
        let network: Network = serde_json::from_str(json).unwrap();
        assert_eq!(network.chain_id, 137);
        assert!(network.is_default);
    }

    #[test]
    fn test_counterfactual_address_is_deterministic() {
        let context = WalletContext::default();
        let owner = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let first = context.counterfactual_address(owner);
        let second = context.counterfactual_address(owner);
        assert_eq!(first, second);
        assert_ne!(first, owner);
        assert_ne!(first, context.counterfactual_address(Address::ZERO));
    }
}

/*
[INPUT]:  Caller-built transaction intents and authority receipts
[OUTPUT]: Batch intent and result types
[POS]:    Data layer - transaction batch types
[UPDATE]: When the batch wire format changes
*/

use alloy_primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

/// One call inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionIntent {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<U256>,
    #[serde(default)]
    pub delegate_call: bool,
    #[serde(default)]
    pub revert_on_error: bool,
}

impl TransactionIntent {
    /// Plain value transfer
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            value,
            data: Bytes::new(),
            gas_limit: None,
            delegate_call: false,
            revert_on_error: true,
        }
    }

    /// Contract call without value
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
            gas_limit: None,
            delegate_call: false,
            revert_on_error: true,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// Execution outcome of one intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentOutcome {
    pub success: bool,
    #[serde(default)]
    pub return_data: Bytes,
}

/// Confirmed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBatchResult {
    pub tx_hash: B256,
    pub per_intent_outcome: Vec<IntentOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_wire_format() {
        let json = r#"{
            "to": "0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270",
            "value": "0x1",
            "data": "0x2e1a7d4d",
            "gasLimit": "0x55555",
            "delegateCall": false,
            "revertOnError": false
        }"#;
        let intent: TransactionIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.value, U256::from(1));
        assert_eq!(intent.gas_limit, Some(U256::from(0x55555)));
        assert_eq!(intent.data.len(), 4);
        assert!(!intent.revert_on_error);
    }
}

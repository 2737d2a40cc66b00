/*
[INPUT]:  Domain, struct type declarations and message values
[OUTPUT]: EIP-712 TypedData and its signing hash
[POS]:    Signing layer - structured-data encoding
[UPDATE]: When typed-data construction rules change
*/

use std::collections::{BTreeMap, BTreeSet};

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::SigningError;

const DOMAIN_TYPE: &str = "EIP712Domain";

/// EIP-712 domain as callers describe it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
}

impl TypedDataDomain {
    fn to_json(&self) -> serde_json::Value {
        let mut domain = serde_json::Map::new();
        if let Some(name) = &self.name {
            domain.insert("name".to_string(), name.clone().into());
        }
        if let Some(version) = &self.version {
            domain.insert("version".to_string(), version.clone().into());
        }
        if let Some(chain_id) = self.chain_id {
            // U256 serializes as a quantity, which is what the domain decoder expects
            domain.insert(
                "chainId".to_string(),
                serde_json::to_value(U256::from(chain_id)).unwrap_or_default(),
            );
        }
        if let Some(contract) = self.verifying_contract {
            domain.insert("verifyingContract".to_string(), contract.to_string().into());
        }
        if let Some(salt) = self.salt {
            domain.insert("salt".to_string(), salt.to_string().into());
        }
        serde_json::Value::Object(domain)
    }
}

/// One member of a struct type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypedField {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Struct declarations keyed by type name
pub type TypeMap = BTreeMap<String, Vec<TypedField>>;

/// Build typed data, inferring the primary type from the declarations
pub fn build(
    domain: &TypedDataDomain,
    types: &TypeMap,
    message: serde_json::Value,
) -> Result<TypedData, SigningError> {
    let primary = primary_type(types)?;
    build_with_primary(domain, types, &primary, message)
}

/// Build typed data with an explicit primary type
pub fn build_with_primary(
    domain: &TypedDataDomain,
    types: &TypeMap,
    primary_type: &str,
    message: serde_json::Value,
) -> Result<TypedData, SigningError> {
    if !types.contains_key(primary_type) {
        return Err(SigningError::InvalidTypedData(format!(
            "primary type {primary_type} is not declared"
        )));
    }

    let declared: BTreeMap<&String, &Vec<TypedField>> = types
        .iter()
        .filter(|(name, _)| name.as_str() != DOMAIN_TYPE)
        .collect();

    let json = serde_json::json!({
        "types": declared,
        "primaryType": primary_type,
        "domain": domain.to_json(),
        "message": message,
    });

    let typed: TypedData = serde_json::from_value(json)
        .map_err(|e| SigningError::InvalidTypedData(e.to_string()))?;

    // Reject payloads whose message doesn't fit the declared schema up front
    signing_hash(&typed)?;
    Ok(typed)
}

/// The one declared struct that no other struct references
pub fn primary_type(types: &TypeMap) -> Result<String, SigningError> {
    let referenced: BTreeSet<&str> = types
        .values()
        .flatten()
        .map(|field| base_type(&field.kind))
        .collect();

    let candidates: Vec<&String> = types
        .keys()
        .filter(|name| name.as_str() != DOMAIN_TYPE && !referenced.contains(name.as_str()))
        .collect();

    match candidates.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(SigningError::InvalidTypedData(
            "no primary type candidate".to_string(),
        )),
        many => Err(SigningError::InvalidTypedData(format!(
            "ambiguous primary type: {many:?}"
        ))),
    }
}

/// EIP-712 signing hash (`keccak256(0x1901 ++ domainSeparator ++ hashStruct(message))`)
pub fn signing_hash(typed_data: &TypedData) -> Result<B256, SigningError> {
    typed_data
        .eip712_signing_hash()
        .map_err(|e| SigningError::InvalidTypedData(e.to_string()))
}

fn base_type(kind: &str) -> &str {
    kind.split('[').next().unwrap_or(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn mail_types() -> TypeMap {
        let mut types = TypeMap::new();
        types.insert(
            "Person".to_string(),
            vec![
                TypedField::new("name", "string"),
                TypedField::new("wallet", "address"),
            ],
        );
        types
    }

    fn mail_domain() -> TypedDataDomain {
        TypedDataDomain {
            name: Some("Ether Mail".to_string()),
            version: Some("1".to_string()),
            chain_id: Some(137),
            verifying_contract: Some(address!("CcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC")),
            salt: None,
        }
    }

    #[test]
    fn test_primary_type_inference() {
        let mut types = mail_types();
        assert_eq!(primary_type(&types).unwrap(), "Person");

        types.insert(
            "Mail".to_string(),
            vec![
                TypedField::new("from", "Person"),
                TypedField::new("to", "Person[]"),
            ],
        );
        assert_eq!(primary_type(&types).unwrap(), "Mail");

        types.insert("Orphan".to_string(), vec![TypedField::new("x", "uint256")]);
        assert!(primary_type(&types).is_err());
    }

    #[test]
    fn test_build_and_hash_is_stable() {
        let message = serde_json::json!({
            "name": "Bob",
            "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB",
        });
        let first = build(&mail_domain(), &mail_types(), message.clone()).unwrap();
        let second = build(&mail_domain(), &mail_types(), message).unwrap();
        assert_eq!(signing_hash(&first).unwrap(), signing_hash(&second).unwrap());
    }

    #[test]
    fn test_domain_changes_hash() {
        let message = serde_json::json!({
            "name": "Bob",
            "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB",
        });
        let mut other_domain = mail_domain();
        other_domain.chain_id = Some(1);

        let a = build(&mail_domain(), &mail_types(), message.clone()).unwrap();
        let b = build(&other_domain, &mail_types(), message).unwrap();
        assert_ne!(signing_hash(&a).unwrap(), signing_hash(&b).unwrap());
    }

    #[test]
    fn test_message_must_match_schema() {
        let message = serde_json::json!({ "name": "Bob", "wallet": "not-an-address" });
        let err = build(&mail_domain(), &mail_types(), message).unwrap_err();
        assert!(matches!(err, SigningError::InvalidTypedData(_)));
    }
}

/*
[INPUT]:  Resolved session/chain pairs and signing payload digests
[OUTPUT]: Signer handles and signature requests handed to the authority
[POS]:    Data layer - signing types
[UPDATE]: When signing request metadata changes
*/

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability handle bound to one chain of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signer {
    pub chain_id: u64,
    pub address: Address,
    pub session_id: Uuid,
}

/// What kind of payload a signature covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignatureKind {
    Message,
    TypedData,
}

/// One signing call as seen by the authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub kind: SignatureKind,
    pub payload_digest: B256,
    pub chain_id: u64,
    pub counterfactual: bool,
}

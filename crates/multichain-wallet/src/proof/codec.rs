/*
[INPUT]:  Signed AuthProof values / received proof strings
[OUTPUT]: `eth.<address>.<claims>.<signature>` strings and decoded proofs
[POS]:    Proof layer - transport encoding
[UPDATE]: When the proof string layout changes
*/

use std::str::FromStr;

use alloy_primitives::{Address, Bytes};
use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use serde::{Deserialize, Serialize};

use crate::error::ProofError;
use crate::proof::claims::{AuthProof, Claims};

const PROOF_PREFIX: &str = "eth";

/// Claims as they travel inside a proof string
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(flatten)]
    claims: Claims,
    iat: i64,
    exp: i64,
}

/// Encode a signed proof
pub fn encode_proof(proof: &AuthProof) -> Result<String, ProofError> {
    let signature = proof.signature.as_ref().ok_or(ProofError::MissingSignature)?;
    let wire = WireClaims {
        claims: proof.claims.clone(),
        iat: proof.issued_at,
        exp: proof.expires_at,
    };
    let claims_json =
        serde_json::to_vec(&wire).map_err(|e| ProofError::Malformed(e.to_string()))?;

    let address = format!("{:#x}", proof.address);
    Ok(format!(
        "{PROOF_PREFIX}.{address}.{}.0x{}",
        URL_SAFE_NO_PAD.encode(claims_json),
        hex::encode(signature)
    ))
}

/// Decode a proof string; no validity checks beyond structure
pub fn decode_proof(encoded: &str) -> Result<AuthProof, ProofError> {
    let parts: Vec<&str> = encoded.trim().split('.').collect();
    // An optional fifth segment carries extra data this core doesn't interpret
    if parts.len() != 4 && parts.len() != 5 {
        return Err(ProofError::Malformed(format!(
            "expected 4 or 5 segments, got {}",
            parts.len()
        )));
    }
    if parts[0] != PROOF_PREFIX {
        return Err(ProofError::Malformed(format!(
            "unknown proof prefix {:?}",
            parts[0]
        )));
    }

    let address = Address::from_str(parts[1])
        .map_err(|e| ProofError::Malformed(format!("invalid address: {e}")))?;

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(parts[2])
        .or_else(|_| URL_SAFE.decode(parts[2]))
        .map_err(|e| ProofError::Malformed(format!("invalid claims base64: {e}")))?;
    let wire: WireClaims = serde_json::from_slice(&claims_bytes)
        .map_err(|e| ProofError::Malformed(format!("invalid claims json: {e}")))?;
    if wire.exp <= wire.iat {
        return Err(ProofError::Malformed(format!(
            "expiry {} is not after issue time {}",
            wire.exp, wire.iat
        )));
    }

    let signature_hex = parts[3].strip_prefix("0x").unwrap_or(parts[3]);
    let signature = hex::decode(signature_hex)
        .map_err(|e| ProofError::Malformed(format!("invalid signature hex: {e}")))?;
    if signature.is_empty() {
        return Err(ProofError::MissingSignature);
    }

    Ok(AuthProof {
        address,
        claims: wire.claims,
        issued_at: wire.iat,
        expires_at: wire.exp,
        signature: Some(Bytes::from(signature)),
    })
}

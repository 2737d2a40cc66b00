/*
[INPUT]:  Address, claims, TTL, signer handles, received proofs
[OUTPUT]: Signed AuthProofs and validation results
[POS]:    Proof layer - build/sign/verify entry points
[UPDATE]: When proof validation rules or clock handling change
*/

use std::time::Duration;

use alloy_primitives::Address;
use chrono::Utc;
use tracing::debug;

use crate::error::{ProofError, Result};
use crate::proof::claims::{AuthProof, Claims};
use crate::proof::codec::decode_proof;
use crate::signing::SigningProtocol;
use crate::types::Signer;

/// Builds, signs and verifies authentication proofs
#[derive(Clone)]
pub struct AuthProofProtocol {
    signing: SigningProtocol,
    clock_skew_secs: i64,
}

impl AuthProofProtocol {
    pub fn new(signing: SigningProtocol, clock_skew: Duration) -> Self {
        Self {
            signing,
            clock_skew_secs: i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Unsigned proof issued now, expiring `ttl_seconds` later
    pub fn build_proof(
        &self,
        address: Address,
        claims: Claims,
        ttl_seconds: i64,
    ) -> std::result::Result<AuthProof, ProofError> {
        AuthProof::new(address, claims, now(), ttl_seconds)
    }

    /// Sign the proof's claims as typed data through the authority
    pub async fn sign_proof(
        &self,
        proof: AuthProof,
        signer: &Signer,
        counterfactual: bool,
    ) -> Result<AuthProof> {
        if proof.is_signed() {
            return Err(ProofError::Malformed("proof is already signed".to_string()).into());
        }
        if signer.address != proof.address {
            return Err(ProofError::SignerMismatch {
                signer: signer.address.to_string(),
                proof: proof.address.to_string(),
            }
            .into());
        }

        let typed_data = proof.typed_data()?;
        let signature = self
            .signing
            .sign_typed_data(signer, &typed_data, counterfactual)
            .await?;

        Ok(AuthProof {
            signature: Some(signature),
            ..proof
        })
    }

    /// Validate a proof against the current time
    pub fn verify_proof(
        &self,
        proof: &AuthProof,
        chain_id: u64,
    ) -> std::result::Result<(), ProofError> {
        self.verify_proof_at(proof, chain_id, now())
    }

    /// Validate a proof as of `now` (unix seconds)
    pub fn verify_proof_at(
        &self,
        proof: &AuthProof,
        chain_id: u64,
        now: i64,
    ) -> std::result::Result<(), ProofError> {
        if now.saturating_sub(self.clock_skew_secs) > proof.expires_at {
            return Err(ProofError::Expired {
                expires_at: proof.expires_at,
                now,
            });
        }
        if now.saturating_add(self.clock_skew_secs) < proof.issued_at {
            return Err(ProofError::NotYetValid {
                issued_at: proof.issued_at,
                now,
            });
        }

        let signature = proof.signature.as_ref().ok_or(ProofError::MissingSignature)?;
        let Ok(digest) = proof.digest() else {
            return Err(ProofError::BadSignature);
        };

        let valid = self.signing.validator().is_valid_signature(
            proof.address,
            digest,
            signature,
            chain_id,
        );
        debug!(address = %proof.address, chain_id, valid, "proof signature checked");
        if valid {
            Ok(())
        } else {
            Err(ProofError::BadSignature)
        }
    }

    /// Decode and validate a received proof string
    pub fn verify_proof_string(
        &self,
        encoded: &str,
        chain_id: u64,
    ) -> std::result::Result<AuthProof, ProofError> {
        let proof = decode_proof(encoded)?;
        self.verify_proof(&proof, chain_id)?;
        Ok(proof)
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

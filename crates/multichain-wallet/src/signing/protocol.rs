/*
[INPUT]:  Signer handles, messages, typed data and received signatures
[OUTPUT]: Authority-produced signatures and offline verification results
[POS]:    Signing layer - sign/verify entry points
[UPDATE]: When signing entry points or error mapping change
*/

use std::sync::Arc;

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes};
use tracing::debug;

use crate::authority::{AuthorityError, WalletAuthority};
use crate::error::{Result, SigningError, WalletError};
use crate::signing::message::{MessageInput, personal_digest};
use crate::signing::typed_data;
use crate::signing::validator::SignatureValidator;
use crate::types::{SignatureKind, SignatureRequest, Signer};

/// EIP-1193 "user rejected request"
const USER_REJECTED_CODE: i64 = 4001;

/// Signs through the authority and verifies locally
#[derive(Clone)]
pub struct SigningProtocol {
    authority: Arc<dyn WalletAuthority>,
    validator: SignatureValidator,
}

impl SigningProtocol {
    pub fn new(authority: Arc<dyn WalletAuthority>, validator: SignatureValidator) -> Self {
        Self {
            authority,
            validator,
        }
    }

    pub fn validator(&self) -> &SignatureValidator {
        &self.validator
    }

    /// Sign a personal message (EIP-191) on the signer's chain
    pub async fn sign_message(
        &self,
        signer: &Signer,
        message: &[u8],
        counterfactual: bool,
    ) -> Result<Bytes> {
        let request = SignatureRequest {
            kind: SignatureKind::Message,
            payload_digest: personal_digest(message),
            chain_id: signer.chain_id,
            counterfactual,
        };
        debug!(
            chain_id = signer.chain_id,
            counterfactual,
            digest = %request.payload_digest,
            "requesting message signature"
        );

        self.authority
            .sign_message(&request, message)
            .await
            .map_err(signing_error)
    }

    /// Sign text, hex text or bytes; hex text and its UTF-8 source sign identically
    pub async fn sign_message_input(
        &self,
        signer: &Signer,
        message: &MessageInput,
        counterfactual: bool,
    ) -> Result<Bytes> {
        let bytes = message.to_bytes()?;
        self.sign_message(signer, &bytes, counterfactual).await
    }

    pub fn verify_message_signature(
        &self,
        address: Address,
        message: &[u8],
        signature: &[u8],
        chain_id: u64,
    ) -> bool {
        self.validator
            .is_valid_signature(address, personal_digest(message), signature, chain_id)
    }

    /// Like [`Self::verify_message_signature`]; undecodable input is simply invalid
    pub fn verify_message_input(
        &self,
        address: Address,
        message: &MessageInput,
        signature: &[u8],
        chain_id: u64,
    ) -> bool {
        match message.to_bytes() {
            Ok(bytes) => self.verify_message_signature(address, &bytes, signature, chain_id),
            Err(_) => false,
        }
    }

    /// Sign EIP-712 typed data on the signer's chain
    pub async fn sign_typed_data(
        &self,
        signer: &Signer,
        typed_data: &TypedData,
        counterfactual: bool,
    ) -> Result<Bytes> {
        let request = SignatureRequest {
            kind: SignatureKind::TypedData,
            payload_digest: typed_data::signing_hash(typed_data)?,
            chain_id: signer.chain_id,
            counterfactual,
        };
        debug!(
            chain_id = signer.chain_id,
            counterfactual,
            primary_type = %typed_data.primary_type,
            digest = %request.payload_digest,
            "requesting typed data signature"
        );

        self.authority
            .sign_typed_data(&request, typed_data)
            .await
            .map_err(signing_error)
    }

    pub fn verify_typed_data_signature(
        &self,
        address: Address,
        typed_data: &TypedData,
        signature: &[u8],
        chain_id: u64,
    ) -> bool {
        match typed_data::signing_hash(typed_data) {
            Ok(digest) => self
                .validator
                .is_valid_signature(address, digest, signature, chain_id),
            Err(_) => false,
        }
    }
}

fn signing_error(err: AuthorityError) -> WalletError {
    let err = match err {
        AuthorityError::Declined(reason) => SigningError::Declined(reason),
        AuthorityError::Rpc { code, message } if code == USER_REJECTED_CODE => {
            SigningError::Declined(message)
        }
        other => SigningError::AuthorityUnavailable(other.to_string()),
    };
    err.into()
}

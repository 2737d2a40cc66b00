/*
[INPUT]:  Connect options, signature requests, transaction intents
[OUTPUT]: Authority trait and its error type
[POS]:    Authority layer - capability abstraction
[UPDATE]: When adding authority operations or changing their contracts
*/

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{
    AuthorityEvent, ConnectDetails, ConnectOptions, Network, OpenWalletIntent, SignatureRequest,
    TransactionBatchResult, TransactionIntent, WalletState,
};

/// Failures reported by an authority adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// The user or the authority refused the request
    #[error("Request declined: {0}")]
    Declined(String),

    /// The authority can't be reached right now
    #[error("Authority unavailable: {0}")]
    Unavailable(String),

    /// The call would revert, or did
    #[error("Execution reverted at intent {index}: {reason}")]
    Reverted { index: usize, reason: String },

    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Error object returned by the authority
    #[error("Authority error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be interpreted
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AuthorityError {
    /// Check if the failure is likely to clear up on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthorityError::Unavailable(_) | AuthorityError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for AuthorityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AuthorityError::Unavailable(err.to_string())
        } else {
            AuthorityError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthorityError {
    fn from(err: serde_json::Error) -> Self {
        AuthorityError::InvalidResponse(err.to_string())
    }
}

/// The external signing/session provider.
///
/// Custody and user approval live behind this trait; the core only ever talks to it
/// through these operations. All methods take `&self` so one adapter can be shared
/// by every component of a session.
#[async_trait]
pub trait WalletAuthority: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<ConnectDetails, AuthorityError>;

    async fn disconnect(&self) -> Result<(), AuthorityError>;

    async fn open_wallet(
        &self,
        path: Option<&str>,
        intent: Option<&OpenWalletIntent>,
    ) -> Result<bool, AuthorityError>;

    async fn close_wallet(&self) -> Result<(), AuthorityError>;

    async fn get_address(&self) -> Result<Address, AuthorityError>;

    async fn get_chain_id(&self) -> Result<u64, AuthorityError>;

    async fn get_networks(&self) -> Result<Vec<Network>, AuthorityError>;

    async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, AuthorityError>;

    /// Whether the session wallet is deployed on `chain_id`
    async fn get_wallet_state(&self, chain_id: u64) -> Result<WalletState, AuthorityError>;

    /// Sign an EIP-191 personal message; `request.payload_digest` is its digest
    async fn sign_message(
        &self,
        request: &SignatureRequest,
        message: &[u8],
    ) -> Result<Bytes, AuthorityError>;

    /// Sign EIP-712 typed data; `request.payload_digest` is its signing hash
    async fn sign_typed_data(
        &self,
        request: &SignatureRequest,
        typed_data: &TypedData,
    ) -> Result<Bytes, AuthorityError>;

    /// Submit an atomic batch; returns the submission handle (transaction hash)
    async fn send_transaction_batch(
        &self,
        chain_id: u64,
        intents: &[TransactionIntent],
    ) -> Result<B256, AuthorityError>;

    /// Wait for a submitted batch to be mined
    async fn wait_for_batch(
        &self,
        chain_id: u64,
        tx_hash: B256,
    ) -> Result<TransactionBatchResult, AuthorityError>;

    async fn estimate_gas(
        &self,
        chain_id: u64,
        intent: &TransactionIntent,
    ) -> Result<U256, AuthorityError>;

    /// Take the event stream; `None` once taken.
    ///
    /// Events carry the id of the session they belong to so late deliveries can't
    /// act on a newer session.
    fn take_event_receiver(&self) -> Option<mpsc::Receiver<AuthorityEvent>>;
}

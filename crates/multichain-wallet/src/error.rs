/*
[INPUT]:  Failure sources (authority, session, registry, signing, proofs, batches)
[OUTPUT]: Structured error taxonomy with remediation hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or remediation categories
*/

use thiserror::Error;

use crate::authority::AuthorityError;

/// Connection lifecycle failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The authority (or the user behind it) declined the connection
    #[error("Connection rejected: {0}")]
    Rejected(String),

    /// No answer from the authority within the connect timeout
    #[error("Connection timeout after {millis}ms")]
    Timeout { millis: u64 },

    /// The caller cancelled the attempt
    #[error("Connection attempt cancelled")]
    Cancelled,

    /// Connected, but the returned authorization proof did not verify.
    /// The session is left `Connected` and the authorization must be treated as untrusted.
    #[error("Connected, but authorization proof is invalid: {reason}")]
    InvalidProof { reason: String },
}

/// Session state violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No wallet session is connected")]
    NotConnected,

    /// A connect with different options is already in flight
    #[error("A connection attempt with different options is already in progress")]
    AlreadyConnecting,
}

/// Network registry failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Unknown chain id {0}")]
    UnknownChain(u64),

    #[error("No default network configured")]
    NoDefaultNetwork,

    #[error("More than one network is flagged as default: {0:?}")]
    MultipleDefaults(Vec<u64>),

    #[error("Invalid network entry: {0}")]
    InvalidNetwork(String),
}

/// Signing failures (verification never produces these)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Signing authority unavailable: {0}")]
    AuthorityUnavailable(String),

    #[error("Signature request declined: {0}")]
    Declined(String),

    #[error("Invalid typed data: {0}")]
    InvalidTypedData(String),

    #[error("Invalid message input: {0}")]
    InvalidMessage(String),
}

/// Authentication proof failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Proof expired at {expires_at} (now {now})")]
    Expired { expires_at: i64, now: i64 },

    #[error("Proof not valid before {issued_at} (now {now})")]
    NotYetValid { issued_at: i64, now: i64 },

    #[error("Proof signature does not match its address")]
    BadSignature,

    #[error("Proof TTL must be positive, got {0}s")]
    InvalidTTL(i64),

    #[error("Proof is not signed")]
    MissingSignature,

    #[error("Signer {signer} cannot sign a proof for {proof}")]
    SignerMismatch { signer: String, proof: String },

    #[error("Malformed proof: {0}")]
    Malformed(String),
}

/// Transaction batch failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Insufficient funds: batch needs {required}, account holds {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Batch reverted at intent {index}: {reason}")]
    Reverted { index: usize, reason: String },

    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),

    #[error("Batch submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Batch {tx_hash} not confirmed after {millis}ms")]
    ConfirmationTimeout { tx_hash: String, millis: u64 },

    #[error("Batch submission cancelled")]
    Cancelled,
}

/// Main error type for the wallet core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Authority failure outside any of the classified operations
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// What a caller should do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    /// Establish a (new) session
    Reconnect,
    /// Ask the user to authorize or sign again
    Reauthorize,
    /// Top up the account
    FundAccount,
    /// Pick a supported network
    SwitchNetwork,
    /// The request itself is wrong; retrying won't help
    FixRequest,
    /// Transient; the caller may retry on its own schedule
    RetryLater,
}

impl WalletError {
    /// Map the error to a caller-side remediation
    pub fn remediation(&self) -> Remediation {
        match self {
            WalletError::Connection(ConnectionError::InvalidProof { .. }) => Remediation::Reauthorize,
            WalletError::Connection(_) => Remediation::Reconnect,
            WalletError::Session(SessionError::NotConnected) => Remediation::Reconnect,
            WalletError::Session(SessionError::AlreadyConnecting) => Remediation::RetryLater,
            WalletError::Chain(ChainError::UnknownChain(_) | ChainError::NoDefaultNetwork) => {
                Remediation::SwitchNetwork
            }
            WalletError::Chain(_) => Remediation::FixRequest,
            WalletError::Signing(SigningError::AuthorityUnavailable(_)) => Remediation::RetryLater,
            WalletError::Signing(SigningError::Declined(_)) => Remediation::Reauthorize,
            WalletError::Signing(_) => Remediation::FixRequest,
            WalletError::Proof(
                ProofError::Expired { .. }
                | ProofError::NotYetValid { .. }
                | ProofError::BadSignature
                | ProofError::MissingSignature,
            ) => Remediation::Reauthorize,
            WalletError::Proof(_) => Remediation::FixRequest,
            WalletError::Transaction(TransactionError::InsufficientFunds { .. }) => {
                Remediation::FundAccount
            }
            WalletError::Transaction(
                TransactionError::ConfirmationTimeout { .. } | TransactionError::Cancelled,
            ) => Remediation::RetryLater,
            WalletError::Transaction(_) => Remediation::FixRequest,
            WalletError::Authority(err) if err.is_transient() => Remediation::RetryLater,
            WalletError::Authority(_) => Remediation::Reconnect,
            WalletError::Config(_) => Remediation::FixRequest,
        }
    }

    /// Check if error indicates the session must be (re)established
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            WalletError::Session(SessionError::NotConnected) | WalletError::Connection(_)
        )
    }
}

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;

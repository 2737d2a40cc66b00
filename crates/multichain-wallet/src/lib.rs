/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public multi-chain wallet crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod authority;
pub mod batch;
pub mod config;
pub mod error;
pub mod proof;
pub mod registry;
pub mod session;
pub mod signing;
pub mod types;
pub mod wallet;

// Re-export commonly used types from authority
pub use authority::{
    AuthorityError,
    ConnectBehavior,
    MockAuthority,
    RemoteAuthority,
    RemoteAuthorityConfig,
    WalletAuthority,
};

pub use batch::{BatchOptions, PendingBatch, TransactionBatcher};
pub use config::WalletConfig;

pub use error::{
    ChainError,
    ConnectionError,
    ProofError,
    Remediation,
    Result,
    SessionError,
    SigningError,
    TransactionError,
    WalletError,
};

// Re-export commonly used types from proof
pub use proof::{AuthProof, AuthProofProtocol, Claims, decode_proof, encode_proof};
pub use registry::ChainRegistry;
pub use session::{EventBus, EventSubscription, WalletSession};

// Re-export commonly used types from signing
pub use signing::{
    ERC6492_MAGIC_SUFFIX,
    MessageInput,
    SignatureValidator,
    SignerResolver,
    SigningProtocol,
    TypedDataDomain,
    TypedField,
    wrap_counterfactual,
};

// Re-export all types
pub use types::*;

pub use wallet::Wallet;

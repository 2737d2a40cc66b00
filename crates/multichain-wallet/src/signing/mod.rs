/*
[INPUT]:  Resolved signers, messages, typed data and signatures
[OUTPUT]: Signatures from the authority and offline verification verdicts
[POS]:    Signing layer - digests, routing and verification
[UPDATE]: When digest schemes or verification rules change
*/

pub mod message;
pub mod protocol;
pub mod resolver;
pub mod typed_data;
pub mod validator;

pub use message::{MessageInput, personal_digest};
pub use protocol::SigningProtocol;
pub use resolver::SignerResolver;
pub use typed_data::{TypedDataDomain, TypedField};
pub use validator::{ERC6492_MAGIC_SUFFIX, SignatureValidator, wrap_counterfactual};

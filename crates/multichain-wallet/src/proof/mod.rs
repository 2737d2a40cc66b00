/*
[INPUT]:  Addresses, claims, TTLs and received proof strings
[OUTPUT]: Signed, encodable, verifiable authentication proofs
[POS]:    Proof layer - self-issued time-bounded authentication
[UPDATE]: When the proof format or validation rules change
*/

pub mod claims;
pub mod codec;
pub mod protocol;

pub use claims::{AuthProof, Claims, ETHAUTH_DOMAIN_NAME, ETHAUTH_VERSION};
pub use codec::{decode_proof, encode_proof};
pub use protocol::AuthProofProtocol;

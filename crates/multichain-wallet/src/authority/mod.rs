/*
[INPUT]:  Requests from the session, signing and batch layers
[OUTPUT]: Answers from the external signing authority
[POS]:    Authority layer - boundary to the remote signer
[UPDATE]: When authority operations or adapters change
*/

pub mod mock;
pub mod provider;
pub mod remote;

pub use mock::{ConnectBehavior, MockAuthority};
pub use provider::{AuthorityError, WalletAuthority};
pub use remote::{RemoteAuthority, RemoteAuthorityConfig};

/*
[INPUT]:  Authority schema definitions and serde requirements
[OUTPUT]: Typed Rust structs/enums shared by every component
[POS]:    Data layer - type definitions for the wallet core
[UPDATE]: When the authority schema changes or new types are added
*/

pub mod network;
pub mod session;
pub mod signature;
pub mod transaction;

pub use network::*;
pub use session::*;
pub use signature::*;
pub use transaction::*;

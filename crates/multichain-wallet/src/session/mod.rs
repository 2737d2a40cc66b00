/*
[INPUT]:  Connect/disconnect/open/close requests and authority events
[OUTPUT]: Session state, lifecycle transitions and event subscriptions
[POS]:    Session layer - owns the connection to the authority
[UPDATE]: When the state machine or event delivery changes
*/

pub mod events;
pub mod manager;

pub use events::{EventBus, EventSubscription};
pub use manager::WalletSession;

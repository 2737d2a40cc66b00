/*
[INPUT]:  Connection options and authority connect/event payloads
[OUTPUT]: Session state machine types, connect details and wallet events
[POS]:    Data layer - session lifecycle types
[UPDATE]: When the connect flow or the event vocabulary changes
*/

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    ConnectedAuthorized,
}

impl SessionState {
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::ConnectedAuthorized)
    }
}

/// Wallet window substate, orthogonal to [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletVisibility {
    #[default]
    Closed,
    Open,
}

/// Point-in-time copy of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    pub session_id: Option<Uuid>,
    pub address: Option<Address>,
    pub active_chain_id: Option<u64>,
    pub wallet: WalletVisibility,
    /// Bumped whenever cached signers must be dropped
    pub generation: u64,
}

impl Session {
    pub fn disconnected(generation: u64) -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: None,
            address: None,
            active_chain_id: None,
            wallet: WalletVisibility::Closed,
            generation,
        }
    }
}

/// Wallet UI settings forwarded to the authority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_payment_providers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_funding_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_funding_currency_to_default: Option<bool>,
}

/// Options for a connect request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectOptions {
    pub app: String,
    pub authorize: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub keep_wallet_opened: bool,
}

impl ConnectOptions {
    pub fn new(app: &str) -> Self {
        Self {
            app: app.to_string(),
            authorize: false,
            settings: None,
            keep_wallet_opened: false,
        }
    }

    pub fn with_authorize(mut self, authorize: bool) -> Self {
        self.authorize = authorize;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }
}

/// Intent attached to an open-wallet request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OpenWalletIntent {
    OpenWithOptions { options: OpenWalletOptions },
    Connect { options: ConnectOptions },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenWalletOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

/// Authorization proof returned by a `connect(authorize = true)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectProof {
    /// Encoded proof, see [`crate::proof::encode_proof`]
    pub proof_string: String,
}

/// Authority answer to a connect request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectDetails {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<ConnectProof>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectDetails {
    pub fn rejected(reason: &str) -> Self {
        Self {
            connected: false,
            address: None,
            chain_id: None,
            session: None,
            proof: None,
            error: Some(reason.to_string()),
        }
    }
}

/// Notifications emitted by the authority and re-published by the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WalletEvent {
    #[serde(rename = "message")]
    Message(serde_json::Value),
    #[serde(rename = "accountsChanged")]
    AccountsChanged(Vec<Address>),
    #[serde(rename = "chainChanged")]
    ChainChanged(u64),
    #[serde(rename = "connect")]
    Connect(ConnectDetails),
    #[serde(rename = "disconnect")]
    Disconnect(Option<String>),
    #[serde(rename = "open")]
    WalletOpened,
    #[serde(rename = "close")]
    WalletClosed,
}

impl WalletEvent {
    /// Event name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            WalletEvent::Message(_) => "message",
            WalletEvent::AccountsChanged(_) => "accountsChanged",
            WalletEvent::ChainChanged(_) => "chainChanged",
            WalletEvent::Connect(_) => "connect",
            WalletEvent::Disconnect(_) => "disconnect",
            WalletEvent::WalletOpened => "open",
            WalletEvent::WalletClosed => "close",
        }
    }
}

/// A [`WalletEvent`] tagged with the authority session that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityEvent {
    /// `None` when the authority can't attribute the event
    pub session: Option<Uuid>,
    pub event: WalletEvent,
}

impl AuthorityEvent {
    pub fn new(session: Option<Uuid>, event: WalletEvent) -> Self {
        Self { session, event }
    }

    /// Whether the event may change the session identified by `current`
    pub fn belongs_to(&self, current: Option<Uuid>) -> bool {
        self.session.is_none() || self.session == current
    }
}

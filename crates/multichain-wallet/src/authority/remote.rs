/*
[INPUT]:  Wallet bridge endpoint (JSON-RPC over HTTP) and optional event socket URL
[OUTPUT]: WalletAuthority backed by a remote wallet bridge
[POS]:    Authority layer - production adapter
[UPDATE]: When bridge methods, error codes or the event socket change
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, B256, Bytes, U64, U256};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authority::provider::{AuthorityError, WalletAuthority};
use crate::types::{
    AuthorityEvent, ConnectDetails, ConnectOptions, Network, OpenWalletIntent, SignatureRequest,
    TransactionBatchResult, TransactionIntent, WalletEvent, WalletState,
};

const EVENT_BUFFER: usize = 100;
const USER_REJECTED_CODE: i64 = 4001;
const UNAUTHORIZED_CODE: i64 = 4100;
const EXECUTION_REVERTED_CODE: i64 = 3;
const SERVER_ERROR_CODE: i64 = -32000;

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Wallet bridge connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAuthorityConfig {
    /// JSON-RPC endpoint of the wallet bridge
    pub endpoint: String,
    /// WebSocket URL of the bridge event stream
    #[serde(default)]
    pub events_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl RemoteAuthorityConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            events_url: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn with_events_url(mut self, events_url: &str) -> Self {
        self.events_url = Some(events_url.to_string());
        self
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Authority reached through a wallet bridge
#[derive(Debug)]
pub struct RemoteAuthority {
    http_client: Client,
    endpoint: Url,
    events_url: Option<Url>,
    next_id: AtomicU64,
    events_tx: mpsc::Sender<AuthorityEvent>,
    events_rx: std::sync::Mutex<Option<mpsc::Receiver<AuthorityEvent>>>,
    stream_started: Arc<Mutex<bool>>,
    /// Bridge session of the last successful connect
    current_session: Arc<RwLock<Option<Uuid>>>,
}

impl RemoteAuthority {
    pub fn new(config: &RemoteAuthorityConfig) -> Result<Self, AuthorityError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AuthorityError::Transport(format!("invalid endpoint: {e}")))?;
        let events_url = config
            .events_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| AuthorityError::Transport(format!("invalid events url: {e}")))?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        Ok(Self {
            http_client,
            endpoint,
            events_url,
            next_id: AtomicU64::new(1),
            events_tx,
            events_rx: std::sync::Mutex::new(Some(events_rx)),
            stream_started: Arc::new(Mutex::new(false)),
            current_session: Arc::new(RwLock::new(None)),
        })
    }

    /// Open the bridge event socket and forward its events.
    ///
    /// No-op without an events URL or when the stream is already running.
    pub async fn start_event_stream(&self) -> Result<(), AuthorityError> {
        let Some(url) = self.events_url.clone() else {
            return Ok(());
        };
        let mut started = self.stream_started.lock().await;
        if *started {
            return Ok(());
        }

        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;
        let (_write, mut read) = ws_stream.split();
        *started = true;
        info!(url = %url, "wallet event stream connected");

        let events_tx = self.events_tx.clone();
        let stream_started = self.stream_started.clone();
        let current_session = self.current_session.clone();
        tokio::spawn(async move {
            while let Some(incoming) = read.next().await {
                match incoming {
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(message) => {
                        let fallback = *current_session
                            .read()
                            .unwrap_or_else(PoisonError::into_inner);
                        if let Some(event) = parse_event(message, fallback)
                            && events_tx.send(event).await.is_err()
                        {
                            break;
                        }
                    }
                }
            }
            *stream_started.lock().await = false;
            info!("wallet event stream closed");
        });
        Ok(())
    }

    fn session_slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<Uuid>> {
        self.current_session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Send one JSON-RPC call to the bridge
    pub async fn rpc_call<P, R>(&self, method: &str, params: P) -> Result<R, AuthorityError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(method, id, "bridge request");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(AuthorityError::Unavailable(format!("bridge returned {status}")));
        }
        if !status.is_success() {
            return Err(AuthorityError::Transport(format!("bridge returned {status}")));
        }

        let body: RpcResponse = response.json().await?;
        if let Some(error) = body.error {
            return Err(rpc_error(error));
        }
        let result = body.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl WalletAuthority for RemoteAuthority {
    async fn connect(&self, options: &ConnectOptions) -> Result<ConnectDetails, AuthorityError> {
        if let Err(e) = self.start_event_stream().await {
            warn!(error = %e, "wallet event stream unavailable");
        }
        let details: ConnectDetails = self
            .rpc_call("wallet_connect", json!({ "options": options }))
            .await?;
        if details.connected {
            *self.session_slot() = details.session;
        }
        Ok(details)
    }

    async fn disconnect(&self) -> Result<(), AuthorityError> {
        let _: Value = self.rpc_call("wallet_disconnect", json!([])).await?;
        *self.session_slot() = None;
        Ok(())
    }

    async fn open_wallet(
        &self,
        path: Option<&str>,
        intent: Option<&OpenWalletIntent>,
    ) -> Result<bool, AuthorityError> {
        self.rpc_call("wallet_openWallet", json!({ "path": path, "intent": intent }))
            .await
    }

    async fn close_wallet(&self) -> Result<(), AuthorityError> {
        let _: Value = self.rpc_call("wallet_closeWallet", json!([])).await?;
        Ok(())
    }

    async fn get_address(&self) -> Result<Address, AuthorityError> {
        let accounts: Vec<Address> = self.rpc_call("eth_accounts", json!([])).await?;
        accounts
            .first()
            .copied()
            .ok_or_else(|| AuthorityError::InvalidResponse("no accounts".to_string()))
    }

    async fn get_chain_id(&self) -> Result<u64, AuthorityError> {
        let chain_id: U64 = self.rpc_call("eth_chainId", json!([])).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn get_networks(&self) -> Result<Vec<Network>, AuthorityError> {
        self.rpc_call("wallet_getNetworks", json!([])).await
    }

    async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, AuthorityError> {
        self.rpc_call(
            "wallet_getBalance",
            json!({ "chainId": chain_id, "address": address }),
        )
        .await
    }

    async fn get_wallet_state(&self, chain_id: u64) -> Result<WalletState, AuthorityError> {
        self.rpc_call("wallet_getWalletState", json!({ "chainId": chain_id }))
            .await
    }

    async fn sign_message(
        &self,
        request: &SignatureRequest,
        message: &[u8],
    ) -> Result<Bytes, AuthorityError> {
        self.rpc_call(
            "wallet_signMessage",
            json!({ "request": request, "message": Bytes::copy_from_slice(message) }),
        )
        .await
    }

    async fn sign_typed_data(
        &self,
        request: &SignatureRequest,
        typed_data: &TypedData,
    ) -> Result<Bytes, AuthorityError> {
        self.rpc_call(
            "wallet_signTypedData",
            json!({ "request": request, "typedData": typed_data }),
        )
        .await
    }

    async fn send_transaction_batch(
        &self,
        chain_id: u64,
        intents: &[TransactionIntent],
    ) -> Result<B256, AuthorityError> {
        self.rpc_call(
            "wallet_sendTransactionBatch",
            json!({ "chainId": chain_id, "intents": intents }),
        )
        .await
    }

    async fn wait_for_batch(
        &self,
        chain_id: u64,
        tx_hash: B256,
    ) -> Result<TransactionBatchResult, AuthorityError> {
        self.rpc_call(
            "wallet_waitForBatch",
            json!({ "chainId": chain_id, "txHash": tx_hash }),
        )
        .await
    }

    async fn estimate_gas(
        &self,
        chain_id: u64,
        intent: &TransactionIntent,
    ) -> Result<U256, AuthorityError> {
        self.rpc_call(
            "wallet_estimateGas",
            json!({ "chainId": chain_id, "intent": intent }),
        )
        .await
    }

    fn take_event_receiver(&self) -> Option<mpsc::Receiver<AuthorityEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

fn rpc_error(error: RpcErrorObject) -> AuthorityError {
    match error.code {
        USER_REJECTED_CODE | UNAUTHORIZED_CODE => AuthorityError::Declined(error.message),
        EXECUTION_REVERTED_CODE => {
            let index = error
                .data
                .as_ref()
                .and_then(|data| data.get("index"))
                .and_then(Value::as_u64)
                .and_then(|index| usize::try_from(index).ok())
                .unwrap_or(0);
            AuthorityError::Reverted {
                index,
                reason: error.message,
            }
        }
        SERVER_ERROR_CODE if error.message.contains("insufficient funds") => {
            AuthorityError::InsufficientFunds
        }
        code => AuthorityError::Rpc {
            code,
            message: error.message,
        },
    }
}

/// Frames are `{"type", "data"}` events with an optional `"session"` id; frames
/// without one are attributed to `fallback`
fn parse_event(message: WsMessage, fallback: Option<Uuid>) -> Option<AuthorityEvent> {
    let text = match message {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok()?,
        _ => return None,
    };
    let frame: Value = match serde_json::from_str(&text) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(error = %err, "wallet event frame is not json");
            return None;
        }
    };
    let session = frame
        .get("session")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .or(fallback);
    match serde_json::from_value::<WalletEvent>(frame) {
        Ok(event) => Some(AuthorityEvent::new(session, event)),
        Err(err) => {
            debug!(error = %err, "unrecognized wallet event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_mapping() {
        let declined = rpc_error(RpcErrorObject {
            code: 4001,
            message: "User rejected".to_string(),
            data: None,
        });
        assert_eq!(declined, AuthorityError::Declined("User rejected".to_string()));

        let reverted = rpc_error(RpcErrorObject {
            code: 3,
            message: "execution reverted: nope".to_string(),
            data: Some(json!({ "index": 2 })),
        });
        assert_eq!(
            reverted,
            AuthorityError::Reverted {
                index: 2,
                reason: "execution reverted: nope".to_string()
            }
        );

        let funds = rpc_error(RpcErrorObject {
            code: -32000,
            message: "insufficient funds for gas * price + value".to_string(),
            data: None,
        });
        assert_eq!(funds, AuthorityError::InsufficientFunds);
    }

    #[test]
    fn test_parse_event_frames() {
        let current = Uuid::new_v4();
        let frame = WsMessage::Text(r#"{"type":"chainChanged","data":10}"#.into());
        assert_eq!(
            parse_event(frame, Some(current)),
            Some(AuthorityEvent::new(Some(current), WalletEvent::ChainChanged(10)))
        );

        let frame = WsMessage::Text(
            r#"{"type":"disconnect","data":null,"session":"6f1c2a1e-3f43-4a7e-9d59-2b8d7b9d3c10"}"#.into(),
        );
        let event = parse_event(frame, Some(current)).unwrap();
        assert_eq!(event.event, WalletEvent::Disconnect(None));
        assert_eq!(
            event.session,
            Uuid::parse_str("6f1c2a1e-3f43-4a7e-9d59-2b8d7b9d3c10").ok()
        );

        assert_eq!(parse_event(WsMessage::Text("not json".into()), None), None);
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(RemoteAuthority::new(&RemoteAuthorityConfig::new("not a url")).is_err());
    }
}

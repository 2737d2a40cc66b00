/*
[INPUT]:  Scripted behaviour (connect outcome, balances, revert rules, deployments)
[OUTPUT]: In-memory WalletAuthority backed by a local key
[POS]:    Authority layer - test adapter
[UPDATE]: When the authority trait gains operations or tests need new knobs
*/

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{Revert, SolError};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::authority::provider::{AuthorityError, WalletAuthority};
use crate::proof::{AuthProof, Claims, encode_proof};
use crate::signing::{personal_digest, typed_data, wrap_counterfactual};
use crate::types::{
    AuthorityEvent, ConnectDetails, ConnectOptions, ConnectProof, IntentOutcome, Network,
    OpenWalletIntent, SignatureRequest, TransactionBatchResult, TransactionIntent, WalletContext,
    WalletEvent, WalletState,
};

const PROOF_TTL_SECS: i64 = 3600;
const EVENT_BUFFER: usize = 64;
const BASE_GAS: u64 = 21_000;
const GAS_PER_DATA_BYTE: u64 = 16;
const INVALID_PARAMS_CODE: i64 = -32602;

/// How the mock answers `connect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    Approve,
    Reject(String),
    /// Approve after a delay
    Delay(Duration),
    /// Never answer
    Pending,
}

#[derive(Debug)]
struct MockState {
    behavior: ConnectBehavior,
    forge_proofs: bool,
    decline_signatures: bool,
    connected: bool,
    session: Option<Uuid>,
    chain_id: u64,
    balances: HashMap<(u64, Address), U256>,
    revert_rules: HashMap<Address, String>,
    deployed: HashSet<u64>,
    receipts: HashMap<B256, TransactionBatchResult>,
    confirmation_delay: Option<Duration>,
    nonce: u64,
}

/// Key-backed authority for tests and local development.
///
/// The wallet address is the counterfactual wallet of the owner key under the
/// configured [`WalletContext`]. Batches are atomic: a reverting intent leaves all
/// balances untouched.
#[derive(Debug)]
pub struct MockAuthority {
    owner: PrivateKeySigner,
    context: WalletContext,
    address: Address,
    networks: Vec<Network>,
    state: Mutex<MockState>,
    connect_calls: AtomicUsize,
    events_tx: mpsc::Sender<AuthorityEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<AuthorityEvent>>>,
}

impl MockAuthority {
    /// Mock serving `networks`, starting on the default one, with a random owner key
    pub fn new(networks: Vec<Network>) -> Self {
        Self::with_owner(networks, PrivateKeySigner::random(), WalletContext::default())
    }

    pub fn with_owner(networks: Vec<Network>, owner: PrivateKeySigner, context: WalletContext) -> Self {
        let chain_id = networks
            .iter()
            .find(|network| network.is_default)
            .or_else(|| networks.first())
            .map(|network| network.chain_id)
            .unwrap_or(1);
        let address = context.counterfactual_address(owner.address());
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            owner,
            context,
            address,
            networks,
            state: Mutex::new(MockState {
                behavior: ConnectBehavior::Approve,
                forge_proofs: false,
                decline_signatures: false,
                connected: false,
                session: None,
                chain_id,
                balances: HashMap::new(),
                revert_rules: HashMap::new(),
                deployed: HashSet::new(),
                receipts: HashMap::new(),
                confirmation_delay: None,
                nonce: 0,
            }),
            connect_calls: AtomicUsize::new(0),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Wallet address handed out on connect
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner_address(&self) -> Address {
        self.owner.address()
    }

    pub fn context(&self) -> WalletContext {
        self.context
    }

    /// How many times `connect` reached the mock
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn set_connect_behavior(&self, behavior: ConnectBehavior) {
        self.state().behavior = behavior;
    }

    /// Sign connect proofs with a throwaway key
    pub fn set_forge_proofs(&self, forge: bool) {
        self.state().forge_proofs = forge;
    }

    pub fn set_decline_signatures(&self, decline: bool) {
        self.state().decline_signatures = decline;
    }

    pub fn set_balance(&self, chain_id: u64, address: Address, balance: U256) {
        self.state().balances.insert((chain_id, address), balance);
    }

    pub fn balance_of(&self, chain_id: u64, address: Address) -> U256 {
        self.state()
            .balances
            .get(&(chain_id, address))
            .copied()
            .unwrap_or_default()
    }

    /// Any call to `target` reverts with `reason`
    pub fn add_revert_rule(&self, target: Address, reason: &str) {
        self.state().revert_rules.insert(target, reason.to_string());
    }

    pub fn set_deployed(&self, chain_id: u64, deployed: bool) {
        let mut state = self.state();
        if deployed {
            state.deployed.insert(chain_id);
        } else {
            state.deployed.remove(&chain_id);
        }
    }

    pub fn is_deployed(&self, chain_id: u64) -> bool {
        self.state().deployed.contains(&chain_id)
    }

    /// Delay before `wait_for_batch` answers
    pub fn set_confirmation_delay(&self, delay: Option<Duration>) {
        self.state().confirmation_delay = delay;
    }

    /// Switch the active chain and announce it
    pub fn switch_chain(&self, chain_id: u64) {
        self.state().chain_id = chain_id;
        self.emit(WalletEvent::ChainChanged(chain_id));
    }

    /// Push an event into the authority stream, attributed to the current session
    pub fn emit(&self, event: WalletEvent) {
        let session = self.state().session;
        self.emit_for(session, event);
    }

    fn emit_for(&self, session: Option<Uuid>, event: WalletEvent) {
        if self.events_tx.try_send(AuthorityEvent::new(session, event)).is_err() {
            debug!("mock event stream full or closed, event discarded");
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_connected(&self) -> Result<(), AuthorityError> {
        if self.state().connected {
            Ok(())
        } else {
            Err(AuthorityError::Unavailable("wallet is not connected".to_string()))
        }
    }

    fn ensure_chain(&self, chain_id: u64) -> Result<(), AuthorityError> {
        if self.networks.iter().any(|network| network.chain_id == chain_id) {
            Ok(())
        } else {
            Err(AuthorityError::Rpc {
                code: INVALID_PARAMS_CODE,
                message: format!("unsupported chain {chain_id}"),
            })
        }
    }

    /// Sign a prehash with `key`, wrapped for ERC-6492 when asked or when the
    /// wallet isn't deployed on `chain_id`
    fn sign_digest(
        &self,
        key: &PrivateKeySigner,
        digest: B256,
        chain_id: u64,
        counterfactual: bool,
    ) -> Result<Bytes, AuthorityError> {
        let signature = key
            .sign_hash_sync(&digest)
            .map_err(|e| AuthorityError::Unavailable(e.to_string()))?;
        let raw = signature.as_bytes();
        if counterfactual || !self.is_deployed(chain_id) {
            Ok(wrap_counterfactual(&self.context, key.address(), &raw))
        } else {
            Ok(Bytes::copy_from_slice(&raw))
        }
    }

    fn check_request(&self, request: &SignatureRequest, digest: B256) -> Result<(), AuthorityError> {
        self.ensure_connected()?;
        self.ensure_chain(request.chain_id)?;
        if self.state().decline_signatures {
            return Err(AuthorityError::Declined("user rejected the request".to_string()));
        }
        if request.payload_digest != digest {
            return Err(AuthorityError::Rpc {
                code: INVALID_PARAMS_CODE,
                message: "payload digest does not match payload".to_string(),
            });
        }
        Ok(())
    }

    fn issue_proof(&self, app: &str, chain_id: u64) -> Result<ConnectProof, AuthorityError> {
        let invalid = |e: crate::error::ProofError| AuthorityError::InvalidResponse(e.to_string());
        let mut proof = AuthProof::new(
            self.address,
            Claims::new(app),
            Utc::now().timestamp(),
            PROOF_TTL_SECS,
        )
        .map_err(invalid)?;
        let digest = proof.digest().map_err(invalid)?;

        let key = if self.state().forge_proofs {
            PrivateKeySigner::random()
        } else {
            self.owner.clone()
        };
        proof.signature = Some(self.sign_digest(&key, digest, chain_id, false)?);
        Ok(ConnectProof {
            proof_string: encode_proof(&proof).map_err(invalid)?,
        })
    }

    fn approve(&self, options: &ConnectOptions) -> Result<ConnectDetails, AuthorityError> {
        let session = Uuid::new_v4();
        let chain_id = {
            let mut state = self.state();
            state.connected = true;
            state.session = Some(session);
            state.chain_id
        };
        let proof = if options.authorize {
            Some(self.issue_proof(&options.app, chain_id)?)
        } else {
            None
        };
        let details = ConnectDetails {
            connected: true,
            address: Some(self.address),
            chain_id: Some(chain_id),
            session: Some(session),
            proof,
            error: None,
        };
        self.emit(WalletEvent::Connect(details.clone()));
        if options.keep_wallet_opened {
            self.emit(WalletEvent::WalletOpened);
        }
        Ok(details)
    }
}

#[async_trait]
impl WalletAuthority for MockAuthority {
    async fn connect(&self, options: &ConnectOptions) -> Result<ConnectDetails, AuthorityError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.state().behavior.clone();
        match behavior {
            ConnectBehavior::Approve => self.approve(options),
            ConnectBehavior::Reject(reason) => Err(AuthorityError::Declined(reason)),
            ConnectBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.approve(options)
            }
            ConnectBehavior::Pending => std::future::pending().await,
        }
    }

    async fn disconnect(&self) -> Result<(), AuthorityError> {
        let ended = {
            let mut state = self.state();
            state.connected = false;
            state.session.take()
        };
        if ended.is_some() {
            self.emit_for(ended, WalletEvent::Disconnect(None));
        }
        Ok(())
    }

    async fn open_wallet(
        &self,
        _path: Option<&str>,
        _intent: Option<&OpenWalletIntent>,
    ) -> Result<bool, AuthorityError> {
        self.ensure_connected()?;
        self.emit(WalletEvent::WalletOpened);
        Ok(true)
    }

    async fn close_wallet(&self) -> Result<(), AuthorityError> {
        self.emit(WalletEvent::WalletClosed);
        Ok(())
    }

    async fn get_address(&self) -> Result<Address, AuthorityError> {
        Ok(self.address)
    }

    async fn get_chain_id(&self) -> Result<u64, AuthorityError> {
        Ok(self.state().chain_id)
    }

    async fn get_networks(&self) -> Result<Vec<Network>, AuthorityError> {
        Ok(self.networks.clone())
    }

    async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, AuthorityError> {
        self.ensure_chain(chain_id)?;
        Ok(self.balance_of(chain_id, address))
    }

    async fn get_wallet_state(&self, chain_id: u64) -> Result<WalletState, AuthorityError> {
        self.ensure_chain(chain_id)?;
        Ok(WalletState {
            chain_id,
            address: self.address,
            deployed: self.is_deployed(chain_id),
        })
    }

    async fn sign_message(
        &self,
        request: &SignatureRequest,
        message: &[u8],
    ) -> Result<Bytes, AuthorityError> {
        self.check_request(request, personal_digest(message))?;
        self.sign_digest(
            &self.owner,
            request.payload_digest,
            request.chain_id,
            request.counterfactual,
        )
    }

    async fn sign_typed_data(
        &self,
        request: &SignatureRequest,
        typed_data: &TypedData,
    ) -> Result<Bytes, AuthorityError> {
        let digest = typed_data::signing_hash(typed_data).map_err(|e| AuthorityError::Rpc {
            code: INVALID_PARAMS_CODE,
            message: e.to_string(),
        })?;
        self.check_request(request, digest)?;
        self.sign_digest(
            &self.owner,
            request.payload_digest,
            request.chain_id,
            request.counterfactual,
        )
    }

    async fn send_transaction_batch(
        &self,
        chain_id: u64,
        intents: &[TransactionIntent],
    ) -> Result<B256, AuthorityError> {
        self.ensure_connected()?;
        self.ensure_chain(chain_id)?;

        let mut state = self.state();
        let mut total = U256::ZERO;
        for intent in intents {
            total = total
                .checked_add(intent.value)
                .ok_or(AuthorityError::InsufficientFunds)?;
        }
        let balance = state
            .balances
            .get(&(chain_id, self.address))
            .copied()
            .unwrap_or_default();
        if balance < total {
            return Err(AuthorityError::InsufficientFunds);
        }

        state.nonce += 1;
        let mut preimage = chain_id.to_be_bytes().to_vec();
        preimage.extend_from_slice(&state.nonce.to_be_bytes());
        preimage.extend_from_slice(self.address.as_slice());
        let tx_hash = keccak256(preimage);

        let failing = intents
            .iter()
            .enumerate()
            .find_map(|(index, intent)| {
                state
                    .revert_rules
                    .get(&intent.to)
                    .map(|reason| (index, reason.clone()))
            });

        let outcomes = match failing {
            Some((failed_at, reason)) => intents
                .iter()
                .enumerate()
                .map(|(index, _)| IntentOutcome {
                    success: index < failed_at,
                    return_data: if index == failed_at {
                        Bytes::from(
                            Revert {
                                reason: reason.clone(),
                            }
                            .abi_encode(),
                        )
                    } else {
                        Bytes::new()
                    },
                })
                .collect(),
            None => {
                state.balances.insert((chain_id, self.address), balance - total);
                for intent in intents {
                    let credited = state
                        .balances
                        .entry((chain_id, intent.to))
                        .or_insert(U256::ZERO);
                    *credited = credited.saturating_add(intent.value);
                }
                state.deployed.insert(chain_id);
                intents
                    .iter()
                    .map(|_| IntentOutcome {
                        success: true,
                        return_data: Bytes::new(),
                    })
                    .collect()
            }
        };

        state.receipts.insert(
            tx_hash,
            TransactionBatchResult {
                tx_hash,
                per_intent_outcome: outcomes,
            },
        );
        Ok(tx_hash)
    }

    async fn wait_for_batch(
        &self,
        _chain_id: u64,
        tx_hash: B256,
    ) -> Result<TransactionBatchResult, AuthorityError> {
        let delay = self.state().confirmation_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| AuthorityError::Rpc {
                code: INVALID_PARAMS_CODE,
                message: format!("unknown transaction {tx_hash}"),
            })
    }

    async fn estimate_gas(
        &self,
        chain_id: u64,
        intent: &TransactionIntent,
    ) -> Result<U256, AuthorityError> {
        self.ensure_chain(chain_id)?;
        if let Some(reason) = self.state().revert_rules.get(&intent.to) {
            return Err(AuthorityError::Reverted {
                index: 0,
                reason: reason.clone(),
            });
        }
        let data_gas = GAS_PER_DATA_BYTE * intent.data.len() as u64;
        Ok(U256::from(BASE_GAS + data_gas))
    }

    fn take_event_receiver(&self) -> Option<mpsc::Receiver<AuthorityEvent>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

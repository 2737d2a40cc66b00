/*
[INPUT]:  Connect options, cancellation tokens and authority events
[OUTPUT]: Session lifecycle (connect/disconnect/open/close) and re-published events
[POS]:    Session layer - connection state machine
[UPDATE]: When lifecycle transitions, coalescing or event handling change
*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use alloy_primitives::Address;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authority::{AuthorityError, WalletAuthority};
use crate::error::{ConnectionError, Result, SessionError, WalletError};
use crate::proof::AuthProofProtocol;
use crate::session::events::{EventBus, EventSubscription};
use crate::types::{
    AuthorityEvent, ConnectDetails, ConnectOptions, OpenWalletIntent, Session, SessionState,
    WalletEvent, WalletVisibility,
};

const USER_REJECTED_CODE: i64 = 4001;

type ConnectOutcome = Option<Result<ConnectDetails>>;

/// The connect attempt currently running, shared with coalesced callers
struct InFlight {
    options: ConnectOptions,
    outcome: watch::Receiver<ConnectOutcome>,
}

enum ConnectRole {
    Leader {
        outcome: watch::Sender<ConnectOutcome>,
        prior: Session,
    },
    Follower(watch::Receiver<ConnectOutcome>),
}

/// Owns the session with the wallet authority
pub struct WalletSession {
    authority: Arc<dyn WalletAuthority>,
    proofs: AuthProofProtocol,
    session: RwLock<Session>,
    in_flight: Mutex<Option<InFlight>>,
    events: EventBus,
    authority_events: tokio::sync::Mutex<Option<mpsc::Receiver<AuthorityEvent>>>,
    connect_timeout: Duration,
}

impl WalletSession {
    pub fn new(
        authority: Arc<dyn WalletAuthority>,
        proofs: AuthProofProtocol,
        connect_timeout: Duration,
        event_buffer: usize,
    ) -> Self {
        let authority_events = authority.take_event_receiver();
        if authority_events.is_none() {
            debug!("authority event stream already taken, events will not be relayed");
        }
        Self {
            authority,
            proofs,
            session: RwLock::new(Session::disconnected(0)),
            in_flight: Mutex::new(None),
            events: EventBus::new(event_buffer),
            authority_events: tokio::sync::Mutex::new(authority_events),
            connect_timeout,
        }
    }

    /// Connect to the authority.
    ///
    /// Calls made while an identical attempt is in flight share its outcome; calls
    /// with different options fail with [`SessionError::AlreadyConnecting`].
    pub async fn connect(&self, options: ConnectOptions) -> Result<ConnectDetails> {
        match self.begin_connect(&options)? {
            ConnectRole::Follower(outcome) => {
                debug!(app = %options.app, "joining in-flight connect");
                wait_for_leader(outcome).await
            }
            ConnectRole::Leader { outcome, prior } => {
                let guard = ConnectGuard {
                    session: self,
                    prior,
                    outcome: Some(outcome),
                };
                let result = self.run_connect(&options).await;
                guard.finish(&result);
                result
            }
        }
    }

    /// [`Self::connect`] that gives up when `cancel` fires, restoring the prior state
    pub async fn connect_with_cancel(
        &self,
        options: ConnectOptions,
        cancel: CancellationToken,
    ) -> Result<ConnectDetails> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(app = %options.app, "connect cancelled by caller");
                Err(ConnectionError::Cancelled.into())
            }
            result = self.connect(options.clone()) => result,
        }
    }

    /// Drop the session. Safe to call in any state.
    pub async fn disconnect(&self) {
        let had_session = {
            let mut session = self.write_session();
            let had_session = session.state != SessionState::Disconnected;
            if had_session {
                *session = Session::disconnected(session.generation + 1);
            }
            had_session
        };
        if !had_session {
            debug!("disconnect on idle session");
            return;
        }

        info!("session disconnected");
        if let Err(e) = self.authority.disconnect().await {
            warn!(error = %e, "authority disconnect failed");
        }
    }

    /// Open the wallet window; returns whether the authority opened it
    pub async fn open_wallet(
        &self,
        path: Option<&str>,
        intent: Option<&OpenWalletIntent>,
    ) -> Result<bool> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected.into());
        }

        let opened = self.authority.open_wallet(path, intent).await?;
        if opened {
            let mut session = self.write_session();
            if session.state.is_connected() {
                session.wallet = WalletVisibility::Open;
            }
        }
        debug!(path = ?path, opened, "open wallet requested");
        Ok(opened)
    }

    /// Close the wallet window. Safe to call when already closed.
    pub async fn close_wallet(&self) {
        let was_open = {
            let mut session = self.write_session();
            let was_open = session.wallet == WalletVisibility::Open;
            session.wallet = WalletVisibility::Closed;
            was_open
        };
        if was_open && let Err(e) = self.authority.close_wallet().await {
            warn!(error = %e, "authority close wallet failed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.read_session().state.is_connected()
    }

    pub fn is_wallet_open(&self) -> bool {
        self.read_session().wallet == WalletVisibility::Open
    }

    pub fn state(&self) -> SessionState {
        self.read_session().state
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.read_session().clone()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    /// Relay authority events until the authority stream ends.
    ///
    /// Returns the number of events relayed. Only one relay runs at a time.
    pub async fn dispatch_events(&self) -> usize {
        let mut receiver = self.authority_events.lock().await;
        let Some(rx) = receiver.as_mut() else {
            return 0;
        };
        let mut relayed = 0;
        while let Some(event) = rx.recv().await {
            self.relay(event);
            relayed += 1;
        }
        debug!(relayed, "authority event stream ended");
        relayed
    }

    /// Relay whatever authority events are already queued, without waiting
    pub fn dispatch_pending(&self) -> usize {
        let Ok(mut receiver) = self.authority_events.try_lock() else {
            return 0;
        };
        let Some(rx) = receiver.as_mut() else {
            return 0;
        };
        let mut relayed = 0;
        while let Ok(event) = rx.try_recv() {
            self.relay(event);
            relayed += 1;
        }
        relayed
    }

    fn relay(&self, incoming: AuthorityEvent) {
        self.apply_event(&incoming);
        let event = incoming.event;
        let delivered = self.events.publish(&event);
        debug!(event = event.name(), delivered, "wallet event relayed");
    }

    /// Apply an authority event to the session it was raised for; events from an
    /// earlier session are only re-published
    fn apply_event(&self, incoming: &AuthorityEvent) {
        let mut session = self.write_session();
        if !incoming.belongs_to(session.session_id) {
            debug!(
                event = incoming.event.name(),
                session = ?incoming.session,
                "event from an earlier session, state left unchanged"
            );
            return;
        }
        match &incoming.event {
            WalletEvent::AccountsChanged(accounts) if session.state.is_connected() => {
                match accounts.first() {
                    Some(address) => {
                        session.address = Some(*address);
                        session.generation += 1;
                        info!(%address, "active account changed");
                    }
                    None => {
                        *session = Session::disconnected(session.generation + 1);
                        info!("authority dropped all accounts, session disconnected");
                    }
                }
            }
            WalletEvent::ChainChanged(chain_id) if session.state.is_connected() => {
                session.active_chain_id = Some(*chain_id);
                session.generation += 1;
                info!(chain_id, "active chain changed");
            }
            WalletEvent::Disconnect(reason) if session.state != SessionState::Disconnected => {
                *session = Session::disconnected(session.generation + 1);
                info!(reason = ?reason, "authority ended the session");
            }
            WalletEvent::WalletOpened if session.state.is_connected() => {
                session.wallet = WalletVisibility::Open;
            }
            WalletEvent::WalletClosed => {
                session.wallet = WalletVisibility::Closed;
            }
            _ => {}
        }
    }

    fn begin_connect(&self, options: &ConnectOptions) -> Result<ConnectRole> {
        let mut in_flight = lock(&self.in_flight);
        if let Some(current) = in_flight.as_ref() {
            if current.options == *options {
                return Ok(ConnectRole::Follower(current.outcome.clone()));
            }
            return Err(SessionError::AlreadyConnecting.into());
        }

        let (tx, rx) = watch::channel(None);
        *in_flight = Some(InFlight {
            options: options.clone(),
            outcome: rx,
        });

        let mut session = self.write_session();
        let prior = session.clone();
        session.state = SessionState::Connecting;
        info!(app = %options.app, authorize = options.authorize, "connecting");
        Ok(ConnectRole::Leader { outcome: tx, prior })
    }

    async fn run_connect(&self, options: &ConnectOptions) -> Result<ConnectDetails> {
        let millis = u64::try_from(self.connect_timeout.as_millis()).unwrap_or(u64::MAX);
        let details = tokio::time::timeout(self.connect_timeout, self.handshake(options))
            .await
            .map_err(|_| {
                warn!(millis, "connect timed out");
                WalletError::from(ConnectionError::Timeout { millis })
            })??;

        let (Some(address), Some(chain_id)) = (details.address, details.chain_id) else {
            return Err(ConnectionError::Rejected("authority returned no account".to_string()).into());
        };

        let authorization = if options.authorize {
            Some(self.check_proof(&details, address, chain_id))
        } else {
            None
        };
        let authorized = matches!(authorization, Some(Ok(())));

        {
            let mut session = self.write_session();
            if session.state != SessionState::Connecting {
                return Err(ConnectionError::Cancelled.into());
            }
            session.state = if authorized {
                SessionState::ConnectedAuthorized
            } else {
                SessionState::Connected
            };
            session.session_id = Some(details.session.unwrap_or_else(Uuid::new_v4));
            session.address = Some(address);
            session.active_chain_id = Some(chain_id);
            if options.keep_wallet_opened {
                session.wallet = WalletVisibility::Open;
            }
        }
        info!(%address, chain_id, authorized, "session connected");

        if let Some(Err(reason)) = authorization {
            warn!(%address, reason = %reason, "connect proof rejected, session left unauthorized");
            return Err(ConnectionError::InvalidProof { reason }.into());
        }
        Ok(details)
    }

    /// Authority round trip; fills address/chain from follow-up queries when omitted
    async fn handshake(&self, options: &ConnectOptions) -> Result<ConnectDetails> {
        let mut details = self
            .authority
            .connect(options)
            .await
            .map_err(connect_error)?;
        if !details.connected {
            let reason = details
                .error
                .clone()
                .unwrap_or_else(|| "connection declined".to_string());
            return Err(ConnectionError::Rejected(reason).into());
        }
        if details.address.is_none() {
            details.address = Some(self.authority.get_address().await.map_err(connect_error)?);
        }
        if details.chain_id.is_none() {
            details.chain_id = Some(self.authority.get_chain_id().await.map_err(connect_error)?);
        }
        Ok(details)
    }

    fn check_proof(
        &self,
        details: &ConnectDetails,
        address: Address,
        chain_id: u64,
    ) -> std::result::Result<(), String> {
        let proof = details
            .proof
            .as_ref()
            .ok_or_else(|| "authority returned no proof".to_string())?;
        let decoded = self
            .proofs
            .verify_proof_string(&proof.proof_string, chain_id)
            .map_err(|e| e.to_string())?;
        if decoded.address != address {
            return Err(format!(
                "proof is for {} but session address is {}",
                decoded.address, address
            ));
        }
        Ok(())
    }

    fn restore_if_connecting(&self, prior: &Session) {
        let mut session = self.write_session();
        if session.state == SessionState::Connecting {
            *session = prior.clone();
            debug!(state = ?prior.state, "connect abandoned, prior session restored");
        }
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSession")
            .field("session", &*self.read_session())
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

/// Settles the leader's attempt exactly once, also when its future is dropped
struct ConnectGuard<'a> {
    session: &'a WalletSession,
    prior: Session,
    outcome: Option<watch::Sender<ConnectOutcome>>,
}

impl ConnectGuard<'_> {
    fn finish(mut self, result: &Result<ConnectDetails>) {
        self.settle(Some(result));
    }

    fn settle(&mut self, result: Option<&Result<ConnectDetails>>) {
        let Some(outcome) = self.outcome.take() else {
            return;
        };
        self.session.restore_if_connecting(&self.prior);
        lock(&self.session.in_flight).take();
        if let Some(result) = result {
            outcome.send_replace(Some(result.clone()));
        }
    }
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        // Unsettled here means the leader was cancelled; followers see a closed channel
        self.settle(None);
    }
}

async fn wait_for_leader(mut outcome: watch::Receiver<ConnectOutcome>) -> Result<ConnectDetails> {
    loop {
        if let Some(result) = outcome.borrow_and_update().clone() {
            return result;
        }
        if outcome.changed().await.is_err() {
            return outcome
                .borrow()
                .clone()
                .unwrap_or_else(|| Err(ConnectionError::Cancelled.into()));
        }
    }
}

fn connect_error(err: AuthorityError) -> WalletError {
    match err {
        AuthorityError::Declined(reason) => ConnectionError::Rejected(reason).into(),
        AuthorityError::Rpc { code, message } if code == USER_REJECTED_CODE => {
            ConnectionError::Rejected(message).into()
        }
        other => other.into(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

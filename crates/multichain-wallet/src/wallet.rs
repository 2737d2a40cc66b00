/*
[INPUT]:  WalletConfig and a WalletAuthority
[OUTPUT]: One wired client: registry, session, resolver, signing, proofs, batches
[POS]:    Facade layer - composition root for a wallet session
[UPDATE]: When components are added or their wiring changes
*/

use std::sync::Arc;

use alloy_dyn_abi::TypedData;
use alloy_primitives::{Address, Bytes, U256};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::authority::{RemoteAuthority, WalletAuthority};
use crate::batch::{BatchOptions, TransactionBatcher};
use crate::config::WalletConfig;
use crate::error::{Result, SessionError, WalletError};
use crate::proof::{AuthProof, AuthProofProtocol, Claims};
use crate::registry::ChainRegistry;
use crate::session::{EventSubscription, WalletSession};
use crate::signing::{MessageInput, SignatureValidator, SignerResolver, SigningProtocol};
use crate::types::{
    ConnectDetails, ConnectOptions, Network, OpenWalletIntent, Signer, TransactionBatchResult,
    TransactionIntent, WalletState,
};

/// Multi-chain wallet client
pub struct Wallet {
    config: WalletConfig,
    authority: Arc<dyn WalletAuthority>,
    registry: Arc<ChainRegistry>,
    session: Arc<WalletSession>,
    resolver: SignerResolver,
    signing: SigningProtocol,
    proofs: AuthProofProtocol,
    batcher: TransactionBatcher,
}

impl Wallet {
    /// Wire every component around `authority`
    pub fn new(config: WalletConfig, authority: Arc<dyn WalletAuthority>) -> Result<Self> {
        config.validate()?;

        let registry = if config.networks.is_empty() {
            ChainRegistry::empty()
        } else {
            ChainRegistry::from_networks(config.networks.clone())?
        };
        let registry = Arc::new(registry);

        let validator = SignatureValidator::new(registry.clone(), config.wallet_context);
        let signing = SigningProtocol::new(authority.clone(), validator);
        let proofs = AuthProofProtocol::new(signing.clone(), config.proof_clock_skew());
        let session = Arc::new(WalletSession::new(
            authority.clone(),
            proofs.clone(),
            config.connect_timeout(),
            config.event_buffer,
        ));
        let resolver = SignerResolver::new(session.clone(), registry.clone());
        let batcher = TransactionBatcher::new(
            authority.clone(),
            config.estimate_timeout(),
            config.confirmation_timeout(),
        );

        Ok(Self {
            config,
            authority,
            registry,
            session,
            resolver,
            signing,
            proofs,
            batcher,
        })
    }

    /// Client talking to the wallet bridge configured under `remote`
    pub fn remote(config: WalletConfig) -> Result<Self> {
        let remote = config
            .remote
            .as_ref()
            .ok_or_else(|| WalletError::Config("remote section is missing".to_string()))?;
        let authority = Arc::new(RemoteAuthority::new(remote)?);
        Self::new(config, authority)
    }

    /// Load the network table from the authority unless one was configured
    pub async fn init(&self) -> Result<usize> {
        let count = if self.registry.is_empty() {
            self.registry.refresh(self.authority.as_ref()).await?
        } else {
            self.registry.list_networks().len()
        };
        info!(app = %self.config.app_name, networks = count, "wallet initialized");
        Ok(count)
    }

    /// Re-fetch the network table
    pub async fn refresh_networks(&self) -> Result<usize> {
        self.registry.refresh(self.authority.as_ref()).await
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn resolver(&self) -> &SignerResolver {
        &self.resolver
    }

    pub fn signing(&self) -> &SigningProtocol {
        &self.signing
    }

    pub fn proofs(&self) -> &AuthProofProtocol {
        &self.proofs
    }

    pub fn batcher(&self) -> &TransactionBatcher {
        &self.batcher
    }

    /// Connect options prefilled with the configured app name
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(&self.config.app_name)
    }

    pub async fn connect(&self, options: ConnectOptions) -> Result<ConnectDetails> {
        self.session.connect(options).await
    }

    pub async fn connect_with_cancel(
        &self,
        options: ConnectOptions,
        cancel: CancellationToken,
    ) -> Result<ConnectDetails> {
        self.session.connect_with_cancel(options, cancel).await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await
    }

    pub async fn open_wallet(
        &self,
        path: Option<&str>,
        intent: Option<&OpenWalletIntent>,
    ) -> Result<bool> {
        self.session.open_wallet(path, intent).await
    }

    pub async fn close_wallet(&self) {
        self.session.close_wallet().await
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub fn is_wallet_open(&self) -> bool {
        self.session.is_wallet_open()
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.session.subscribe()
    }

    pub fn get_signer(&self, chain_id: Option<u64>) -> Result<Signer> {
        self.resolver.resolve(chain_id)
    }

    pub fn get_address(&self) -> Result<Address> {
        self.session
            .snapshot()
            .address
            .ok_or_else(|| SessionError::NotConnected.into())
    }

    /// Active chain of the session
    pub fn get_chain_id(&self) -> Result<u64> {
        Ok(self.resolver.resolve(None)?.chain_id)
    }

    pub fn get_networks(&self) -> Vec<Network> {
        self.registry.list_networks()
    }

    /// Wallet balance on `chain_id` (active chain when `None`)
    pub async fn get_balance(&self, chain_id: Option<u64>) -> Result<U256> {
        let signer = self.resolver.resolve(chain_id)?;
        Ok(self
            .authority
            .get_balance(signer.chain_id, signer.address)
            .await?)
    }

    /// Deployment status of the session wallet on `chain_id` (active chain when `None`)
    pub async fn get_wallet_state(&self, chain_id: Option<u64>) -> Result<WalletState> {
        let signer = self.resolver.resolve(chain_id)?;
        Ok(self.authority.get_wallet_state(signer.chain_id).await?)
    }

    pub async fn sign_message(
        &self,
        chain_id: Option<u64>,
        message: &MessageInput,
        counterfactual: bool,
    ) -> Result<Bytes> {
        let signer = self.resolver.resolve(chain_id)?;
        self.signing
            .sign_message_input(&signer, message, counterfactual)
            .await
    }

    pub async fn sign_typed_data(
        &self,
        chain_id: Option<u64>,
        typed_data: &TypedData,
        counterfactual: bool,
    ) -> Result<Bytes> {
        let signer = self.resolver.resolve(chain_id)?;
        self.signing
            .sign_typed_data(&signer, typed_data, counterfactual)
            .await
    }

    pub fn verify_message_signature(
        &self,
        address: Address,
        message: &MessageInput,
        signature: &[u8],
        chain_id: u64,
    ) -> bool {
        self.signing
            .verify_message_input(address, message, signature, chain_id)
    }

    pub fn verify_typed_data_signature(
        &self,
        address: Address,
        typed_data: &TypedData,
        signature: &[u8],
        chain_id: u64,
    ) -> bool {
        self.signing
            .verify_typed_data_signature(address, typed_data, signature, chain_id)
    }

    /// Build and sign a proof for the connected address.
    ///
    /// `ttl_seconds` falls back to `default_proof_ttl_secs`.
    pub async fn issue_proof(
        &self,
        claims: Claims,
        ttl_seconds: Option<i64>,
        chain_id: Option<u64>,
    ) -> Result<AuthProof> {
        let signer = self.resolver.resolve(chain_id)?;
        let ttl = ttl_seconds.unwrap_or(self.config.default_proof_ttl_secs);
        let proof = self.proofs.build_proof(signer.address, claims, ttl)?;
        self.proofs.sign_proof(proof, &signer, false).await
    }

    pub async fn estimate_gas(
        &self,
        chain_id: Option<u64>,
        intent: &TransactionIntent,
    ) -> Result<U256> {
        let signer = self.resolver.resolve(chain_id)?;
        self.batcher.estimate_gas(&signer, intent).await
    }

    pub async fn send_batch(
        &self,
        chain_id: Option<u64>,
        intents: Vec<TransactionIntent>,
        options: BatchOptions,
    ) -> Result<TransactionBatchResult> {
        let signer = self.resolver.resolve(chain_id)?;
        self.batcher.send_batch(&signer, intents, options).await
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

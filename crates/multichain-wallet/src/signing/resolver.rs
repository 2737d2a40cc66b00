/*
[INPUT]:  Optional chain id, current session snapshot and chain registry
[OUTPUT]: Signer handles bound to a registered chain
[POS]:    Signing layer - per-chain signer routing with session-scoped cache
[UPDATE]: When routing rules or cache invalidation change
*/

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;
use uuid::Uuid;

use crate::error::{ChainError, Result, SessionError};
use crate::registry::ChainRegistry;
use crate::session::WalletSession;
use crate::types::Signer;

#[derive(Debug, Default)]
struct SignerCache {
    generation: u64,
    signers: HashMap<(Uuid, u64), Signer>,
}

/// Hands out signers for the connected session
#[derive(Debug)]
pub struct SignerResolver {
    session: Arc<WalletSession>,
    registry: Arc<ChainRegistry>,
    cache: RwLock<SignerCache>,
}

impl SignerResolver {
    pub fn new(session: Arc<WalletSession>, registry: Arc<ChainRegistry>) -> Self {
        Self {
            session,
            registry,
            cache: RwLock::new(SignerCache::default()),
        }
    }

    /// Signer for `chain_id`, or for the active (else default) chain when `None`
    pub fn resolve(&self, chain_id: Option<u64>) -> Result<Signer> {
        let session = self.session.snapshot();
        let (Some(session_id), Some(address)) = (session.session_id, session.address) else {
            return Err(SessionError::NotConnected.into());
        };
        if !session.state.is_connected() {
            return Err(SessionError::NotConnected.into());
        }

        let chain_id = match chain_id.or(session.active_chain_id) {
            Some(chain_id) => chain_id,
            None => self.registry.default_network()?.chain_id,
        };
        if !self.registry.contains(chain_id) {
            return Err(ChainError::UnknownChain(chain_id).into());
        }

        let key = (session_id, chain_id);
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if cache.generation == session.generation
                && let Some(signer) = cache.signers.get(&key)
            {
                debug!(chain_id, "signer cache hit");
                return Ok(*signer);
            }
        }

        let signer = Signer {
            chain_id,
            address,
            session_id,
        };
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.generation != session.generation {
            debug!(
                from = cache.generation,
                to = session.generation,
                "session changed, signer cache dropped"
            );
            cache.signers.clear();
            cache.generation = session.generation;
        }
        cache.signers.insert(key, signer);
        Ok(signer)
    }

    /// Number of cached signers for the current generation
    pub fn cached(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        if cache.generation == self.session.snapshot().generation {
            cache.signers.len()
        } else {
            0
        }
    }
}

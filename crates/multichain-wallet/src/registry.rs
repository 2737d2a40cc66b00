/*
[INPUT]:  Network tables from the authority or static configuration
[OUTPUT]: Read-only, atomically refreshable view of supported networks
[POS]:    Registry layer - leaf component every other part depends on
[UPDATE]: When network validation rules or ordering change
*/

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use url::Url;

use crate::authority::WalletAuthority;
use crate::error::{ChainError, Result};
use crate::types::Network;

/// Table of supported networks, default network first
#[derive(Debug)]
pub struct ChainRegistry {
    networks: ArcSwap<Vec<Network>>,
}

impl ChainRegistry {
    /// Empty registry, to be filled by [`ChainRegistry::refresh`]
    pub fn empty() -> Self {
        Self {
            networks: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Registry from a static table
    pub fn from_networks(networks: Vec<Network>) -> Result<Self> {
        let networks = validate(networks)?;
        Ok(Self {
            networks: ArcSwap::from_pointee(networks),
        })
    }

    /// Re-fetch the table from the authority and swap it in as a whole.
    ///
    /// A failed fetch or an invalid table leaves the current table untouched.
    pub async fn refresh(&self, authority: &dyn WalletAuthority) -> Result<usize> {
        let fetched = authority.get_networks().await?;
        let networks = validate(fetched)?;
        let count = networks.len();
        self.networks.store(Arc::new(networks));
        info!(network_count = count, "network registry refreshed");
        Ok(count)
    }

    pub fn list_networks(&self) -> Vec<Network> {
        self.networks.load().as_ref().clone()
    }

    pub fn default_network(&self) -> Result<Network> {
        self.networks
            .load()
            .iter()
            .find(|network| network.is_default)
            .cloned()
            .ok_or_else(|| ChainError::NoDefaultNetwork.into())
    }

    pub fn by_chain_id(&self, chain_id: u64) -> Option<Network> {
        self.networks
            .load()
            .iter()
            .find(|network| network.chain_id == chain_id)
            .cloned()
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.networks
            .load()
            .iter()
            .any(|network| network.chain_id == chain_id)
    }

    pub fn is_empty(&self) -> bool {
        self.networks.load().is_empty()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

fn validate(networks: Vec<Network>) -> std::result::Result<Vec<Network>, ChainError> {
    let mut seen = HashSet::new();
    for network in &networks {
        if network.chain_id == 0 {
            return Err(ChainError::InvalidNetwork(format!(
                "{} has chain id 0",
                network.name
            )));
        }
        if !seen.insert(network.chain_id) {
            return Err(ChainError::InvalidNetwork(format!(
                "duplicate chain id {}",
                network.chain_id
            )));
        }
        Url::parse(&network.rpc_url).map_err(|e| {
            ChainError::InvalidNetwork(format!("{}: invalid rpc url: {e}", network.name))
        })?;
    }

    let defaults: Vec<u64> = networks
        .iter()
        .filter(|network| network.is_default)
        .map(|network| network.chain_id)
        .collect();
    if defaults.len() > 1 {
        return Err(ChainError::MultipleDefaults(defaults));
    }

    // Stable partition: default first, everything else keeps its order
    let (mut ordered, rest): (Vec<Network>, Vec<Network>) =
        networks.into_iter().partition(|network| network.is_default);
    ordered.extend(rest);
    Ok(ordered)
}

/*
[INPUT]:  Test configuration and mock authority/server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for multichain-wallet tests

#![allow(dead_code)]

use std::sync::Arc;

use multichain_wallet::{MockAuthority, Network, Wallet, WalletConfig};
use wiremock::MockServer;

pub const POLYGON: u64 = 137;
pub const MAINNET: u64 = 1;
pub const ARBITRUM: u64 = 42161;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Network table with polygon as default, listed second
pub fn test_networks() -> Vec<Network> {
    vec![
        Network::new(MAINNET, "mainnet", "https://eth.llamarpc.com"),
        Network::new(POLYGON, "polygon", "https://polygon-rpc.com").as_default(),
        Network::new(ARBITRUM, "arbitrum", "https://arb1.arbitrum.io/rpc"),
    ]
}

/// Config with short timeouts and no static networks
pub fn test_config() -> WalletConfig {
    WalletConfig {
        app_name: "wee".to_string(),
        connect_timeout_secs: 1,
        confirmation_timeout_secs: 2,
        estimate_timeout_secs: 1,
        ..WalletConfig::default()
    }
}

/// Initialized but not yet connected wallet over a mock authority
pub async fn setup_wallet() -> (Arc<MockAuthority>, Wallet) {
    let mock = Arc::new(MockAuthority::new(test_networks()));
    let wallet = Wallet::new(test_config(), mock.clone()).expect("wallet should build");
    wallet.init().await.expect("networks should load");
    (mock, wallet)
}

/// Wallet with an established (unauthorized) session and no queued events
pub async fn connected_wallet() -> (Arc<MockAuthority>, Wallet) {
    let (mock, wallet) = setup_wallet().await;
    wallet
        .connect(wallet.connect_options())
        .await
        .expect("connect should succeed");
    wallet.session().dispatch_pending();
    (mock, wallet)
}

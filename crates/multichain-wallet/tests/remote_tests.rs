/*
[INPUT]:  Mock wallet bridge (JSON-RPC over HTTP)
[OUTPUT]: Test results for the remote authority adapter
[POS]:    Integration tests - remote authority
[UPDATE]: When bridge methods or error mapping change
*/

mod common;

use common::{POLYGON, setup_mock_server, test_config};
use multichain_wallet::{
    AuthorityError, ConnectionError, RemoteAuthority, RemoteAuthorityConfig, SessionState,
    Wallet, WalletAuthority, WalletConfig, WalletError,
};
use serde_json::json;
use tokio_test::assert_ok;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WALLET: &str = "0x8ba1f109551bd432803012645ac136ddd64dba72";

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_failure(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

async fn mount(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

fn remote_config(server: &MockServer) -> WalletConfig {
    WalletConfig {
        remote: Some(RemoteAuthorityConfig::new(&server.uri())),
        ..test_config()
    }
}

#[test]
fn test_remote_requires_config_section() {
    let err = Wallet::remote(test_config()).unwrap_err();
    assert!(matches!(err, WalletError::Config(_)));
}

#[tokio::test]
async fn test_chain_id_and_networks() {
    let server = setup_mock_server().await;
    mount(&server, "eth_chainId", rpc_result(json!("0x89"))).await;
    mount(
        &server,
        "wallet_getNetworks",
        rpc_result(json!([
            { "chainId": 1, "name": "mainnet", "rpcUrl": "https://eth.llamarpc.com" },
            { "chainId": 137, "name": "polygon", "isDefaultChain": true, "rpcUrl": "https://polygon-rpc.com" }
        ])),
    )
    .await;

    let authority = assert_ok!(RemoteAuthority::new(&RemoteAuthorityConfig::new(&server.uri())));
    assert_eq!(assert_ok!(authority.get_chain_id().await), POLYGON);

    let wallet = assert_ok!(Wallet::remote(remote_config(&server)));
    assert_eq!(assert_ok!(wallet.init().await), 2);
    assert_eq!(assert_ok!(wallet.registry().default_network()).chain_id, POLYGON);
}

#[tokio::test]
async fn test_connect_through_bridge() {
    let server = setup_mock_server().await;
    mount(
        &server,
        "wallet_getNetworks",
        rpc_result(json!([
            { "chainId": 137, "name": "polygon", "isDefaultChain": true, "rpcUrl": "https://polygon-rpc.com" }
        ])),
    )
    .await;
    mount(
        &server,
        "wallet_connect",
        rpc_result(json!({
            "connected": true,
            "address": WALLET,
            "chainId": 137,
            "session": "6f1c2a1e-3f43-4a7e-9d59-2b8d7b9d3c10"
        })),
    )
    .await;

    let wallet = assert_ok!(Wallet::remote(remote_config(&server)));
    assert_ok!(wallet.init().await);
    let details = assert_ok!(wallet.connect(wallet.connect_options()).await);

    assert_eq!(details.chain_id, Some(POLYGON));
    assert_eq!(wallet.session().state(), SessionState::Connected);
    let signer = assert_ok!(wallet.get_signer(None));
    assert_eq!(format!("{:#x}", signer.address), WALLET);
}

#[tokio::test]
async fn test_user_rejection_maps_to_rejected() {
    let server = setup_mock_server().await;
    mount(&server, "wallet_connect", rpc_failure(4001, "User rejected the request")).await;

    let wallet = assert_ok!(Wallet::remote(remote_config(&server)));
    let err = wallet.connect(wallet.connect_options()).await.unwrap_err();
    assert_eq!(
        err,
        WalletError::Connection(ConnectionError::Rejected(
            "User rejected the request".to_string()
        ))
    );
    assert_eq!(wallet.session().state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = setup_mock_server().await;
    mount(&server, "wallet_getNetworks", ResponseTemplate::new(503)).await;

    let authority = assert_ok!(RemoteAuthority::new(&RemoteAuthorityConfig::new(&server.uri())));
    let err = authority.get_networks().await.unwrap_err();
    assert!(matches!(err, AuthorityError::Unavailable(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_result() {
    let server = setup_mock_server().await;
    mount(&server, "eth_accounts", rpc_result(json!("not a list"))).await;

    let authority = assert_ok!(RemoteAuthority::new(&RemoteAuthorityConfig::new(&server.uri())));
    assert!(matches!(
        authority.get_address().await,
        Err(AuthorityError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_wallet_state_from_bridge() {
    let server = setup_mock_server().await;
    mount(
        &server,
        "wallet_getWalletState",
        rpc_result(json!({ "chainId": 137, "address": WALLET, "deployed": true })),
    )
    .await;

    let authority = assert_ok!(RemoteAuthority::new(&RemoteAuthorityConfig::new(&server.uri())));
    let state = assert_ok!(authority.get_wallet_state(POLYGON).await);
    assert_eq!(state.chain_id, POLYGON);
    assert!(state.deployed);
    assert_eq!(format!("{:#x}", state.address), WALLET);
}

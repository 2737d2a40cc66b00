/*
[INPUT]:  Connected mock wallet with balances and revert rules
[OUTPUT]: Test results for gas estimation and atomic batch submission
[POS]:    Integration tests - batch layer
[UPDATE]: When batch pre-flight or result handling change
*/

mod common;

use std::time::Duration;

use alloy_primitives::{Address, U256, address, bytes};
use common::{POLYGON, connected_wallet};
use multichain_wallet::{
    BatchOptions, Remediation, TransactionError, TransactionIntent, WalletError,
};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const WMATIC: Address = address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270");

fn submit_only() -> BatchOptions {
    BatchOptions {
        estimate_gas: false,
        check_balance: true,
    }
}

#[tokio::test]
async fn test_estimate_withdraw() {
    let (_mock, wallet) = connected_wallet().await;
    // withdraw(uint256) selector plus one word
    let withdraw = TransactionIntent::call(
        WMATIC,
        bytes!("2e1a7d4d0000000000000000000000000000000000000000000000000de0b6b3a7640000"),
    );

    let gas = assert_ok!(wallet.estimate_gas(None, &withdraw).await);
    assert_eq!(gas, U256::from(21_000 + 16 * 36));
}

#[tokio::test]
async fn test_batch_executes_in_order() {
    let (mock, wallet) = connected_wallet().await;
    let alice = Address::repeat_byte(0xa1);
    let bob = Address::repeat_byte(0xb0);
    mock.set_balance(POLYGON, mock.address(), U256::from(10));

    let result = assert_ok!(
        wallet
            .send_batch(
                None,
                vec![
                    TransactionIntent::transfer(alice, U256::from(3)),
                    TransactionIntent::transfer(bob, U256::from(4)),
                ],
                BatchOptions::default(),
            )
            .await
    );
    assert_eq!(result.per_intent_outcome.len(), 2);
    assert!(result.per_intent_outcome.iter().all(|outcome| outcome.success));
    assert_eq!(mock.balance_of(POLYGON, alice), U256::from(3));
    assert_eq!(mock.balance_of(POLYGON, bob), U256::from(4));
    assert_eq!(mock.balance_of(POLYGON, mock.address()), U256::from(3));
    assert!(mock.is_deployed(POLYGON));
}

#[tokio::test]
async fn test_wallet_state_follows_first_batch() {
    let (mock, wallet) = connected_wallet().await;
    let before = assert_ok!(wallet.get_wallet_state(None).await);
    assert_eq!(before.chain_id, POLYGON);
    assert_eq!(before.address, mock.address());
    assert!(!before.deployed);

    assert_ok!(
        wallet
            .send_batch(
                None,
                vec![TransactionIntent::call(Address::repeat_byte(1), vec![0x01])],
                BatchOptions::default(),
            )
            .await
    );
    assert!(assert_ok!(wallet.get_wallet_state(None).await).deployed);
    assert!(!assert_ok!(wallet.get_wallet_state(Some(common::MAINNET)).await).deployed);
}

#[tokio::test]
async fn test_revert_in_first_intent_rolls_back_batch() {
    let (mock, wallet) = connected_wallet().await;
    let reverting = Address::repeat_byte(0xaa);
    let bob = Address::repeat_byte(0xb0);
    mock.add_revert_rule(reverting, "nope");
    mock.set_balance(POLYGON, mock.address(), U256::from(10));

    let err = wallet
        .send_batch(
            None,
            vec![
                TransactionIntent::transfer(reverting, U256::from(1)),
                TransactionIntent::transfer(bob, U256::from(1)),
            ],
            submit_only(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::Transaction(TransactionError::Reverted {
            index: 0,
            reason: "nope".to_string(),
        })
    );
    assert_eq!(mock.balance_of(POLYGON, bob), U256::ZERO);
    assert_eq!(mock.balance_of(POLYGON, mock.address()), U256::from(10));
}

#[tokio::test]
async fn test_revert_index_points_at_failing_intent() {
    let (mock, wallet) = connected_wallet().await;
    let alice = Address::repeat_byte(0xa1);
    let reverting = Address::repeat_byte(0xaa);
    mock.add_revert_rule(reverting, "ERC20: transfer amount exceeds balance");

    let err = wallet
        .send_batch(
            None,
            vec![
                TransactionIntent::call(alice, vec![0x01]),
                TransactionIntent::call(reverting, vec![0x02]),
            ],
            submit_only(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::Transaction(TransactionError::Reverted {
            index: 1,
            reason: "ERC20: transfer amount exceeds balance".to_string(),
        })
    );
}

#[tokio::test]
async fn test_estimation_failure_stops_submission() {
    let (mock, wallet) = connected_wallet().await;
    let reverting = Address::repeat_byte(0xaa);
    mock.add_revert_rule(reverting, "paused");

    let err = wallet
        .send_batch(
            None,
            vec![
                TransactionIntent::call(Address::repeat_byte(1), vec![0x01]),
                TransactionIntent::call(reverting, vec![0x02]),
            ],
            BatchOptions::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        WalletError::Transaction(TransactionError::Reverted {
            index: 1,
            reason: "paused".to_string(),
        })
    );
}

#[tokio::test]
async fn test_insufficient_funds() {
    let (mock, wallet) = connected_wallet().await;
    mock.set_balance(POLYGON, mock.address(), U256::from(1));

    let err = wallet
        .send_batch(
            None,
            vec![TransactionIntent::transfer(Address::repeat_byte(1), U256::from(2))],
            BatchOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WalletError::Transaction(TransactionError::InsufficientFunds { .. })
    ));
    assert_eq!(err.remediation(), Remediation::FundAccount);
}

#[tokio::test]
async fn test_cancelled_batch_leaves_session_untouched() {
    let (mock, wallet) = connected_wallet().await;
    mock.set_confirmation_delay(Some(Duration::from_secs(60)));
    let signer = assert_ok!(wallet.get_signer(None));
    let before = wallet.session().snapshot();
    let cancel = CancellationToken::new();

    let (result, _) = tokio::join!(
        wallet.batcher().send_batch_with_cancel(
            &signer,
            vec![TransactionIntent::call(Address::repeat_byte(1), vec![0x01])],
            BatchOptions::default(),
            cancel.clone(),
        ),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    );
    assert_eq!(
        result.unwrap_err(),
        WalletError::Transaction(TransactionError::Cancelled)
    );
    assert_eq!(wallet.session().snapshot(), before);
}

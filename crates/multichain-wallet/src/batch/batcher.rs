/*
[INPUT]:  Signer handle, ordered intents, batch options, cancellation token
[OUTPUT]: Submission handle (PendingBatch) and confirmed TransactionBatchResult
[POS]:    Batch layer - estimate, pre-flight, submit, confirm
[UPDATE]: When pre-flight checks or result interpretation change
*/

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{B256, U256};
use alloy_sol_types::{Revert, SolError, decode_revert_reason};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::authority::{AuthorityError, WalletAuthority};
use crate::error::{Result, TransactionError, WalletError};
use crate::types::{Signer, TransactionBatchResult, TransactionIntent};

const DEFAULT_REVERT_REASON: &str = "execution reverted";

/// Per-submission switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Estimate gas for intents without a gas limit
    pub estimate_gas: bool,
    /// Compare the batch value with the account balance before submitting
    pub check_balance: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            estimate_gas: true,
            check_balance: true,
        }
    }
}

/// Submits atomic batches through the authority
#[derive(Clone)]
pub struct TransactionBatcher {
    authority: Arc<dyn WalletAuthority>,
    estimate_timeout: Duration,
    confirmation_timeout: Duration,
}

/// A submitted batch awaiting confirmation
pub struct PendingBatch {
    pub tx_hash: B256,
    pub chain_id: u64,
    intent_count: usize,
    authority: Arc<dyn WalletAuthority>,
    confirmation_timeout: Duration,
}

impl std::fmt::Debug for PendingBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBatch")
            .field("tx_hash", &self.tx_hash)
            .field("chain_id", &self.chain_id)
            .field("intent_count", &self.intent_count)
            .finish_non_exhaustive()
    }
}

impl TransactionBatcher {
    pub fn new(
        authority: Arc<dyn WalletAuthority>,
        estimate_timeout: Duration,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            authority,
            estimate_timeout,
            confirmation_timeout,
        }
    }

    /// Gas estimate for one intent on the signer's chain
    pub async fn estimate_gas(&self, signer: &Signer, intent: &TransactionIntent) -> Result<U256> {
        self.estimate(signer.chain_id, intent).await.map_err(|e| {
            let reason = match e {
                AuthorityError::Reverted { reason, .. } => reason,
                other => other.to_string(),
            };
            TransactionError::EstimationFailed(reason).into()
        })
    }

    /// Pre-flight and submit; resolves once the authority hands back a transaction hash
    pub async fn submit_batch(
        &self,
        signer: &Signer,
        mut intents: Vec<TransactionIntent>,
        options: BatchOptions,
    ) -> Result<PendingBatch> {
        if intents.is_empty() {
            return Err(TransactionError::SubmissionRejected("batch has no intents".to_string()).into());
        }

        if options.check_balance {
            self.check_balance(signer, &intents).await?;
        }

        if options.estimate_gas {
            for (index, intent) in intents.iter_mut().enumerate() {
                if intent.gas_limit.is_some() {
                    continue;
                }
                let gas = self
                    .estimate(signer.chain_id, intent)
                    .await
                    .map_err(|e| match e {
                        AuthorityError::Reverted { reason, .. } => {
                            TransactionError::Reverted { index, reason }
                        }
                        other => TransactionError::EstimationFailed(other.to_string()),
                    })?;
                debug!(index, %gas, "gas limit estimated");
                intent.gas_limit = Some(gas);
            }
        }

        let tx_hash = self
            .authority
            .send_transaction_batch(signer.chain_id, &intents)
            .await
            .map_err(submission_error)?;
        info!(
            %tx_hash,
            chain_id = signer.chain_id,
            intents = intents.len(),
            "batch submitted"
        );

        Ok(PendingBatch {
            tx_hash,
            chain_id: signer.chain_id,
            intent_count: intents.len(),
            authority: self.authority.clone(),
            confirmation_timeout: self.confirmation_timeout,
        })
    }

    /// Submit and wait for confirmation
    pub async fn send_batch(
        &self,
        signer: &Signer,
        intents: Vec<TransactionIntent>,
        options: BatchOptions,
    ) -> Result<TransactionBatchResult> {
        self.submit_batch(signer, intents, options).await?.wait().await
    }

    /// [`Self::send_batch`] that stops waiting when `cancel` fires.
    ///
    /// A batch already handed to the authority may still be mined.
    pub async fn send_batch_with_cancel(
        &self,
        signer: &Signer,
        intents: Vec<TransactionIntent>,
        options: BatchOptions,
        cancel: CancellationToken,
    ) -> Result<TransactionBatchResult> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(chain_id = signer.chain_id, "batch cancelled by caller");
                Err(TransactionError::Cancelled.into())
            }
            result = self.send_batch(signer, intents, options) => result,
        }
    }

    async fn estimate(
        &self,
        chain_id: u64,
        intent: &TransactionIntent,
    ) -> std::result::Result<U256, AuthorityError> {
        tokio::time::timeout(
            self.estimate_timeout,
            self.authority.estimate_gas(chain_id, intent),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AuthorityError::Unavailable(format!(
                "no estimate within {}ms",
                self.estimate_timeout.as_millis()
            )))
        })
    }

    async fn check_balance(&self, signer: &Signer, intents: &[TransactionIntent]) -> Result<()> {
        let mut required = U256::ZERO;
        for intent in intents {
            required = required.checked_add(intent.value).ok_or_else(|| {
                TransactionError::SubmissionRejected("batch value overflows uint256".to_string())
            })?;
        }
        if required.is_zero() {
            return Ok(());
        }

        let available = self
            .authority
            .get_balance(signer.chain_id, signer.address)
            .await
            .map_err(submission_error)?;
        if available < required {
            warn!(%required, %available, "batch value exceeds balance");
            return Err(TransactionError::InsufficientFunds {
                required: required.to_string(),
                available: available.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl PendingBatch {
    /// Wait until the batch is mined; any failed intent fails the whole batch
    pub async fn wait(self) -> Result<TransactionBatchResult> {
        let millis = u64::try_from(self.confirmation_timeout.as_millis()).unwrap_or(u64::MAX);
        let result = tokio::time::timeout(
            self.confirmation_timeout,
            self.authority.wait_for_batch(self.chain_id, self.tx_hash),
        )
        .await
        .map_err(|_| TransactionError::ConfirmationTimeout {
            tx_hash: self.tx_hash.to_string(),
            millis,
        })?
        .map_err(submission_error)?;

        if let Some((index, outcome)) = result
            .per_intent_outcome
            .iter()
            .enumerate()
            .find(|(_, outcome)| !outcome.success)
        {
            let reason = revert_reason(&outcome.return_data);
            warn!(tx_hash = %self.tx_hash, index, reason = %reason, "batch reverted");
            return Err(TransactionError::Reverted { index, reason }.into());
        }

        if result.per_intent_outcome.len() != self.intent_count {
            debug!(
                expected = self.intent_count,
                reported = result.per_intent_outcome.len(),
                "outcome count differs from intent count"
            );
        }
        info!(tx_hash = %self.tx_hash, chain_id = self.chain_id, "batch confirmed");
        Ok(result)
    }
}

/// `Error(string)` payload, else whatever the generic decoder makes of it
fn revert_reason(return_data: &[u8]) -> String {
    if let Ok(revert) = Revert::abi_decode(return_data) {
        return revert.reason;
    }
    decode_revert_reason(return_data)
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| DEFAULT_REVERT_REASON.to_string())
}

/// Authority-reported shortfalls carry no amounts
fn submission_error(err: AuthorityError) -> WalletError {
    match err {
        AuthorityError::InsufficientFunds => TransactionError::InsufficientFunds {
            required: "unknown".to_string(),
            available: "unknown".to_string(),
        }
        .into(),
        AuthorityError::Reverted { index, reason } => {
            TransactionError::Reverted { index, reason }.into()
        }
        other => TransactionError::SubmissionRejected(other.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::MockAuthority;
    use crate::types::{ConnectOptions, Network};
    use alloy_primitives::Address;
    use uuid::Uuid;

    async fn setup() -> (Arc<MockAuthority>, TransactionBatcher, Signer) {
        let mock = Arc::new(MockAuthority::new(vec![
            Network::new(137, "polygon", "https://polygon-rpc.com").as_default(),
        ]));
        mock.connect(&ConnectOptions::new("batch-test")).await.unwrap();
        let batcher = TransactionBatcher::new(
            mock.clone(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        let signer = Signer {
            chain_id: 137,
            address: mock.address(),
            session_id: Uuid::new_v4(),
        };
        (mock, batcher, signer)
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let (_mock, batcher, signer) = setup().await;
        let err = batcher
            .send_batch(&signer, Vec::new(), BatchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::Transaction(TransactionError::SubmissionRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_balance_preflight() {
        let (mock, batcher, signer) = setup().await;
        mock.set_balance(137, signer.address, U256::from(5));
        let intents = vec![TransactionIntent::transfer(Address::repeat_byte(1), U256::from(6))];

        let err = batcher
            .send_batch(&signer, intents, BatchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WalletError::Transaction(TransactionError::InsufficientFunds {
                required: "6".to_string(),
                available: "5".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_estimation_surfaces_revert_reason() {
        let (mock, batcher, signer) = setup().await;
        let target = Address::repeat_byte(7);
        mock.add_revert_rule(target, "WETH: insufficient balance");

        let err = batcher
            .estimate_gas(&signer, &TransactionIntent::call(target, vec![0x2e, 0x1a]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            WalletError::Transaction(TransactionError::EstimationFailed(
                "WETH: insufficient balance".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_confirmation_timeout() {
        let (mock, _, signer) = setup().await;
        mock.set_confirmation_delay(Some(Duration::from_secs(60)));
        let batcher =
            TransactionBatcher::new(mock.clone(), Duration::from_secs(5), Duration::from_millis(20));

        let err = batcher
            .send_batch(
                &signer,
                vec![TransactionIntent::call(Address::repeat_byte(2), vec![0x01])],
                BatchOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::Transaction(TransactionError::ConfirmationTimeout { millis: 20, .. })
        ));
    }
}

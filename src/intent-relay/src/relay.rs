//! Relay client: ships a [`SignedIntent`] to the executor and classifies the outcome.
//!
//! The client never touches the nonce ledger. Whether a reservation is committed, released
//! or kept is decided by the caller from the returned variant.

use std::{sync::Arc, time::Duration};

use intent_relay_types::SignedIntent;

use crate::{
    errors::{ExecutorError, RelayError},
    executor::{Executor, ReceiptRef, RelayRequest},
};

pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RelayClient<E> {
    executor: Arc<E>,
    timeout: Duration,
}

impl<E> Clone for RelayClient<E> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            timeout: self.timeout,
        }
    }
}

impl<E: Executor> RelayClient<E> {
    pub fn new(executor: Arc<E>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Submit `signed` once.
    ///
    /// A timeout or a transport failure is `Unconfirmed`: the intent may have executed.
    #[tracing::instrument(skip_all, fields(wallet = %signed.context.wallet, nonce = %signed.nonce))]
    pub async fn submit(&self, signed: &SignedIntent) -> Result<ReceiptRef, RelayError> {
        let request = RelayRequest::from_signed(signed);
        match tokio::time::timeout(self.timeout, self.executor.execute(request)).await {
            Ok(Ok(receipt)) => {
                tracing::info!(tx = %receipt.tx_hash, "relay confirmed");
                Ok(receipt)
            }
            Ok(Err(ExecutorError::Rejected(reason))) => {
                tracing::warn!(%reason, "relay rejected");
                Err(RelayError::Rejected(reason))
            }
            Ok(Err(ExecutorError::Transport(err))) => {
                tracing::warn!(%err, "relay transport failure");
                Err(RelayError::Unconfirmed(err))
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "relay timed out");
                Err(RelayError::Unconfirmed(format!(
                    "no response within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Address, Bytes, U256};
    use async_trait::async_trait;
    use intent_relay_types::{intent_digest, Intent, Nonce, SignatureScheme, WalletContext};

    use super::*;
    use crate::{
        errors::RejectReason,
        executor::LocalExecutor,
        signer::{LocalKeySigner, Signer},
    };

    const WALLET: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");

    fn owner() -> LocalKeySigner {
        LocalKeySigner::from_hex("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap()
    }

    fn signed(nonce: u64) -> SignedIntent {
        let context = WalletContext::new(31337, WALLET);
        let intent = Intent::new(
            address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            U256::from(5u64),
            Bytes::new(),
        );
        let digest = intent_digest(&context, &intent, Nonce(nonce));
        SignedIntent {
            signature: owner().sign_digest(digest).unwrap(),
            intent,
            context,
            nonce: Nonce(nonce),
            digest,
            scheme: SignatureScheme::PersonalMessage,
        }
    }

    struct Hanging;

    #[async_trait]
    impl Executor for Hanging {
        async fn execute(&self, _request: RelayRequest) -> Result<ReceiptRef, ExecutorError> {
            std::future::pending().await
        }

        async fn stored_nonce(&self, _wallet: Address) -> Result<Nonce, ExecutorError> {
            Ok(Nonce::ZERO)
        }
    }

    struct Flaky;

    #[async_trait]
    impl Executor for Flaky {
        async fn execute(&self, _request: RelayRequest) -> Result<ReceiptRef, ExecutorError> {
            Err(ExecutorError::Transport("connection reset".into()))
        }

        async fn stored_nonce(&self, _wallet: Address) -> Result<Nonce, ExecutorError> {
            Err(ExecutorError::Transport("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_confirmed_then_replay_rejected() {
        let executor = Arc::new(LocalExecutor::new(31337, SignatureScheme::PersonalMessage));
        executor.register(WALLET, owner().address());
        let client = RelayClient::new(executor, DEFAULT_RELAY_TIMEOUT);

        let intent = signed(0);
        let receipt = client.submit(&intent).await.unwrap();
        assert_eq!(receipt.nonce, Nonce(0));
        assert_eq!(receipt.wallet, WALLET);

        assert_eq!(
            client.submit(&intent).await,
            Err(RelayError::Rejected(RejectReason::NonceMismatch {
                expected: Nonce(1),
                got: Nonce(0)
            }))
        );
    }

    #[tokio::test]
    async fn test_timeout_is_unconfirmed() {
        let client = RelayClient::new(Arc::new(Hanging), Duration::from_millis(50));
        assert!(matches!(
            client.submit(&signed(0)).await,
            Err(RelayError::Unconfirmed(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_unconfirmed() {
        let client = RelayClient::new(Arc::new(Flaky), DEFAULT_RELAY_TIMEOUT);
        assert_eq!(
            client.submit(&signed(0)).await,
            Err(RelayError::Unconfirmed("connection reset".into()))
        );
    }
}

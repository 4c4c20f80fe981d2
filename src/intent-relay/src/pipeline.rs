//! End-to-end send flow: session signer → authorize → relay → settle the nonce.

use std::sync::Arc;

use intent_relay_types::{Intent, Nonce, SignedIntent};

use crate::{
    authorizer::IntentAuthorizer,
    errors::{ExecutorError, LedgerError, RejectReason, RelayError, SendError},
    executor::{Executor, ReceiptRef},
    ledger::NonceLedger,
    relay::RelayClient,
    session::Session,
};

pub struct IntentRelay<E> {
    session: Arc<Session>,
    authorizer: IntentAuthorizer,
    relay: RelayClient<E>,
}

impl<E: Executor> IntentRelay<E> {
    pub fn new(session: Arc<Session>, ledger: Arc<NonceLedger>, relay: RelayClient<E>) -> Self {
        Self {
            session,
            authorizer: IntentAuthorizer::new(ledger),
            relay,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn ledger(&self) -> &Arc<NonceLedger> {
        self.authorizer.ledger()
    }

    /// Authorize `intent` with the session's signer and relay it.
    ///
    /// On `Unconfirmed` the nonce stays reserved and the signed intent is returned inside the
    /// error; pass it to [`resubmit`](Self::resubmit) or [`abandon`](Self::abandon).
    pub async fn send(&self, intent: Intent) -> Result<ReceiptRef, SendError> {
        let signed = self.authorize(intent).await?;
        let outcome = self.relay.submit(&signed).await;
        self.settle(&signed, outcome)
    }

    /// First half of [`send`](Self::send): sign with the session's signer, nonce left reserved.
    pub async fn authorize(&self, intent: Intent) -> Result<SignedIntent, SendError> {
        let signer = self.session.signer()?;
        Ok(self
            .authorizer
            .authorize(self.session.context(), intent, &signer)
            .await?)
    }

    /// Relay an authorized intent whose nonce is still the wallet's outstanding reservation.
    ///
    /// Concurrent submissions of the same intent are safe: the executor runs it at most once,
    /// and a confirmation that arrives after the nonce was settled is still reported.
    pub async fn submit(&self, signed: &SignedIntent) -> Result<ReceiptRef, SendError> {
        let wallet = signed.context.wallet;
        if self.ledger().status(wallet).in_flight != Some(signed.nonce) {
            return Err(LedgerError::NotReserved {
                wallet,
                nonce: signed.nonce,
            }
            .into());
        }
        let outcome = self.relay.submit(signed).await;
        self.settle(signed, outcome)
    }

    /// Retry an intent that came back `Unconfirmed`, byte for byte.
    pub async fn resubmit(&self, signed: &SignedIntent) -> Result<ReceiptRef, SendError> {
        tracing::info!(wallet = %signed.context.wallet, nonce = %signed.nonce, "resubmitting");
        self.submit(signed).await
    }

    /// Give up on an unconfirmed intent and free its nonce.
    ///
    /// If the intent did execute after all, the next send is rejected with a consumed nonce
    /// and the ledger catches up then, or call [`sync_nonce`](Self::sync_nonce).
    pub fn abandon(&self, signed: &SignedIntent) -> Result<(), SendError> {
        self.ledger().release(signed.context.wallet, signed.nonce)?;
        Ok(())
    }

    /// Pull the executor's stored nonce for the session wallet into the ledger.
    pub async fn sync_nonce(&self) -> Result<Nonce, SendError> {
        let wallet = self.session.context().wallet;
        let stored = self
            .relay
            .executor()
            .stored_nonce(wallet)
            .await
            .map_err(|err| match err {
                ExecutorError::Transport(reason) => SendError::Executor(reason),
                ExecutorError::Rejected(reason) => SendError::Rejected(reason),
            })?;
        self.ledger().sync(wallet, stored)?;
        Ok(stored)
    }

    fn settle(
        &self,
        signed: &SignedIntent,
        outcome: Result<ReceiptRef, RelayError>,
    ) -> Result<ReceiptRef, SendError> {
        let wallet = signed.context.wallet;
        match outcome {
            Ok(receipt) => {
                match self.ledger().commit(wallet, signed.nonce) {
                    Ok(()) => {}
                    // A concurrent submission of the same intent already settled the nonce.
                    Err(LedgerError::NotReserved { .. })
                        if self.ledger().status(wallet).next > signed.nonce =>
                    {
                        tracing::warn!(
                            %wallet,
                            nonce = %signed.nonce,
                            "confirmed nonce was already settled"
                        );
                    }
                    Err(err) => return Err(err.into()),
                }
                Ok(receipt)
            }
            Err(RelayError::Rejected(reason)) => {
                self.release_rejected(signed, &reason);
                Err(SendError::Rejected(reason))
            }
            Err(RelayError::Unconfirmed(reason)) => {
                tracing::warn!(
                    %wallet,
                    nonce = %signed.nonce,
                    %reason,
                    "relay unconfirmed, nonce kept"
                );
                Err(SendError::Unconfirmed {
                    signed: Box::new(signed.clone()),
                    reason,
                })
            }
        }
    }

    fn release_rejected(&self, signed: &SignedIntent, reason: &RejectReason) {
        let wallet = signed.context.wallet;
        if let Err(err) = self.ledger().release(wallet, signed.nonce) {
            tracing::warn!(
                %wallet,
                nonce = %signed.nonce,
                %err,
                "rejected nonce was not outstanding"
            );
            return;
        }
        // The executor is already past this nonce: catch up instead of reissuing it.
        if let RejectReason::NonceMismatch { expected, .. } = reason {
            if reason.nonce_consumed() {
                if let Err(err) = self.ledger().sync(wallet, *expected) {
                    tracing::warn!(
                        %wallet,
                        %expected,
                        %err,
                        "failed to sync ledger after rejection"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Address, Bytes, U256};
    use intent_relay_types::{SignatureScheme, WalletContext};

    use super::*;
    use crate::{
        errors::{AuthError, SessionError, SignerError},
        executor::LocalExecutor,
        ledger::NonceStatus,
        relay::DEFAULT_RELAY_TIMEOUT,
        signer::{ExternalSigner, LocalKeySigner, Signer},
    };

    const WALLET: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const TARGET: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    fn owner() -> LocalKeySigner {
        LocalKeySigner::from_hex("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap()
    }

    fn pipeline(wallet_owner: Address) -> (IntentRelay<LocalExecutor>, Arc<LocalExecutor>) {
        let executor = Arc::new(LocalExecutor::new(31337, SignatureScheme::PersonalMessage));
        executor.register(WALLET, wallet_owner);
        let session = Arc::new(Session::new(WalletContext::new(31337, WALLET)));
        let relay = IntentRelay::new(
            session,
            Arc::new(NonceLedger::new()),
            RelayClient::new(Arc::clone(&executor), DEFAULT_RELAY_TIMEOUT),
        );
        (relay, executor)
    }

    fn transfer(wei: u64) -> Intent {
        Intent::new(TARGET, U256::from(wei), Bytes::new())
    }

    #[tokio::test]
    async fn test_send_requires_connected_signer() {
        let (relay, _) = pipeline(owner().address());
        assert_eq!(
            relay.send(transfer(1)).await,
            Err(SendError::Session(SessionError::NotConnected))
        );
    }

    #[tokio::test]
    async fn test_sends_commit_in_order() {
        let (relay, executor) = pipeline(owner().address());
        relay.session().connect(Arc::new(owner()));

        for expected in 0..3u64 {
            let receipt = relay.send(transfer(expected + 1)).await.unwrap();
            assert_eq!(receipt.nonce, Nonce(expected));
        }
        assert_eq!(
            relay.ledger().status(WALLET),
            NonceStatus {
                next: Nonce(3),
                in_flight: None
            }
        );
        let nonces: Vec<_> = executor.executed(WALLET).iter().map(|c| c.nonce).collect();
        assert_eq!(nonces, vec![Nonce(0), Nonce(1), Nonce(2)]);
    }

    #[tokio::test]
    async fn test_rejection_releases_nonce() {
        // Wallet owned by someone else: every signature is unauthorized.
        let (relay, _) = pipeline(TARGET);
        relay.session().connect(Arc::new(owner()));

        let err = relay.send(transfer(1)).await.unwrap_err();
        assert!(matches!(
            err,
            SendError::Rejected(RejectReason::UnauthorizedSigner { .. })
        ));
        assert_eq!(
            relay.ledger().status(WALLET),
            NonceStatus {
                next: Nonce(0),
                in_flight: None
            }
        );
    }

    #[tokio::test]
    async fn test_consumed_nonce_catches_up() {
        let (relay, executor) = pipeline(owner().address());
        relay.session().connect(Arc::new(owner()));

        // Another client of the same wallet already used nonces 0 and 1.
        let other = IntentRelay::new(
            Arc::new(Session::new(WalletContext::new(31337, WALLET))),
            Arc::new(NonceLedger::new()),
            RelayClient::new(Arc::clone(&executor), DEFAULT_RELAY_TIMEOUT),
        );
        other.session().connect(Arc::new(owner()));
        other.send(transfer(1)).await.unwrap();
        other.send(transfer(2)).await.unwrap();

        assert!(matches!(
            relay.send(transfer(3)).await,
            Err(SendError::Rejected(RejectReason::NonceMismatch { .. }))
        ));
        assert_eq!(relay.ledger().status(WALLET).next, Nonce(2));
        assert_eq!(relay.send(transfer(3)).await.unwrap().nonce, Nonce(2));
    }

    #[tokio::test]
    async fn test_sync_nonce_and_abandon() {
        let (relay, executor) = pipeline(owner().address());
        relay.session().connect(Arc::new(owner()));
        relay.send(transfer(1)).await.unwrap();

        let fresh = IntentRelay::new(
            Arc::new(Session::new(WalletContext::new(31337, WALLET))),
            Arc::new(NonceLedger::new()),
            RelayClient::new(executor, DEFAULT_RELAY_TIMEOUT),
        );
        assert_eq!(fresh.sync_nonce().await.unwrap(), Nonce(1));
        assert_eq!(fresh.ledger().status(WALLET).next, Nonce(1));

        fresh.session().connect(Arc::new(owner()));
        let signed = fresh.authorize(transfer(2)).await.unwrap();
        assert_eq!(signed.nonce, Nonce(1));
        fresh.abandon(&signed).unwrap();
        assert_eq!(fresh.ledger().status(WALLET).in_flight, None);

        // Abandoned intents cannot be resubmitted through the pipeline.
        assert_eq!(
            fresh.resubmit(&signed).await,
            Err(SendError::Ledger(LedgerError::NotReserved {
                wallet: WALLET,
                nonce: Nonce(1)
            }))
        );
    }

    #[tokio::test]
    async fn test_switch_during_prompt_frees_nonce() {
        let (relay, executor) = pipeline(owner().address());
        let (external, mut queue) =
            ExternalSigner::pair(owner().address(), SignatureScheme::PersonalMessage);
        relay.session().connect(Arc::new(external));

        // The wallet extension never answers; the user switches to the local key.
        let switch = async {
            let request = queue.next().await.unwrap();
            assert_eq!(relay.ledger().status(WALLET).in_flight, Some(Nonce(0)));
            relay.session().connect(Arc::new(owner()));
            request
        };
        let (pending, request) = tokio::join!(relay.send(transfer(1)), switch);

        assert_eq!(
            pending,
            Err(SendError::Auth(AuthError::Signer(SignerError::Revoked)))
        );
        assert!(request.is_cancelled());
        assert_eq!(relay.ledger().status(WALLET).in_flight, None);
        assert_eq!(relay.send(transfer(2)).await.unwrap().nonce, Nonce(0));
        assert_eq!(executor.executed(WALLET).len(), 1);
    }

    #[tokio::test]
    async fn test_late_confirmation_after_settled_nonce() {
        let (relay, executor) = pipeline(owner().address());
        relay.session().connect(Arc::new(owner()));
        let signed = relay.authorize(transfer(1)).await.unwrap();

        // Two submissions of the same intent race: one executes, the replay is rejected and
        // settles the ledger first.
        let receipt = RelayClient::new(Arc::clone(&executor), DEFAULT_RELAY_TIMEOUT)
            .submit(&signed)
            .await
            .unwrap();
        let replay = RelayError::Rejected(RejectReason::NonceMismatch {
            expected: Nonce(1),
            got: Nonce(0),
        });
        assert!(relay.settle(&signed, Err(replay)).is_err());
        assert_eq!(relay.ledger().status(WALLET).next, Nonce(1));

        assert_eq!(relay.settle(&signed, Ok(receipt)), Ok(receipt));
        assert_eq!(
            relay.ledger().status(WALLET),
            NonceStatus {
                next: Nonce(1),
                in_flight: None
            }
        );

        // A confirmation for a nonce the ledger never moved past is still an error.
        let (fresh, _) = pipeline(owner().address());
        assert!(matches!(
            fresh.settle(&signed, Ok(receipt)),
            Err(SendError::Ledger(LedgerError::NotReserved { .. }))
        ));
    }
}

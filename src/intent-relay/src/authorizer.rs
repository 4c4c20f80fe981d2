//! Intent authorizer: validate, reserve a nonce, digest, sign, assemble.

use std::sync::Arc;

use alloy_primitives::Address;
use intent_relay_types::{intent_digest, verify_signer, Intent, Nonce, SignedIntent, WalletContext};

use crate::{errors::AuthError, ledger::NonceLedger, signer::Signer};

pub struct IntentAuthorizer {
    ledger: Arc<NonceLedger>,
}

impl IntentAuthorizer {
    pub fn new(ledger: Arc<NonceLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<NonceLedger> {
        &self.ledger
    }

    /// Turn `intent` into a [`SignedIntent`] for `context`.
    ///
    /// On success exactly one reservation (the returned intent's nonce) is left outstanding.
    /// Every failure after the reservation releases it, including cancellation of the returned
    /// future while the signer is waiting for approval.
    #[tracing::instrument(
        skip_all,
        fields(wallet = %context.wallet, signer = %signer.address(), target = %intent.target)
    )]
    pub async fn authorize(
        &self,
        context: &WalletContext,
        intent: Intent,
        signer: &dyn Signer,
    ) -> Result<SignedIntent, AuthError> {
        intent.validate()?;

        let reservation = Reservation::acquire(&self.ledger, context.wallet)?;
        let nonce = reservation.nonce;
        let digest = intent_digest(context, &intent, nonce);
        tracing::debug!(%nonce, %digest, "intent digest built");

        let scheme = signer.scheme();
        let signature = signer.sign(digest).await?;
        verify_signer(digest, scheme, &signature, signer.address())
            .map_err(AuthError::BadSignature)?;

        reservation.keep();
        Ok(SignedIntent {
            intent,
            context: *context,
            nonce,
            digest,
            scheme,
            signature,
        })
    }
}

/// Nonce reservation that is released on drop unless kept.
struct Reservation<'a> {
    ledger: &'a NonceLedger,
    wallet: Address,
    nonce: Nonce,
    armed: bool,
}

impl<'a> Reservation<'a> {
    fn acquire(ledger: &'a NonceLedger, wallet: Address) -> Result<Self, AuthError> {
        let nonce = ledger.reserve(wallet)?;
        Ok(Self {
            ledger,
            wallet,
            nonce,
            armed: true,
        })
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.ledger.release(self.wallet, self.nonce) {
            tracing::error!(
                wallet = %self.wallet,
                nonce = %self.nonce,
                %err,
                "failed to release reservation"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{address, Bytes, FixedBytes, U256};
    use async_trait::async_trait;
    use intent_relay_types::{IntentError, Signature, SignatureScheme};

    use super::*;
    use crate::{
        errors::SignerError,
        ledger::NonceStatus,
        signer::{ExternalSigner, LocalKeySigner},
    };

    const WALLET: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const TARGET: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    fn context() -> WalletContext {
        WalletContext::new(31337, WALLET)
    }

    fn intent() -> Intent {
        Intent::new(TARGET, U256::from(1_000u64), Bytes::new())
    }

    fn owner() -> LocalKeySigner {
        LocalKeySigner::from_hex("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap()
    }

    fn authorizer() -> IntentAuthorizer {
        IntentAuthorizer::new(Arc::new(NonceLedger::new()))
    }

    /// Claims one address but signs with another key.
    struct Impostor(LocalKeySigner);

    #[async_trait]
    impl Signer for Impostor {
        fn address(&self) -> Address {
            TARGET
        }

        async fn sign(&self, digest: FixedBytes<32>) -> Result<Signature, SignerError> {
            self.0.sign(digest).await
        }
    }

    #[tokio::test]
    async fn test_authorize_builds_verifiable_intent() {
        let auth = authorizer();
        let signer = owner();
        let signed = auth.authorize(&context(), intent(), &signer).await.unwrap();

        assert_eq!(signed.nonce, Nonce(0));
        assert_eq!(signed.digest, intent_digest(&context(), &intent(), Nonce(0)));
        assert_eq!(signed.scheme, SignatureScheme::PersonalMessage);
        assert_eq!(signed.recover_signer().unwrap(), signer.address());
        assert_eq!(
            auth.ledger().status(WALLET),
            NonceStatus {
                next: Nonce(0),
                in_flight: Some(Nonce(0))
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_intent_reserves_nothing() {
        let auth = authorizer();
        let bad = Intent::new(Address::ZERO, U256::ZERO, Bytes::new());
        assert_eq!(
            auth.authorize(&context(), bad, &owner()).await,
            Err(AuthError::InvalidIntent(IntentError::ZeroTarget))
        );
        assert_eq!(auth.ledger().status(WALLET).in_flight, None);
    }

    #[tokio::test]
    async fn test_busy_wallet() {
        let auth = authorizer();
        let signer = owner();
        let first = auth.authorize(&context(), intent(), &signer).await.unwrap();
        assert_eq!(
            auth.authorize(&context(), intent(), &signer).await,
            Err(AuthError::WalletBusy {
                wallet: WALLET,
                outstanding: first.nonce
            })
        );
    }

    #[tokio::test]
    async fn test_rejection_releases_nonce() {
        let auth = authorizer();
        let (signer, mut queue) =
            ExternalSigner::pair(owner().address(), SignatureScheme::PersonalMessage);
        let agent = tokio::spawn(async move {
            queue.next().await.unwrap().reject();
        });

        let before = auth.ledger().status(WALLET).next;
        assert_eq!(
            auth.authorize(&context(), intent(), &signer).await,
            Err(AuthError::SigningRejected)
        );
        agent.await.unwrap();
        assert_eq!(auth.ledger().reserve(WALLET).unwrap(), before);
    }

    #[tokio::test]
    async fn test_mismatched_signer_releases_nonce() {
        let auth = authorizer();
        let result = auth.authorize(&context(), intent(), &Impostor(owner())).await;
        assert!(matches!(result, Err(AuthError::BadSignature(_))));
        assert_eq!(auth.ledger().reserve(WALLET).unwrap(), Nonce(0));
    }

    #[tokio::test]
    async fn test_cancelled_authorization_releases_nonce() {
        let auth = authorizer();
        let (signer, mut queue) =
            ExternalSigner::pair(owner().address(), SignatureScheme::PersonalMessage);

        // Nobody answers the prompt; the caller gives up.
        let pending = tokio::time::timeout(
            Duration::from_millis(50),
            auth.authorize(&context(), intent(), &signer),
        )
        .await;
        assert!(pending.is_err());
        assert_eq!(auth.ledger().status(WALLET).in_flight, None);

        let request = queue.next().await.unwrap();
        assert!(request.is_cancelled());
    }
}

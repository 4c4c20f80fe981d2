//! Signer backed by an out-of-process agent (browser extension, hardware wallet, ...).
//!
//! [`ExternalSigner::pair`] returns the signer and the [`ApprovalQueue`] the agent drains. Each
//! `sign` call enqueues an [`ApprovalRequest`] and waits; the agent answers with
//! [`ApprovalRequest::approve`] or [`ApprovalRequest::reject`]. Dropping a request without
//! answering (the user closed the prompt) counts as a rejection. Dropping the pending `sign`
//! future cancels the request.

use alloy_primitives::{Address, FixedBytes};
use async_trait::async_trait;
use intent_relay_types::{Signature, SignatureScheme};
use tokio::sync::{mpsc, oneshot};

use crate::{errors::SignerError, signer::Signer};

const QUEUE_DEPTH: usize = 16;

/// One pending signature prompt.
#[derive(Debug)]
pub struct ApprovalRequest {
    pub address: Address,
    pub digest: FixedBytes<32>,
    pub scheme: SignatureScheme,
    reply: oneshot::Sender<Result<Signature, SignerError>>,
}

impl ApprovalRequest {
    pub fn approve(self, signature: Signature) {
        // The requester may have given up; nothing left to notify.
        let _ = self.reply.send(Ok(signature));
    }

    pub fn reject(self) {
        let _ = self.reply.send(Err(SignerError::UserRejected));
    }

    /// The requester stopped waiting (its `sign` future was dropped).
    pub fn is_cancelled(&self) -> bool {
        self.reply.is_closed()
    }
}

/// Agent side of an [`ExternalSigner`].
#[derive(Debug)]
pub struct ApprovalQueue {
    rx: mpsc::Receiver<ApprovalRequest>,
}

impl ApprovalQueue {
    /// Next prompt, or `None` once every signer handle is gone.
    pub async fn next(&mut self) -> Option<ApprovalRequest> {
        self.rx.recv().await
    }
}

#[derive(Clone, Debug)]
pub struct ExternalSigner {
    address: Address,
    scheme: SignatureScheme,
    tx: mpsc::Sender<ApprovalRequest>,
}

impl ExternalSigner {
    pub fn pair(address: Address, scheme: SignatureScheme) -> (Self, ApprovalQueue) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        (
            Self {
                address,
                scheme,
                tx,
            },
            ApprovalQueue { rx },
        )
    }
}

#[async_trait]
impl Signer for ExternalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    async fn sign(&self, digest: FixedBytes<32>) -> Result<Signature, SignerError> {
        let (reply, answer) = oneshot::channel();
        let request = ApprovalRequest {
            address: self.address,
            digest,
            scheme: self.scheme,
            reply,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| SignerError::Unavailable)?;
        tracing::debug!(address = %self.address, %digest, "awaiting external approval");

        match answer.await {
            Ok(result) => result,
            // Prompt dropped without an answer.
            Err(_) => Err(SignerError::UserRejected),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::b256;
    use intent_relay_types::recover_signer;

    use super::*;
    use crate::signer::LocalKeySigner;

    const DIGEST: FixedBytes<32> =
        b256!("3f9725da371cc6cab3be57f9ed35a61e2e5430b3852a2d3c23a081014ea97559");

    fn wallet_key() -> LocalKeySigner {
        LocalKeySigner::from_hex("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
            .unwrap()
    }

    #[tokio::test]
    async fn test_approved_signature_recovers() {
        let key = wallet_key();
        let (signer, mut queue) =
            ExternalSigner::pair(key.address(), SignatureScheme::PersonalMessage);

        let agent = tokio::spawn(async move {
            let request = queue.next().await.unwrap();
            assert_eq!(request.digest, DIGEST);
            let sig = key.sign_digest(request.digest).unwrap();
            request.approve(sig);
        });

        let sig = signer.sign(DIGEST).await.unwrap();
        agent.await.unwrap();
        assert_eq!(
            recover_signer(SignatureScheme::PersonalMessage.signing_hash(DIGEST), &sig).unwrap(),
            signer.address()
        );
    }

    #[tokio::test]
    async fn test_rejected_and_closed_prompts() {
        let (signer, mut queue) =
            ExternalSigner::pair(wallet_key().address(), SignatureScheme::PersonalMessage);

        let agent = tokio::spawn(async move {
            queue.next().await.unwrap().reject();
            // Closing the prompt without answering.
            drop(queue.next().await.unwrap());
        });

        assert_eq!(signer.sign(DIGEST).await, Err(SignerError::UserRejected));
        assert_eq!(signer.sign(DIGEST).await, Err(SignerError::UserRejected));
        agent.await.unwrap();
    }

    #[tokio::test]
    async fn test_agent_gone() {
        let (signer, queue) =
            ExternalSigner::pair(wallet_key().address(), SignatureScheme::RawDigest);
        drop(queue);
        assert_eq!(signer.sign(DIGEST).await, Err(SignerError::Unavailable));
    }
}

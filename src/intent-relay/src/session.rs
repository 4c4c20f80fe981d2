//! Wallet session: the chain/wallet binding plus exactly one active signer.
//!
//! Connecting a different signer (switching between the external wallet and the local key)
//! or disconnecting bumps the session epoch. Handles issued under an older epoch refuse to
//! sign, so a replaced key cannot keep signing in the background.

use std::sync::Arc;

use alloy_primitives::{Address, FixedBytes};
use async_trait::async_trait;
use intent_relay_types::{Signature, SignatureScheme, WalletContext};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::{
    errors::{SessionError, SignerError},
    signer::Signer,
};

pub struct Session {
    context: WalletContext,
    epoch: watch::Sender<u64>,
    active: RwLock<Option<SessionSigner>>,
}

impl Session {
    pub fn new(context: WalletContext) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            context,
            epoch,
            active: RwLock::new(None),
        }
    }

    pub fn context(&self) -> &WalletContext {
        &self.context
    }

    /// Make `signer` the session's only signer, revoking any previous one.
    ///
    /// Signatures the previous signer still has pending resolve to [`SignerError::Revoked`].
    pub fn connect(&self, signer: Arc<dyn Signer>) -> SessionSigner {
        let mut active = self.active.write();
        let epoch = self.bump();
        tracing::info!(
            signer = %signer.address(),
            wallet = %self.context.wallet,
            epoch,
            "signer connected"
        );
        let handle = SessionSigner {
            inner: signer,
            epoch,
            current: self.epoch.subscribe(),
        };
        *active = Some(handle.clone());
        handle
    }

    /// Revoke the active signer, if any.
    pub fn disconnect(&self) {
        let mut active = self.active.write();
        self.bump();
        if let Some(previous) = active.take() {
            tracing::info!(signer = %previous.address(), "signer disconnected");
        }
    }

    pub fn signer(&self) -> Result<SessionSigner, SessionError> {
        self.active.read().clone().ok_or(SessionError::NotConnected)
    }

    fn bump(&self) -> u64 {
        let mut next = 0;
        self.epoch.send_modify(|epoch| {
            *epoch += 1;
            next = *epoch;
        });
        next
    }
}

/// Signer handle bound to the session epoch it was issued in.
///
/// A handle whose session is gone counts as revoked.
#[derive(Clone)]
pub struct SessionSigner {
    inner: Arc<dyn Signer>,
    epoch: u64,
    current: watch::Receiver<u64>,
}

impl SessionSigner {
    pub fn is_active(&self) -> bool {
        self.current.has_changed().is_ok() && *self.current.borrow() == self.epoch
    }

    /// Resolves once the session has moved past this handle's epoch or was dropped.
    async fn revoked(&self) {
        let mut current = self.current.clone();
        loop {
            let moved_on = *current.borrow_and_update() != self.epoch;
            if moved_on || current.changed().await.is_err() {
                return;
            }
        }
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("address", &self.inner.address())
            .field("epoch", &self.epoch)
            .field("active", &self.is_active())
            .finish()
    }
}

#[async_trait]
impl Signer for SessionSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn scheme(&self) -> SignatureScheme {
        self.inner.scheme()
    }

    async fn sign(&self, digest: FixedBytes<32>) -> Result<Signature, SignerError> {
        if !self.is_active() {
            return Err(SignerError::Revoked);
        }
        // A switch while the prompt is open drops the pending request.
        let signature = tokio::select! {
            signed = self.inner.sign(digest) => signed?,
            _ = self.revoked() => return Err(SignerError::Revoked),
        };
        if !self.is_active() {
            return Err(SignerError::Revoked);
        }
        Ok(signature)
    }
}

//! Signing capability.
//!
//! The authorizer only ever sees a [`Signer`]: an address plus the ability to sign a digest.
//! Two implementations exist and behave identically from the outside:
//! - [`LocalKeySigner`]: a secp256k1 key held in memory, signs synchronously.
//! - [`ExternalSigner`]: forwards each request to an out-of-process agent (eg a browser
//!   extension) and suspends until the user approves or rejects.

pub mod external;
pub mod local;

use alloy_primitives::{Address, FixedBytes};
use async_trait::async_trait;
use intent_relay_types::{Signature, SignatureScheme};

use crate::errors::SignerError;

pub use external::{ApprovalQueue, ApprovalRequest, ExternalSigner};
pub use local::{KdfParams, LocalKeySigner};

#[async_trait]
pub trait Signer: Send + Sync {
    /// Address controlling the signatures this signer produces.
    fn address(&self) -> Address;

    /// How the digest is hashed before signing.
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::PersonalMessage
    }

    /// Sign an intent digest. May suspend pending user approval.
    async fn sign(&self, digest: FixedBytes<32>) -> Result<Signature, SignerError>;
}

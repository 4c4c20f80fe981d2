//! In-memory key signer.
//!
//! WARNING: [`LocalKeySigner::from_credentials`] stretches an email/password pair into a wallet
//! key with 1000 rounds of PBKDF2. Anyone who can guess the password can rebuild the key
//! offline. It exists for demos and tests only; real funds need a random key kept encrypted at
//! rest (or at least a memory-hard KDF such as Argon2id).

use alloy_primitives::{Address, FixedBytes};
use async_trait::async_trait;
use intent_relay_types::{address_of, sign_hash, Signature, SignatureScheme};
use k256::ecdsa::SigningKey;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{errors::SignerError, signer::Signer};

/// PBKDF2-HMAC-SHA256 parameters for credential-derived keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { iterations: 1000 }
    }
}

pub struct LocalKeySigner {
    key: SigningKey,
    address: Address,
    scheme: SignatureScheme,
}

impl LocalKeySigner {
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(key.verifying_key());
        Self {
            key,
            address,
            scheme: SignatureScheme::default(),
        }
    }

    pub fn from_bytes(secret: &[u8]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|_| SignerError::KeyStore("invalid secp256k1 private key".into()))?;
        Ok(Self::new(key))
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(secret: &str) -> Result<Self, SignerError> {
        let trimmed = secret.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|e| SignerError::KeyStore(format!("bad hex key: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Derive a key deterministically: `PBKDF2-HMAC-SHA256(password, salt = email)`.
    ///
    /// The same credentials always yield the same wallet. Demonstration only, see module docs.
    pub fn from_credentials(
        email: &str,
        password: &str,
        params: KdfParams,
    ) -> Result<Self, SignerError> {
        if email.is_empty() || password.is_empty() {
            return Err(SignerError::KeyStore("email and password are required".into()));
        }
        tracing::warn!(
            iterations = params.iterations,
            "deriving signing key from a password; not suitable for real funds"
        );
        let mut seed = Zeroizing::new([0u8; 32]);
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            email.as_bytes(),
            params.iterations,
            &mut *seed,
        );
        Self::from_bytes(&*seed)
    }

    pub fn with_scheme(mut self, scheme: SignatureScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sign without going through the async capability.
    pub fn sign_digest(&self, digest: FixedBytes<32>) -> Result<Signature, SignerError> {
        Ok(sign_hash(&self.key, self.scheme.signing_hash(digest))?)
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.address)
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    async fn sign(&self, digest: FixedBytes<32>) -> Result<Signature, SignerError> {
        self.sign_digest(digest)
    }
}

//! Error types shared by the client and the executor.

use alloy_primitives::Address;

/// Errors while turning caller input into an [`Intent`](crate::Intent).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("malformed address `{0}`")]
    MalformedAddress(String),
    #[error("target must not be the zero address")]
    ZeroTarget,
    #[error("malformed value `{0}`")]
    MalformedValue(String),
    #[error("malformed call data: {0}")]
    MalformedCallData(String),
}

/// Errors while producing, decoding or recovering a 65-byte ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),
    #[error("unsupported recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("signature scalars are out of range")]
    MalformedScalars,
    #[error("no public key recovers from this signature")]
    RecoveryFailed,
    #[error("signing failed")]
    SigningFailed,
    #[error("stored digest does not match the intent it claims to cover")]
    DigestMismatch,
    #[error("signature recovers to {recovered}, expected {expected}")]
    SignerMismatch { expected: Address, recovered: Address },
}

/// Errors while decoding executor calldata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallDecodeError {
    #[error("calldata is not an `execute` call: {0}")]
    Abi(String),
    #[error("nonce {0} does not fit in 64 bits")]
    NonceOverflow(String),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

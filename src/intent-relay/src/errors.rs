//! Error taxonomy of the relay core.
//!
//! Every variant that can follow a nonce reservation documents whether the reservation is
//! released or left outstanding.

use alloy_primitives::Address;
use intent_relay_types::{IntentError, Nonce, SignatureError};

/// Failures of a [`Signer`](crate::signer::Signer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// The human (or the agent acting for them) declined, or closed the prompt.
    #[error("signature request rejected by the user")]
    UserRejected,
    /// The signer was replaced or disconnected in its session.
    #[error("signer has been revoked for this session")]
    Revoked,
    /// The external signing agent is gone.
    #[error("signing agent unavailable")]
    Unavailable,
    #[error("key store error: {0}")]
    KeyStore(String),
    #[error(transparent)]
    Signature(#[from] SignatureError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A reservation is already outstanding; retry once it is committed or released.
    #[error("wallet {wallet} already has nonce {outstanding} in flight")]
    WalletBusy { wallet: Address, outstanding: Nonce },
    #[error("nonce {nonce} is not the outstanding reservation for wallet {wallet}")]
    NotReserved { wallet: Address, nonce: Nonce },
    #[error("nonce space exhausted for wallet {0}")]
    Exhausted(Address),
    #[error("cannot move wallet {wallet} back from nonce {current} to {requested}")]
    Regression {
        wallet: Address,
        current: Nonce,
        requested: Nonce,
    },
}

/// Failures of [`IntentAuthorizer::authorize`](crate::authorizer::IntentAuthorizer::authorize).
///
/// Apart from `WalletBusy` (nothing was reserved) every variant is returned after the
/// reservation made for the attempt has been released.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid intent: {0}")]
    InvalidIntent(#[from] IntentError),
    #[error("wallet {wallet} already has nonce {outstanding} in flight")]
    WalletBusy { wallet: Address, outstanding: Nonce },
    #[error("nonce reservation failed: {0}")]
    Ledger(LedgerError),
    #[error("signing rejected")]
    SigningRejected,
    #[error("signer failed: {0}")]
    Signer(SignerError),
    /// The signer returned a signature that does not recover to its own address.
    #[error("signer produced an unverifiable signature: {0}")]
    BadSignature(SignatureError),
}

impl From<LedgerError> for AuthError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::WalletBusy {
                wallet,
                outstanding,
            } => AuthError::WalletBusy {
                wallet,
                outstanding,
            },
            other => AuthError::Ledger(other),
        }
    }
}

impl From<SignerError> for AuthError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::UserRejected => AuthError::SigningRejected,
            other => AuthError::Signer(other),
        }
    }
}

/// Why an executor refused a relayed intent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("chain id mismatch")]
    ChainMismatch,
    #[error("malformed execute call: {0}")]
    MalformedCall(String),
    #[error("unknown wallet {0}")]
    UnknownWallet(Address),
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: Nonce, got: Nonce },
    #[error("bad signature: {0}")]
    BadSignature(String),
    #[error("signer {recovered} is not authorised for this wallet")]
    UnauthorizedSigner { recovered: Address },
    #[error("{0}")]
    Other(String),
}

impl RejectReason {
    /// The executor has already consumed the nonce (eg a replay of an executed intent).
    pub fn nonce_consumed(&self) -> bool {
        matches!(self, RejectReason::NonceMismatch { expected, got } if expected > got)
    }
}

/// Failures reported by an [`Executor`](crate::executor::Executor).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// No usable response; the intent may or may not have executed.
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("rejected: {0}")]
    Rejected(RejectReason),
}

/// Failures of [`RelayClient::submit`](crate::relay::RelayClient::submit).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Outcome unknown. The reservation stays outstanding; resubmit the identical signed intent
    /// or poll the executor.
    #[error("relay unconfirmed: {0}")]
    Unconfirmed(String),
    /// The executor refused. The caller releases the nonce and authorises again.
    #[error("relay rejected: {0}")]
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no signer connected")]
    NotConnected,
}

/// Failures of [`IntentRelay`](crate::pipeline::IntentRelay) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Nonce released.
    #[error("relay rejected: {0}")]
    Rejected(RejectReason),
    /// Nonce still reserved; the signed intent is handed back for resubmission.
    #[error("relay unconfirmed for nonce {nonce}: {reason}", nonce = .signed.nonce)]
    Unconfirmed {
        signed: Box<intent_relay_types::SignedIntent>,
        reason: String,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("executor unavailable: {0}")]
    Executor(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

//! Off-chain half of the intent relay.
//!
//! A user signs an [`Intent`] for their smart wallet; a relayer submits it so the user never
//! pays gas. This crate owns everything between the two: the active signer of a [`Session`],
//! per-wallet nonce ordering ([`NonceLedger`]), authorisation ([`IntentAuthorizer`]), and
//! submission ([`RelayClient`]) against an [`Executor`].
//!
//! ```text
//! Intent ─► IntentAuthorizer ─► SignedIntent ─► RelayClient ─► Executor
//!              │    ▲                               │
//!       reserve│    │sign                    commit / release / keep
//!              ▼    │                               ▼
//!          NonceLedger ◄────────────────────────── IntentRelay
//! ```

pub mod authorizer;
pub mod config;
pub mod errors;
pub mod executor;
pub mod ledger;
pub mod pipeline;
pub mod relay;
pub mod session;
pub mod signer;

pub use authorizer::IntentAuthorizer;
pub use config::RelayConfig;
pub use errors::{
    AuthError, ConfigError, ExecutorError, LedgerError, RejectReason, RelayError, SendError,
    SessionError, SignerError,
};
pub use executor::{ExecutedCall, Executor, LocalExecutor, ReceiptRef, RelayRequest};
pub use intent_relay_types::{
    Intent, Nonce, Signature, SignatureScheme, SignedIntent, WalletContext,
};
pub use ledger::{NonceLedger, NonceStatus};
pub use pipeline::IntentRelay;
pub use relay::{RelayClient, DEFAULT_RELAY_TIMEOUT};
pub use session::{Session, SessionSigner};
pub use signer::{ApprovalQueue, ApprovalRequest, ExternalSigner, KdfParams, LocalKeySigner, Signer};

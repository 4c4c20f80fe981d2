//! Shared types for the intent relay.
//!
//! Everything here is pure: intents, the canonical digest, the 65-byte signature codec and the
//! executor ABI. Both the relaying client and any verifier (executor) build on these, so the
//! digest layout cannot drift between the two.

pub mod abi;
pub mod digest;
pub mod errors;
pub mod intent;
pub mod signature;
pub mod signed;

pub use abi::{decode_execute, encode_execute, ExecuteArgs};
pub use digest::{intent_digest, packed_encoding};
pub use errors::{CallDecodeError, IntentError, SignatureError};
pub use intent::{parse_address, Intent, Nonce, WalletContext};
pub use signature::{
    address_of, recover_signer, sign_hash, verify_signer, Signature, SignatureScheme,
};
pub use signed::SignedIntent;

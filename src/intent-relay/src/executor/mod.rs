//! Executor boundary.
//!
//! The executor is the smart wallet that finally runs a relayed intent. It independently
//! recomputes the digest from the submitted tuple, recovers the signer, checks
//! `nonce == storedNonce`, executes and increments its nonce, all atomically.

pub mod local;

use alloy_primitives::{Address, FixedBytes, U256};
use async_trait::async_trait;
use intent_relay_types::{Nonce, SignedIntent};
use serde::{Deserialize, Serialize};

use crate::errors::ExecutorError;

pub use local::{ExecutedCall, LocalExecutor};

/// What the relay transport carries: chain, destination wallet, ABI-encoded `execute` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub chain_id: U256,
    pub wallet: Address,
    pub calldata: alloy_primitives::Bytes,
}

impl RelayRequest {
    pub fn from_signed(signed: &SignedIntent) -> Self {
        Self {
            chain_id: signed.context.chain_id,
            wallet: signed.context.wallet,
            calldata: signed.calldata().into(),
        }
    }
}

/// Reference to a submitted intent, usable to track confirmation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptRef {
    pub tx_hash: FixedBytes<32>,
    pub wallet: Address,
    pub nonce: Nonce,
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: RelayRequest) -> Result<ReceiptRef, ExecutorError>;

    /// The next nonce the executor will accept for `wallet`.
    async fn stored_nonce(&self, wallet: Address) -> Result<Nonce, ExecutorError>;
}

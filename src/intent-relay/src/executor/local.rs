//! In-memory executor with the on-chain wallet's semantics.
//!
//! Used by tests and the CLI simulation. The checks run in the same order as the contract:
//! chain, call shape, wallet, nonce, signature. State changes only after every check passed.

use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, FixedBytes, U256};
use async_trait::async_trait;
use intent_relay_types::{
    decode_execute, intent_digest, verify_signer, Intent, Nonce, SignatureError, SignatureScheme,
    WalletContext,
};
use parking_lot::Mutex;

use crate::{
    errors::{ExecutorError, RejectReason},
    executor::{Executor, ReceiptRef, RelayRequest},
};

/// One successful execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutedCall {
    pub intent: Intent,
    pub nonce: Nonce,
    pub digest: FixedBytes<32>,
    pub receipt: ReceiptRef,
}

#[derive(Debug)]
struct WalletAccount {
    owner: Address,
    stored_nonce: Nonce,
    executed: Vec<ExecutedCall>,
}

#[derive(Debug)]
pub struct LocalExecutor {
    chain_id: U256,
    scheme: SignatureScheme,
    wallets: Mutex<HashMap<Address, WalletAccount>>,
}

impl LocalExecutor {
    pub fn new(chain_id: u64, scheme: SignatureScheme) -> Self {
        Self {
            chain_id: U256::from(chain_id),
            scheme,
            wallets: Mutex::new(HashMap::new()),
        }
    }

    /// Deploy `wallet` controlled by `owner`, starting at nonce 0.
    pub fn register(&self, wallet: Address, owner: Address) {
        self.wallets.lock().insert(
            wallet,
            WalletAccount {
                owner,
                stored_nonce: Nonce::ZERO,
                executed: Vec::new(),
            },
        );
    }

    pub fn executed(&self, wallet: Address) -> Vec<ExecutedCall> {
        self.wallets
            .lock()
            .get(&wallet)
            .map(|account| account.executed.clone())
            .unwrap_or_default()
    }

    fn apply(&self, request: &RelayRequest) -> Result<ReceiptRef, RejectReason> {
        if request.chain_id != self.chain_id {
            return Err(RejectReason::ChainMismatch);
        }
        let args = decode_execute(&request.calldata)
            .map_err(|e| RejectReason::MalformedCall(e.to_string()))?;

        let mut wallets = self.wallets.lock();
        let account = wallets
            .get_mut(&request.wallet)
            .ok_or(RejectReason::UnknownWallet(request.wallet))?;

        // Replay protection.
        if args.nonce != account.stored_nonce {
            return Err(RejectReason::NonceMismatch {
                expected: account.stored_nonce,
                got: args.nonce,
            });
        }

        let context = WalletContext {
            chain_id: self.chain_id,
            wallet: request.wallet,
        };
        let digest = intent_digest(&context, &args.intent, args.nonce);
        match verify_signer(digest, self.scheme, &args.signature, account.owner) {
            Ok(()) => {}
            Err(SignatureError::SignerMismatch { recovered, .. }) => {
                return Err(RejectReason::UnauthorizedSigner { recovered })
            }
            Err(other) => return Err(RejectReason::BadSignature(other.to_string())),
        }

        let receipt = ReceiptRef {
            tx_hash: receipt_hash(request.wallet, args.nonce, digest),
            wallet: request.wallet,
            nonce: args.nonce,
        };
        account.stored_nonce = args
            .nonce
            .checked_next()
            .ok_or_else(|| RejectReason::Other("nonce space exhausted".into()))?;
        account.executed.push(ExecutedCall {
            intent: args.intent,
            nonce: args.nonce,
            digest,
            receipt,
        });
        Ok(receipt)
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, request: RelayRequest) -> Result<ReceiptRef, ExecutorError> {
        match self.apply(&request) {
            Ok(receipt) => {
                tracing::info!(
                    wallet = %receipt.wallet,
                    nonce = %receipt.nonce,
                    tx = %receipt.tx_hash,
                    "intent executed"
                );
                Ok(receipt)
            }
            Err(reason) => {
                tracing::warn!(wallet = %request.wallet, %reason, "intent rejected");
                Err(ExecutorError::Rejected(reason))
            }
        }
    }

    async fn stored_nonce(&self, wallet: Address) -> Result<Nonce, ExecutorError> {
        self.wallets
            .lock()
            .get(&wallet)
            .map(|account| account.stored_nonce)
            .ok_or(ExecutorError::Rejected(RejectReason::UnknownWallet(wallet)))
    }
}

/// `keccak256(wallet ‖ nonce ‖ digest)`.
fn receipt_hash(wallet: Address, nonce: Nonce, digest: FixedBytes<32>) -> FixedBytes<32> {
    let mut buf = Vec::with_capacity(20 + 32 + 32);
    buf.extend_from_slice(wallet.as_slice());
    buf.extend_from_slice(&nonce.to_be_word());
    buf.extend_from_slice(digest.as_slice());
    keccak256(buf)
}

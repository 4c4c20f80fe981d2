//! Canonical intent digest.
//!
//! The executor recomputes this digest from the submitted tuple, so the layout here is the
//! anti-tamper contract of the whole relay. It is Solidity's `keccak256(abi.encodePacked(...))`
//! over `chainId, wallet, target, value, data, nonce`:
//!
//! ```text
//! chainId (32, BE) ‖ wallet (20) ‖ target (20) ‖ value (32, BE)
//!     ‖ callData (n) ‖ nonce (32, BE)
//! ```
//!
//! No length prefixes and no padding between fields.

use alloy_primitives::FixedBytes;
use sha3::{Digest, Keccak256};

use crate::intent::{Intent, Nonce, WalletContext};

/// Fixed-width part of the packed encoding (everything but the call data).
pub const FIXED_PACKED_LEN: usize = 32 + 20 + 20 + 32 + 32;

/// Compute the intent digest. Pure; two equal tuples always give the same digest.
pub fn intent_digest(context: &WalletContext, intent: &Intent, nonce: Nonce) -> FixedBytes<32> {
    let mut h = Keccak256::new();
    h.update(context.chain_id.to_be_bytes::<32>());
    h.update(context.wallet.as_slice());
    h.update(intent.target.as_slice());
    h.update(intent.value.to_be_bytes::<32>());
    h.update(&intent.call_data);
    h.update(nonce.to_be_word());
    let out = h.finalize();
    let mut b = [0u8; 32];
    b.copy_from_slice(out.as_slice());
    FixedBytes(b)
}

/// The packed preimage of [`intent_digest`], for inspection and tooling.
pub fn packed_encoding(context: &WalletContext, intent: &Intent, nonce: Nonce) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FIXED_PACKED_LEN + intent.call_data.len());
    buf.extend_from_slice(&context.chain_id.to_be_bytes::<32>());
    buf.extend_from_slice(context.wallet.as_slice());
    buf.extend_from_slice(intent.target.as_slice());
    buf.extend_from_slice(&intent.value.to_be_bytes::<32>());
    buf.extend_from_slice(&intent.call_data);
    buf.extend_from_slice(&nonce.to_be_word());
    buf
}

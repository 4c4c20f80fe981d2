use alloy_primitives::{Address, FixedBytes};
use serde::{Deserialize, Serialize};

use crate::{
    abi::encode_execute,
    digest::intent_digest,
    errors::SignatureError,
    intent::{Intent, Nonce, WalletContext},
    signature::{recover_signer, Signature, SignatureScheme},
};

/// An intent bound to a wallet, chain and nonce, with the owner's signature over its digest.
///
/// Built once by the authorizer after a successful signature and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedIntent {
    pub intent: Intent,
    pub context: WalletContext,
    pub nonce: Nonce,
    pub digest: FixedBytes<32>,
    pub scheme: SignatureScheme,
    pub signature: Signature,
}

impl SignedIntent {
    /// Recompute the digest from the fields and recover the signer.
    ///
    /// Fails if the stored digest does not cover the stored fields.
    pub fn recover_signer(&self) -> Result<Address, SignatureError> {
        let digest = intent_digest(&self.context, &self.intent, self.nonce);
        if digest != self.digest {
            return Err(SignatureError::DigestMismatch);
        }
        recover_signer(self.scheme.signing_hash(digest), &self.signature)
    }

    /// ABI-encoded `execute(...)` call for the smart wallet.
    pub fn calldata(&self) -> Vec<u8> {
        encode_execute(&self.intent, self.nonce, &self.signature)
    }
}

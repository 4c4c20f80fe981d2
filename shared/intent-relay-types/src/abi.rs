//! Solidity ABI surface of the executing smart wallet.
//!
//! The relayer sends `execute(...)` to the wallet address; the wallet recomputes the intent
//! digest from these arguments, recovers the signer and consumes the nonce.

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{sol, SolCall};

use crate::{
    errors::CallDecodeError,
    intent::{Intent, Nonce},
    signature::Signature,
};

sol! {
    interface IIntentExecutor {
        function execute(address target, uint256 value, bytes data, uint256 nonce, bytes signature)
            external
            payable
            returns (bool success);
    }
}

/// Arguments of an `execute` call, decoded back into typed form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteArgs {
    pub intent: Intent,
    pub nonce: Nonce,
    pub signature: Signature,
}

pub fn encode_execute(intent: &Intent, nonce: Nonce, signature: &Signature) -> Vec<u8> {
    IIntentExecutor::executeCall {
        target: intent.target,
        value: intent.value,
        data: intent.call_data.clone(),
        nonce: U256::from(nonce.get()),
        signature: Bytes::copy_from_slice(signature.as_bytes()),
    }
    .abi_encode()
}

pub fn decode_execute(calldata: &[u8]) -> Result<ExecuteArgs, CallDecodeError> {
    let call = IIntentExecutor::executeCall::abi_decode(calldata, true)
        .map_err(|e| CallDecodeError::Abi(e.to_string()))?;
    let nonce = u64::try_from(call.nonce)
        .map_err(|_| CallDecodeError::NonceOverflow(call.nonce.to_string()))?;
    let signature = Signature::from_slice(&call.signature)?;
    Ok(ExecuteArgs {
        intent: Intent::new(call.target, call.value, call.data),
        nonce: Nonce(nonce),
        signature,
    })
}

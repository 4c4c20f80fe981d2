use core::fmt;
use core::str::FromStr;

use alloy_primitives::{
    utils::{ParseUnits, Unit},
    Address, Bytes, U256,
};
use serde::{Deserialize, Serialize};

use crate::errors::IntentError;

/// A user-authorised action: call `target` with `value` wei and `call_data`.
///
/// Immutable once built; every field is covered by the intent digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub target: Address,
    /// Amount in wei.
    pub value: U256,
    /// Raw call data, possibly empty.
    pub call_data: Bytes,
}

impl Intent {
    pub fn new(target: Address, value: U256, call_data: impl Into<Bytes>) -> Self {
        Self {
            target,
            value,
            call_data: call_data.into(),
        }
    }

    /// Parse an intent from text input.
    ///
    /// `value_wei` is a decimal (or `0x`-prefixed) integer; `call_data` is hex, `0x` for none.
    pub fn parse(target: &str, value_wei: &str, call_data: &str) -> Result<Self, IntentError> {
        let target = parse_address(target)?;
        let value = U256::from_str(value_wei.trim())
            .map_err(|_| IntentError::MalformedValue(value_wei.to_string()))?;
        let intent = Self::new(target, value, parse_call_data(call_data)?);
        intent.validate()?;
        Ok(intent)
    }

    /// Same as [`Intent::parse`] but with the value given in ether (eg `"1.5"`).
    ///
    /// Negative amounts are rejected rather than folded into their absolute value.
    pub fn parse_with_ether(
        target: &str,
        ether: &str,
        call_data: &str,
    ) -> Result<Self, IntentError> {
        let malformed = || IntentError::MalformedValue(ether.to_string());
        let value = match ParseUnits::parse_units(ether.trim(), Unit::ETHER) {
            Ok(ParseUnits::U256(wei)) => wei,
            Ok(ParseUnits::I256(_)) | Err(_) => return Err(malformed()),
        };
        let intent = Self::new(parse_address(target)?, value, parse_call_data(call_data)?);
        intent.validate()?;
        Ok(intent)
    }

    /// Reject intents no executor should be asked to run.
    ///
    /// Widths are enforced by the types; `value` is unsigned.
    pub fn validate(&self) -> Result<(), IntentError> {
        if self.target == Address::ZERO {
            return Err(IntentError::ZeroTarget);
        }
        Ok(())
    }
}

/// Per-session binding of chain and smart wallet. Domain of every digest in the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletContext {
    pub chain_id: U256,
    /// The smart wallet (executor) address, not the signer's address.
    pub wallet: Address,
}

impl WalletContext {
    pub fn new(chain_id: u64, wallet: Address) -> Self {
        Self {
            chain_id: U256::from(chain_id),
            wallet,
        }
    }
}

/// Wallet-scoped replay nonce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub u64);

impl Nonce {
    pub const ZERO: Nonce = Nonce(0);

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The following nonce, or `None` once the counter is exhausted.
    pub const fn checked_next(self) -> Option<Nonce> {
        match self.0.checked_add(1) {
            Some(n) => Some(Nonce(n)),
            None => None,
        }
    }

    /// 32-byte big-endian word, as the executor stores it.
    pub fn to_be_word(self) -> [u8; 32] {
        U256::from(self.0).to_be_bytes::<32>()
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Nonce(value)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub fn parse_address(s: &str) -> Result<Address, IntentError> {
    Address::from_str(s.trim()).map_err(|_| IntentError::MalformedAddress(s.to_string()))
}

fn parse_call_data(s: &str) -> Result<Bytes, IntentError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(Bytes::new());
    }
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| IntentError::MalformedCallData(e.to_string()))
}

use std::{fs, path::Path, time::Duration};

use alloy_primitives::{address, Address};
use intent_relay_types::{SignatureScheme, WalletContext};
use serde::{Deserialize, Serialize};

use crate::{errors::ConfigError, signer::KdfParams};

/// Relay settings, loadable from JSON. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub chain_id: u64,
    /// Smart wallet the session acts for.
    pub wallet: Address,
    pub relay_timeout_ms: u64,
    pub kdf_iterations: u32,
    pub scheme: SignatureScheme,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            // Local devnet and its first deployed contract.
            chain_id: 31337,
            wallet: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
            relay_timeout_ms: 30_000,
            kdf_iterations: KdfParams::default().iterations,
            scheme: SignatureScheme::PersonalMessage,
        }
    }
}

impl RelayConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn context(&self) -> WalletContext {
        WalletContext::new(self.chain_id, self.wallet)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }

    pub fn kdf(&self) -> KdfParams {
        KdfParams {
            iterations: self.kdf_iterations,
        }
    }
}

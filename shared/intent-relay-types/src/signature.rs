//! 65-byte recoverable ECDSA signatures over intent digests.

use core::fmt;

use alloy_primitives::{keccak256, Address, FixedBytes};
use k256::{
    ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::SignatureError;

pub const SIGNATURE_LEN: usize = 65;

/// How a digest is turned into the 32-byte hash that actually gets signed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    /// EIP-191 `personal_sign`: `keccak256("\x19Ethereum Signed Message:\n32" ‖ digest)`.
    #[default]
    PersonalMessage,
    /// The digest itself is signed (`eth_sign` on a raw hash).
    RawDigest,
}

impl SignatureScheme {
    pub fn signing_hash(self, digest: FixedBytes<32>) -> FixedBytes<32> {
        match self {
            SignatureScheme::PersonalMessage => {
                let mut buf = Vec::with_capacity(28 + 32);
                buf.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
                buf.extend_from_slice(digest.as_slice());
                keccak256(buf)
            }
            SignatureScheme::RawDigest => digest,
        }
    }
}

/// ECDSA signature `r ‖ s ‖ v`, always 65 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }
        let mut sig = [0u8; SIGNATURE_LEN];
        sig.copy_from_slice(bytes);
        Ok(Self(sig))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Recovery id for `v`. Accepts v in {0,1,27,28}.
    pub fn recovery_id(&self) -> Result<RecoveryId, SignatureError> {
        let v = self.v();
        let id = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            _ => return Err(SignatureError::InvalidRecoveryId(v)),
        };
        RecoveryId::from_byte(id).ok_or(SignatureError::InvalidRecoveryId(v))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(digits).map_err(de::Error::custom)?;
        Signature::from_slice(&bytes).map_err(de::Error::custom)
    }
}

/// Address controlled by a secp256k1 public key: last 20 bytes of `keccak256(X ‖ Y)`.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag.
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Sign a 32-byte hash (RFC 6979, low-S) and encode with `v = 27 + recovery_id`.
pub fn sign_hash(key: &SigningKey, hash: FixedBytes<32>) -> Result<Signature, SignatureError> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash.as_slice())
        .map_err(|_| SignatureError::SigningFailed)?;

    let mut sig = [0u8; SIGNATURE_LEN];
    sig[..64].copy_from_slice(&signature.to_bytes());
    sig[64] = 27 + recovery_id.to_byte();
    Ok(Signature(sig))
}

/// Recover the signing address from a 32-byte hash and a signature.
pub fn recover_signer(
    hash: FixedBytes<32>,
    signature: &Signature,
) -> Result<Address, SignatureError> {
    let recovery_id = signature.recovery_id()?;
    let ecdsa = EcdsaSignature::from_slice(&signature.0[..64])
        .map_err(|_| SignatureError::MalformedScalars)?;
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &ecdsa, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(address_of(&key))
}

/// Recover under `scheme` and require the result to be `expected`.
pub fn verify_signer(
    digest: FixedBytes<32>,
    scheme: SignatureScheme,
    signature: &Signature,
    expected: Address,
) -> Result<(), SignatureError> {
    let recovered = recover_signer(scheme.signing_hash(digest), signature)?;
    if recovered != expected {
        return Err(SignatureError::SignerMismatch {
            expected,
            recovered,
        });
    }
    Ok(())
}

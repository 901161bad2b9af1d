//! secp256k1 recoverable signatures.
//!
//! Result signatures are plain Ethereum signatures: `(v, r, s)` with
//! `v = 27 + recovery_id` and low-`s` normalization, so the signer address
//! can be recovered on-chain with `ecrecover`.

use alloy_primitives::{Address, B256};
use ftso_types::voting::EcdsaSignature;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::hash::keccak256;
use crate::{CryptoError, Result};

/// Offset added to the recovery id to form `v`.
const V_OFFSET: u8 = 27;

/// A secp256k1 private key held in memory.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Load a signer from a 32-byte private key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::from_key(key))
    }

    /// Load a signer from a hex private key (optional `0x` prefix).
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(ftso_types::strip_hex_prefix(hex_key.trim()))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Generate a fresh random signer.
    pub fn random() -> Self {
        Self::from_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = public_key_to_address(key.verifying_key());
        Self { key, address }
    }

    /// Ethereum address of this signer.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Private key as lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    /// Sign a 32-byte digest as-is (no further hashing).
    pub fn sign_prehash(&self, digest: &B256) -> Result<EcdsaSignature> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| CryptoError::Signature(e.to_string()))?;
        let bytes = signature.to_bytes();
        Ok(EcdsaSignature {
            v: V_OFFSET + recovery_id.to_byte(),
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..]),
        })
    }
}

/// Recover the address that produced `signature` over `digest`.
///
/// Accepts `v` either as `27/28` or as a raw recovery id `0/1`.
pub fn recover_signer(digest: &B256, signature: &EcdsaSignature) -> Result<Address> {
    let recovery_byte = if signature.v >= V_OFFSET {
        signature.v - V_OFFSET
    } else {
        signature.v
    };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| CryptoError::Signature(format!("invalid v value {}", signature.v)))?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(signature.r.as_slice());
    rs[32..].copy_from_slice(signature.s.as_slice());
    let sig = Signature::from_slice(&rs).map_err(|e| CryptoError::Signature(e.to_string()))?;

    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recovery_id)
        .map_err(|e| {
            tracing::debug!(%digest, v = signature.v, error = %e, "signer recovery failed");
            CryptoError::Signature(e.to_string())
        })?;
    Ok(public_key_to_address(&key))
}

/// Ethereum address of a public key: last 20 bytes of the Keccak-256 of the
/// uncompressed point without its `0x04` tag.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (first account of the common test mnemonic).
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "f39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_known_key_address() {
        let signer = LocalSigner::from_hex(DEV_KEY).expect("key");
        assert_eq!(hex::encode(signer.address()), DEV_ADDRESS);
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = LocalSigner::random();
        let digest = keccak256(b"round 7");
        let sig = signer.sign_prehash(&digest).expect("sign");
        assert!(sig.v == 27 || sig.v == 28);
        assert_eq!(recover_signer(&digest, &sig).expect("recover"), signer.address());
    }

    #[test]
    fn test_recover_accepts_raw_recovery_id() {
        let signer = LocalSigner::random();
        let digest = keccak256(b"raw v");
        let mut sig = signer.sign_prehash(&digest).expect("sign");
        sig.v -= 27;
        assert_eq!(recover_signer(&digest, &sig).expect("recover"), signer.address());
    }

    #[test]
    fn test_wrong_digest_recovers_other_address() {
        let signer = LocalSigner::random();
        let sig = signer.sign_prehash(&keccak256(b"a")).expect("sign");
        let recovered = recover_signer(&keccak256(b"b"), &sig).expect("recover");
        assert_ne!(recovered, signer.address());
    }

    #[test]
    fn test_invalid_v_rejected() {
        let signer = LocalSigner::random();
        let digest = keccak256(b"v");
        let mut sig = signer.sign_prehash(&digest).expect("sign");
        sig.v = 35;
        assert!(matches!(
            recover_signer(&digest, &sig),
            Err(CryptoError::Signature(_))
        ));
    }

    #[test]
    fn test_invalid_key_rejected() {
        assert!(LocalSigner::from_bytes(&[0u8; 32]).is_err());
        assert!(LocalSigner::from_hex("not hex").is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let signer = LocalSigner::random();
        let again = LocalSigner::from_hex(&signer.to_hex()).expect("key");
        assert_eq!(again.address(), signer.address());
    }
}

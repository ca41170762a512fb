//! Optional receipt/ledger-entry signatures: HMAC-SHA256 or Ed25519 over
//! the canonical body excluding the signature field itself.

use base64::Engine;
use ed25519_dalek::Signer as Ed25519Signer;
use ed25519_dalek::Verifier as Ed25519Verifier;
use hmac::Mac;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAlg {
    HmacSha256,
    Ed25519,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub alg: SignatureAlg,
    pub key_id: String,
    /// Base64-encoded raw signature bytes.
    pub signature: String,
}

pub fn sign_hmac(payload: &[u8], key_id: &str, secret: &[u8]) -> LedgerResult<Signature> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| LedgerError::SignatureInvalid)?;
    mac.update(payload);
    let bytes = mac.finalize().into_bytes();
    Ok(Signature {
        alg: SignatureAlg::HmacSha256,
        key_id: key_id.to_string(),
        signature: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

pub fn verify_hmac(payload: &[u8], sig: &Signature, secret: &[u8]) -> bool {
    if sig.alg != SignatureAlg::HmacSha256 {
        return false;
    }
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&sig.signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&bytes).is_ok()
}

pub fn sign_ed25519(payload: &[u8], key_id: &str, signing_key: &ed25519_dalek::SigningKey) -> Signature {
    let sig = signing_key.sign(payload);
    Signature {
        alg: SignatureAlg::Ed25519,
        key_id: key_id.to_string(),
        signature: base64::engine::general_purpose::STANDARD.encode(sig.to_bytes()),
    }
}

pub fn verify_ed25519(payload: &[u8], sig: &Signature, verifying_key: &ed25519_dalek::VerifyingKey) -> bool {
    if sig.alg != SignatureAlg::Ed25519 {
        return false;
    }
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&sig.signature) else {
        return false;
    };
    let Ok(arr): Result<[u8; 64], _> = bytes.try_into() else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&arr);
    verifying_key.verify(payload, &sig).is_ok()
}

/// Resolver by `(tenant_id, key_id)` for signature verification, as named
/// in §4.8/§4.10.
pub trait VerifierResolver {
    fn resolve_hmac_secret(&self, tenant_id: &str, key_id: &str) -> Option<Vec<u8>>;
    fn resolve_ed25519_key(&self, tenant_id: &str, key_id: &str) -> Option<ed25519_dalek::VerifyingKey>;
}

pub fn verify_with_resolver(
    resolver: &dyn VerifierResolver,
    tenant_id: &str,
    payload: &[u8],
    sig: &Signature,
) -> bool {
    match sig.alg {
        SignatureAlg::HmacSha256 => match resolver.resolve_hmac_secret(tenant_id, &sig.key_id) {
            Some(secret) => verify_hmac(payload, sig, &secret),
            None => false,
        },
        SignatureAlg::Ed25519 => match resolver.resolve_ed25519_key(tenant_id, &sig.key_id) {
            Some(key) => verify_ed25519(payload, sig, &key),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_round_trips() {
        let secret = b"top-secret-key";
        let payload = b"hello world";
        let sig = sign_hmac(payload, "k1", secret).unwrap();
        assert!(verify_hmac(payload, &sig, secret));
        assert!(!verify_hmac(b"tampered", &sig, secret));
    }

    #[test]
    fn ed25519_round_trips() {
        use rand::rngs::OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let payload = b"receipt body";
        let sig = sign_ed25519(payload, "k1", &signing_key);
        assert!(verify_ed25519(payload, &sig, &verifying_key));
        assert!(!verify_ed25519(b"tampered", &sig, &verifying_key));
    }
}

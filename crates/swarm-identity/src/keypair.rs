//! Per-node Ed25519 keypair. The secret never leaves this module except as
//! a signature; only `sign`/`public_key` are exposed, following the
//! opaque-handle rule for identity material.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{IdentityError, IdentityResult};

#[must_use = "persist this keypair's secret before dropping it"]
pub struct NodeKeypair {
    signing_key: SigningKey,
}

impl NodeKeypair {
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    pub fn from_secret_hex(hex_str: &str) -> IdentityResult<Self> {
        let bytes = hex::decode(hex_str)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| IdentityError::MalformedKey)?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&arr),
        })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing_key.sign(message).to_bytes())
    }
}

pub fn verify(public_key_hex: &str, message: &[u8], signature_hex: &str) -> IdentityResult<bool> {
    let key_bytes = hex::decode(public_key_hex)?;
    let key_arr: [u8; 32] = key_bytes.try_into().map_err(|_| IdentityError::MalformedKey)?;
    let verifying_key = VerifyingKey::from_bytes(&key_arr).map_err(|_| IdentityError::MalformedKey)?;

    let sig_bytes = hex::decode(signature_hex)?;
    let sig_arr: [u8; 64] = sig_bytes.try_into().map_err(|_| IdentityError::MalformedKey)?;
    let signature = Signature::from_bytes(&sig_arr);

    Ok(verifying_key.verify(message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrips() {
        let kp = NodeKeypair::generate();
        let sig = kp.sign(b"hello swarm");
        assert!(verify(&kp.public_key_hex(), b"hello swarm", &sig).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let kp = NodeKeypair::generate();
        let sig = kp.sign(b"hello swarm");
        assert!(!verify(&kp.public_key_hex(), b"goodbye swarm", &sig).unwrap());
    }

    #[test]
    fn keypair_survives_hex_roundtrip() {
        let kp = NodeKeypair::generate();
        let restored = NodeKeypair::from_secret_hex(&kp.secret_hex()).unwrap();
        assert_eq!(kp.public_key_hex(), restored.public_key_hex());
    }
}

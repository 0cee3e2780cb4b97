use p384::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use p384::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::codec;

/// Size of a raw `r || s` P-384 signature in bytes
pub const SIGNATURE_SIZE: usize = 96;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid signing key encoding: {0}")]
    Decode(String),
    #[error("signing failed: {0}")]
    Sign(String),
}

/// ECDSA P-384 key used to prove authorship of chat messages
///
/// Messages are hashed with SHA-256 and the digest is signed directly,
/// matching WebCrypto's `{ name: "ECDSA", hash: "SHA-256" }` on P-384.
#[derive(Clone)]
pub struct Signer(SigningKey);

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Signer").field(&self.verifier().to_hex()).finish()
    }
}

impl Signer {
    pub fn generate() -> Self {
        Self(SigningKey::random(&mut OsRng))
    }

    pub fn from_hex(hex: &str) -> Result<Self, SignatureError> {
        let bytes = codec::from_hex(hex).map_err(|e| SignatureError::Decode(e.to_string()))?;
        let key = SigningKey::from_slice(&bytes).map_err(|e| SignatureError::Decode(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        codec::to_hex(self.0.to_bytes())
    }

    pub fn verifier(&self) -> Verifier {
        Verifier(self.0.verifying_key().clone())
    }

    /// Sign a message, returning the hex encoded `r || s` signature
    pub fn sign(&self, message: &str) -> Result<String, SignatureError> {
        let digest = Sha256::digest(message.as_bytes());
        let signature: Signature = self
            .0
            .sign_prehash(&digest)
            .map_err(|e| SignatureError::Sign(e.to_string()))?;
        Ok(codec::to_hex(signature.to_bytes()))
    }
}

/// Public half of a [`Signer`], carried next to signed messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier(VerifyingKey);

impl Verifier {
    /// Parse a hex encoded uncompressed SEC1 point
    pub fn from_hex(hex: &str) -> Result<Self, SignatureError> {
        let bytes = codec::from_hex(hex).map_err(|e| SignatureError::Decode(e.to_string()))?;
        let public_key = p384::PublicKey::from_sec1_bytes(&bytes)
            .map_err(|e| SignatureError::Decode(e.to_string()))?;
        Ok(Self(VerifyingKey::from(public_key)))
    }

    pub fn to_hex(&self) -> String {
        let public_key = p384::PublicKey::from(&self.0);
        codec::to_hex(public_key.to_encoded_point(false).as_bytes())
    }

    /// Check a hex signature over `message`
    ///
    /// Malformed signatures verify as `false`; a bad signature is a trust
    /// warning for the reader, not an error.
    pub fn verify(&self, message: &str, signature: &str) -> bool {
        let Ok(bytes) = codec::from_hex(signature) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&bytes) else {
            return false;
        };
        let digest = Sha256::digest(message.as_bytes());
        self.0.verify_prehash(&digest, &signature).is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Signer::generate();
        let verifier = signer.verifier();
        let message = "hello, world!";

        let signature = signer.sign(message).unwrap();
        assert_eq!(signature.len(), SIGNATURE_SIZE * 2);
        assert!(verifier.verify(message, &signature));

        // wrong message
        assert!(!verifier.verify("hello, world?", &signature));

        // wrong key
        let other = Signer::generate().verifier();
        assert!(!other.verify(message, &signature));

        // garbage signature
        assert!(!verifier.verify(message, "abcd"));
        assert!(!verifier.verify(message, "not hex"));
    }

    #[test]
    fn test_key_encodings() {
        let signer = Signer::generate();

        let recovered = Signer::from_hex(&signer.to_hex()).unwrap();
        assert_eq!(recovered.verifier(), signer.verifier());

        let verifier_hex = signer.verifier().to_hex();
        // uncompressed point: 0x04 || x || y
        assert!(verifier_hex.starts_with("04"));
        assert_eq!(verifier_hex.len(), (1 + 48 * 2) * 2);
        assert_eq!(Verifier::from_hex(&verifier_hex).unwrap(), signer.verifier());

        assert!(Verifier::from_hex("04abcd").is_err());
    }
}

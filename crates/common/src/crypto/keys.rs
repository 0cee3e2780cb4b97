use std::ops::Deref;

use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::codec;

/// Modulus size of generated RSA keys
pub const RSA_KEY_BITS: usize = 2048;
/// Output size of the OAEP hash (SHA-256)
pub const OAEP_HASH_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    KeyGen(String),
    #[error("invalid key encoding: {0}")]
    Decode(String),
    #[error("{bits}-bit keys are not accepted, expected {}", RSA_KEY_BITS)]
    UnsupportedSize { bits: usize },
    #[error("plaintext is {len} bytes, at most {max} bytes fit in one ciphertext")]
    PlaintextTooLarge { len: usize, max: usize },
    #[error("encryption failed: {0}")]
    Encrypt(String),
    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// RSA-OAEP public key used to address one participant
///
/// On the wire this is the hex encoding of the SubjectPublicKeyInfo DER,
/// the same bytes a browser produces with `exportKey("spki", ..)`.
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate()?;
/// let public_key = secret_key.public();
///
/// let hex = public_key.to_hex()?;
/// let recovered = PublicKey::from_hex(&hex)?;
/// let ciphertext = recovered.encrypt("hello")?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl Deref for PublicKey {
    type Target = RsaPublicKey;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(key: RsaPublicKey) -> Self {
        PublicKey(key)
    }
}

impl PublicKey {
    /// Parse a public key from hex encoded SPKI DER
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings. Only
    /// [`RSA_KEY_BITS`] moduli are accepted; a smaller key would shrink
    /// [`PublicKey::max_plaintext_len`] for every message sent to it.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let der = codec::from_hex(hex).map_err(|e| KeyError::Decode(e.to_string()))?;
        let key =
            RsaPublicKey::from_public_key_der(&der).map_err(|e| KeyError::Decode(e.to_string()))?;
        let bits = key.size() * 8;
        if bits != RSA_KEY_BITS {
            return Err(KeyError::UnsupportedSize { bits });
        }
        Ok(Self(key))
    }

    /// Export as hex encoded SPKI DER
    pub fn to_hex(&self) -> Result<String, KeyError> {
        let der = self
            .0
            .to_public_key_der()
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        Ok(codec::to_hex(der.as_bytes()))
    }

    /// Largest plaintext (in bytes) a single OAEP block can carry
    ///
    /// `k - 2*hLen - 2`, which is 190 bytes for a 2048-bit modulus with SHA-256.
    pub fn max_plaintext_len(&self) -> usize {
        self.0.size().saturating_sub(2 * OAEP_HASH_SIZE + 2)
    }

    /// Encrypt a short plaintext with RSA-OAEP (SHA-256)
    ///
    /// Returns the ciphertext as hex. Plaintexts longer than
    /// [`PublicKey::max_plaintext_len`] are rejected, never truncated.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, KeyError> {
        let data = plaintext.as_bytes();
        let max = self.max_plaintext_len();
        if data.len() > max {
            return Err(KeyError::PlaintextTooLarge {
                len: data.len(),
                max,
            });
        }

        let ciphertext = self
            .0
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data)
            .map_err(|e| KeyError::Encrypt(e.to_string()))?;
        Ok(codec::to_hex(ciphertext))
    }
}

/// RSA-OAEP private key, never placed on the wire
///
/// # Examples
///
/// ```ignore
/// let secret_key = SecretKey::generate()?;
///
/// let pem = secret_key.to_pem()?;
/// let recovered = SecretKey::from_pem(&pem)?;
/// ```
#[derive(Clone)]
pub struct SecretKey(RsaPrivateKey);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bits", &(self.0.size() * 8))
            .finish_non_exhaustive()
    }
}

impl SecretKey {
    /// Generate a new 2048-bit keypair using the OS RNG
    pub fn generate() -> Result<Self, KeyError> {
        let key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| KeyError::KeyGen(e.to_string()))?;
        Ok(Self(key))
    }

    /// Derive the public half of this keypair
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.to_public_key())
    }

    /// Parse a private key from hex encoded PKCS#8 DER
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let der = codec::from_hex(hex).map_err(|e| KeyError::Decode(e.to_string()))?;
        Self::from_der(&der)
    }

    /// Export as hex encoded PKCS#8 DER
    pub fn to_hex(&self) -> Result<String, KeyError> {
        Ok(codec::to_hex(self.to_der()?))
    }

    /// Encode the key in PEM format with tag "PRIVATE KEY"
    pub fn to_pem(&self) -> Result<String, KeyError> {
        let pem = pem::Pem::new("PRIVATE KEY", self.to_der()?);
        Ok(pem::encode(&pem))
    }

    /// Parse a private key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "PRIVATE KEY"
    /// - The contents are not a PKCS#8 RSA key
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str)
            .map_err(|e| KeyError::Decode(format!("failed to parse PEM: {}", e)))?;

        if pem.tag() != "PRIVATE KEY" {
            return Err(KeyError::Decode(
                "invalid PEM tag, expected PRIVATE KEY".to_string(),
            ));
        }

        Self::from_der(pem.contents())
    }

    fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| KeyError::Decode(e.to_string()))?;
        Ok(Self(key))
    }

    fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let der = self
            .0
            .to_pkcs8_der()
            .map_err(|e| KeyError::Decode(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    /// Decrypt a hex ciphertext produced by [`PublicKey::encrypt`]
    ///
    /// Any decoding or cryptographic failure is reported as
    /// [`KeyError::Decrypt`]; callers isolate it per message.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, KeyError> {
        let bytes = codec::from_hex(ciphertext).map_err(|e| KeyError::Decrypt(e.to_string()))?;
        let plaintext = self
            .0
            .decrypt(Oaep::new::<Sha256>(), &bytes)
            .map_err(|e| KeyError::Decrypt(e.to_string()))?;
        String::from_utf8(plaintext).map_err(|e| KeyError::Decrypt(e.to_string()))
    }
}

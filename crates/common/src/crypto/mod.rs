//! Cryptographic primitives for tunnel channels
//!
//! - **Per-recipient encryption**: RSA-OAEP (SHA-256) keypairs. Each outbound
//!   message is encrypted once per recipient public key, so a plaintext must
//!   fit in a single OAEP block (190 bytes for 2048-bit keys).
//! - **Message authenticity**: ECDSA P-384 signatures over a SHA-256 digest,
//!   checked by readers and reported as warnings on failure.
//!
//! Only public halves ever leave the process. Private keys live as long as
//! the channel that generated them and are never persisted by the protocol.

mod keys;
mod signing;

pub use keys::{KeyError, PublicKey, SecretKey, OAEP_HASH_SIZE, RSA_KEY_BITS};
pub use signing::{SignatureError, Signer, Verifier, SIGNATURE_SIZE};

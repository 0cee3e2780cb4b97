/**
 * Tunnel channels: the public abstraction.
 *  Create, init, connect, send and close a
 *  multi-participant channel, plus the
 *  key exchange that runs alongside it.
 */
pub mod channel;
/**
 * Stateless text encodings used on the wire:
 *  hex, base64, gzip and SHA-256 digests.
 */
pub mod codec;
/**
 * Cryptographic types and operations.
 *  - RSA-OAEP keys for per-recipient encryption
 *  - ECDSA P-384 message signing
 */
pub mod crypto;
/**
 * Participant identities and the store of
 *  public keys learned from the key exchange.
 */
pub mod keystore;
/**
 * The chat message envelope carried inside
 *  a tunnel, with its integrity checks.
 */
pub mod message;
/**
 * One participant's chat session: a tunnel
 *  channel, a display name and an optional
 *  signing key bundled together.
 */
pub mod session;
/**
 * In-process harness for multi-participant tests.
 */
pub mod testkit;
/**
 * Broker interface and its implementations:
 *  the hosted HTTP relay and an in-memory broker.
 */
pub mod transport;

pub mod prelude {
    pub use crate::channel::{
        ChannelError, ChannelEvent, SubscriptionHandle, TunnelChannel, TunnelConfig,
        TunnelIdentity,
    };
    pub use crate::crypto::{PublicKey, SecretKey, Signer, Verifier};
    pub use crate::keystore::{KeyRecord, ParticipantId, ParticipantKeyStore};
    pub use crate::message::ChatMessage;
    pub use crate::session::{Session, SessionEvent, SessionOptions};
    pub use crate::transport::{HttpTransport, Transport};
}

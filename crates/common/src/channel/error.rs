use std::time::Duration;

use crate::keystore::ParticipantId;
use crate::transport::TransportError;

/// Everything that can go wrong on a tunnel channel
///
/// Operation failures (`CreateFailed`, `KeyGenFailed`, `PlaintextTooLarge`,
/// `Transport`, ...) are returned to the caller. Per-message failures
/// (`DecryptFailed`, `MalformedPayload`, `TamperDetected`, `SignatureInvalid`)
/// are reported next to the stream and never end it.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to create tunnel: {0}")]
    CreateFailed(TransportError),
    #[error("key generation failed: {0}")]
    KeyGenFailed(String),
    #[error("message for {recipient} is {len} bytes, at most {max} bytes can be encrypted")]
    PlaintextTooLarge {
        recipient: ParticipantId,
        len: usize,
        max: usize,
    },
    #[error("failed to decrypt payload: {0}")]
    DecryptFailed(String),
    #[error("message content does not match its hash")]
    TamperDetected,
    #[error("message signature did not verify")]
    SignatureInvalid,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("channel has no keypair yet, init it first")]
    NotInitialized,
    #[error("channel is already connected")]
    AlreadyConnected,
    #[error("no known recipients to encrypt for")]
    NoRecipients,
    #[error("channel is closed")]
    Closed,
    #[error("own key was not ready within {0:?}")]
    KeyExchangeTimeout(Duration),
    #[error("signed messages do not fit in an encrypted tunnel")]
    SignedEncryption,
}

impl ChannelError {
    /// Whether this error concerns a single inbound message only
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            ChannelError::DecryptFailed(_)
                | ChannelError::MalformedPayload(_)
                | ChannelError::TamperDetected
                | ChannelError::SignatureInvalid
        )
    }
}

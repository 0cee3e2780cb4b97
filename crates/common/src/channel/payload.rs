use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::ChannelError;
use crate::codec;
use crate::crypto::{KeyError, SecretKey};
use crate::keystore::{ParticipantId, ParticipantKeyStore};

/// How a channel turns application data into wire payloads and back
pub trait PayloadCodec: Send + Sync + 'static {
    /// Encode outbound data into the payload to publish
    fn encode(&self, data: &str) -> Result<String, ChannelError>;

    /// Decode an inbound payload
    ///
    /// Returns `Ok(None)` when the payload carries nothing for this
    /// participant, which is not an error.
    fn decode(&self, payload: &str) -> Result<Option<String>, ChannelError>;
}

/// Pass-through codec
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl PayloadCodec for Plain {
    fn encode(&self, data: &str) -> Result<String, ChannelError> {
        Ok(data.to_string())
    }

    fn decode(&self, payload: &str) -> Result<Option<String>, ChannelError> {
        Ok(Some(payload.to_string()))
    }
}

/// Per-recipient RSA envelope
///
/// Outbound data is encrypted once for every known participant except
/// ourselves and published as a single JSON object mapping participant id to
/// hex ciphertext. Inbound, only the entry addressed to us is opened.
#[derive(Debug, Clone)]
pub struct Sealer {
    own_id: ParticipantId,
    secret: Arc<SecretKey>,
    store: ParticipantKeyStore,
}

impl Sealer {
    pub fn new(own_id: ParticipantId, secret: Arc<SecretKey>, store: ParticipantKeyStore) -> Self {
        Self {
            own_id,
            secret,
            store,
        }
    }

    pub fn seal(&self, data: &str) -> Result<String, ChannelError> {
        let recipients = self.store.recipients(&self.own_id);
        if recipients.is_empty() {
            return Err(ChannelError::NoRecipients);
        }

        let mut envelope = BTreeMap::new();
        for record in recipients {
            let public_key = record
                .public_key()
                .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
            let ciphertext = public_key.encrypt(data).map_err(|e| match e {
                KeyError::PlaintextTooLarge { len, max } => ChannelError::PlaintextTooLarge {
                    recipient: record.participant_id.clone(),
                    len,
                    max,
                },
                other => ChannelError::MalformedPayload(other.to_string()),
            })?;
            tracing::debug!("encrypted message for {}", record.participant_id);
            envelope.insert(record.participant_id, ciphertext);
        }

        serde_json::to_string(&envelope).map_err(|e| ChannelError::MalformedPayload(e.to_string()))
    }

    pub fn open(&self, payload: &str) -> Result<Option<String>, ChannelError> {
        let envelope: BTreeMap<ParticipantId, String> = serde_json::from_str(payload)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;

        let Some(ciphertext) = envelope.get(&self.own_id) else {
            return Ok(None);
        };
        let plaintext = self
            .secret
            .decrypt(ciphertext)
            .map_err(|e| ChannelError::DecryptFailed(e.to_string()))?;
        Ok(Some(plaintext))
    }
}

/// Codec of a tunnel's data channel: optional compression, then optional sealing
///
/// Outbound: `gzip -> base64 -> seal`. Inbound runs the same steps backwards.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub compression: bool,
    pub sealer: Option<Sealer>,
}

impl PayloadCodec for Pipeline {
    fn encode(&self, data: &str) -> Result<String, ChannelError> {
        let body = if self.compression {
            codec::compress(data).map_err(|e| ChannelError::MalformedPayload(e.to_string()))?
        } else {
            data.to_string()
        };

        match &self.sealer {
            Some(sealer) => sealer.seal(&body),
            None => Ok(body),
        }
    }

    fn decode(&self, payload: &str) -> Result<Option<String>, ChannelError> {
        let body = match &self.sealer {
            Some(sealer) => match sealer.open(payload)? {
                Some(body) => body,
                None => return Ok(None),
            },
            None => payload.to_string(),
        };

        if self.compression {
            let data = codec::decompress(&body)
                .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
            Ok(Some(data))
        } else {
            Ok(Some(body))
        }
    }
}

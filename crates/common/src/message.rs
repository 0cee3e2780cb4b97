use serde::{Deserialize, Serialize};

use crate::channel::ChannelError;
use crate::codec;
use crate::crypto::{Signer, Verifier};

/// A chat message as it travels inside a tunnel
///
/// `hash` is the SHA-256 of `message`. When the sender signs, `signature`
/// covers `message` as well and `public_key` carries the verifying key.
/// Neither proves who the sender is; they only tie the text to whoever
/// holds the signing key.
///
/// Encrypted tunnels carry the [`ChatMessage::compact`] form, `{sender,
/// message}`, since every byte counts against the per-recipient RSA block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: String,
    /// Empty on compact messages until the receiver stamps it
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl ChatMessage {
    /// Build a message stamped with the current local time
    pub fn compose(
        sender: &str,
        body: &str,
        signer: Option<&Signer>,
    ) -> Result<Self, ChannelError> {
        let (signature, public_key) = match signer {
            Some(signer) => {
                let signature = signer
                    .sign(body)
                    .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
                (Some(signature), Some(signer.verifier().to_hex()))
            }
            None => (None, None),
        };

        Ok(Self {
            sender: sender.to_string(),
            time: local_time(),
            message: body.to_string(),
            hash: Some(codec::hash(body)),
            signature,
            public_key,
        })
    }

    /// Build the `{sender, message}` form used inside encrypted tunnels
    ///
    /// OAEP already rejects altered ciphertexts, so the hash adds nothing
    /// there; the receiver supplies the time.
    pub fn compact(sender: &str, body: &str) -> Self {
        Self {
            sender: sender.to_string(),
            time: String::new(),
            message: body.to_string(),
            hash: None,
            signature: None,
            public_key: None,
        }
    }

    /// Fill in the local time if the sender left it out
    pub fn stamp_if_missing(&mut self) {
        if self.time.is_empty() {
            self.time = local_time();
        }
    }

    /// Run the integrity and signature checks
    ///
    /// Returns every problem found. A message with problems is still a
    /// message; callers decide how loudly to warn.
    pub fn inspect(&self) -> Vec<ChannelError> {
        let mut problems = Vec::new();

        if let Some(hash) = &self.hash {
            if !hash.eq_ignore_ascii_case(&codec::hash(&self.message)) {
                problems.push(ChannelError::TamperDetected);
            }
        }

        match (&self.signature, &self.public_key) {
            (Some(signature), Some(public_key)) => {
                let verified = Verifier::from_hex(public_key)
                    .map(|verifier| verifier.verify(&self.message, signature))
                    .unwrap_or(false);
                if !verified {
                    problems.push(ChannelError::SignatureInvalid);
                }
            }
            (None, None) => {}
            // half a signature cannot be checked
            _ => problems.push(ChannelError::SignatureInvalid),
        }

        problems
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

fn local_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

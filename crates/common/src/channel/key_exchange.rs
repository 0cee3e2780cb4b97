use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::channel::{Channel, ChannelEvent, EventHandler, SubscriptionHandle};
use super::error::ChannelError;
use super::payload::Plain;
use crate::crypto::PublicKey;
use crate::keystore::{KeyRecord, ParticipantId, ParticipantKeyStore};

/// What became of one inbound announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeOutcome {
    /// A new participant's key was stored and ours was re-announced
    Stored,
    /// The participant was already known
    AlreadyKnown,
    /// Our own announcement echoed back
    OwnKey,
    /// Not a usable announcement
    Malformed,
}

struct KeyExchangeInner {
    channel: Channel<Plain>,
    store: ParticipantKeyStore,
    own_id: ParticipantId,
    key_ready_timeout: Duration,
}

/// Flooding public-key exchange on a tunnel's `keyExchange` sub-channel
///
/// Every participant re-announces its own key whenever it learns a new one,
/// so each newcomer triggers one round of announcements from everyone
/// already present. The store's first-wins insert ends the flood.
#[derive(Clone)]
pub struct KeyExchange {
    inner: Arc<KeyExchangeInner>,
    subscription: SubscriptionHandle,
}

impl std::fmt::Debug for KeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyExchange")
            .field("identity", self.inner.channel.identity())
            .field("own_id", &self.inner.own_id)
            .field("known", &self.inner.store.len())
            .finish()
    }
}

impl KeyExchange {
    pub fn new(
        channel: Channel<Plain>,
        store: ParticipantKeyStore,
        own_id: ParticipantId,
        key_ready_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(KeyExchangeInner {
                channel,
                store,
                own_id,
                key_ready_timeout,
            }),
            subscription: SubscriptionHandle::default(),
        }
    }

    /// Start listening for announcements
    pub async fn connect(&mut self) -> Result<(), ChannelError> {
        if self.subscription.is_active() {
            return Ok(());
        }
        let handler = KeyExchangeHandler {
            exchange: self.clone(),
        };
        self.subscription = self.inner.channel.subscribe(handler).await?;
        Ok(())
    }

    /// Publish our own key record
    ///
    /// Waits until our record is in the store, which it normally already is.
    pub async fn announce(&self) -> Result<(), ChannelError> {
        let inner = &self.inner;
        let record = inner
            .store
            .wait_for(&inner.own_id, inner.key_ready_timeout)
            .await
            .ok_or(ChannelError::KeyExchangeTimeout(inner.key_ready_timeout))?;

        let announcement = serde_json::to_string(&record)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        inner.channel.publish(&announcement).await?;
        tracing::debug!("announced key of {}", inner.own_id);
        Ok(())
    }

    /// Process one inbound announcement
    pub async fn handle(&self, payload: &str) -> KeyExchangeOutcome {
        let inner = &self.inner;
        let record: KeyRecord = match serde_json::from_str(payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("ignoring malformed key announcement: {}", e);
                return KeyExchangeOutcome::Malformed;
            }
        };

        if record.participant_id.as_str().is_empty() || record.public_key.is_empty() {
            tracing::warn!("ignoring key announcement with empty fields");
            return KeyExchangeOutcome::Malformed;
        }
        if record.participant_id == inner.own_id {
            return KeyExchangeOutcome::OwnKey;
        }
        if inner.store.contains(&record.participant_id) {
            return KeyExchangeOutcome::AlreadyKnown;
        }
        if let Err(e) = PublicKey::from_hex(&record.public_key) {
            tracing::warn!(
                "ignoring unusable key announced by {}: {}",
                record.participant_id,
                e
            );
            return KeyExchangeOutcome::Malformed;
        }

        let participant = record.participant_id.clone();
        if !inner.store.insert(record) {
            // lost a race with a concurrent announcement of the same id
            return KeyExchangeOutcome::AlreadyKnown;
        }
        tracing::info!("learned key of {}", participant);

        if let Err(e) = self.announce().await {
            tracing::warn!("failed to re-announce own key: {}", e);
        }
        KeyExchangeOutcome::Stored
    }

    pub fn close(&self) {
        self.subscription.close();
    }

    pub fn is_connected(&self) -> bool {
        self.subscription.is_active()
    }
}

struct KeyExchangeHandler {
    exchange: KeyExchange,
}

#[async_trait]
impl EventHandler for KeyExchangeHandler {
    async fn handle(&self, event: ChannelEvent) {
        if let ChannelEvent::Message(payload) = event {
            self.exchange.handle(&payload).await;
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::channel::{ChannelError, ChannelEvent, TunnelChannel, TunnelConfig, TunnelIdentity};
use crate::keystore::ParticipantId;
use crate::transport::MemoryBroker;

/// A tunnel participant with its inbox, for integration testing
pub struct TestParticipant {
    /// The name of this participant (for debugging)
    pub name: String,
    channel: TunnelChannel,
    /// Decoded messages in arrival order
    inbox: Arc<Mutex<Vec<String>>>,
    /// Inbound payloads that failed to decode
    notices: Arc<Mutex<Vec<ChannelError>>>,
}

impl TestParticipant {
    /// Create, initialise and connect a participant on `broker`
    ///
    /// # Arguments
    /// * `name` - A name for this participant (useful for debugging)
    /// * `tunnel_id` - The tunnel to join
    /// * `config` - Channel configuration
    /// * `key_ready_timeout` - Bound on the own-key readiness wait
    pub async fn join(
        name: impl Into<String>,
        broker: &MemoryBroker,
        tunnel_id: &str,
        config: TunnelConfig,
        key_ready_timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let mut channel = TunnelChannel::builder(tunnel_id)
            .config(config)
            .key_ready_timeout(key_ready_timeout)
            .build(Arc::new(broker.clone()));

        channel.create().await?;
        channel.init().await?;

        let inbox = Arc::new(Mutex::new(Vec::new()));
        let notices = Arc::new(Mutex::new(Vec::new()));
        let (messages, errors) = (inbox.clone(), notices.clone());
        let tag = name.clone();
        channel
            .connect(move |event: ChannelEvent| match event {
                ChannelEvent::Message(data) => {
                    tracing::trace!("[{}] received {}", tag, data);
                    messages.lock().push(data);
                }
                ChannelEvent::Dropped(e) => errors.lock().push(e),
            })
            .await?;

        tracing::info!(
            "[{}] joined {} as {}",
            name,
            channel.identity(),
            channel.participant_id()
        );

        Ok(Self {
            name,
            channel,
            inbox,
            notices,
        })
    }

    pub fn id(&self) -> &ParticipantId {
        self.channel.participant_id()
    }

    pub fn identity(&self) -> &TunnelIdentity {
        self.channel.identity()
    }

    /// Get reference to the underlying channel
    pub fn channel(&self) -> &TunnelChannel {
        &self.channel
    }

    pub async fn send(&self, data: &str) -> Result<()> {
        self.channel
            .send(data)
            .await
            .map_err(|e| anyhow!("[{}] send failed: {}", self.name, e))
    }

    /// Snapshot of everything received so far
    pub fn messages(&self) -> Vec<String> {
        self.inbox.lock().clone()
    }

    pub fn has_received(&self, data: &str) -> bool {
        self.inbox.lock().iter().any(|message| message == data)
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().len()
    }

    /// Number of keys this participant holds, its own included
    pub fn known_keys(&self) -> usize {
        self.channel.store().len()
    }

    pub fn knows(&self, other: &TestParticipant) -> bool {
        self.channel.store().contains(other.id())
    }

    pub fn close(&mut self) {
        tracing::debug!("[{}] closing", self.name);
        self.channel.close();
    }
}

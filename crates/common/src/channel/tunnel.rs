use std::sync::Arc;
use std::time::Duration;

use super::channel::{Channel, EventHandler, SubscriptionHandle};
use super::config::{
    TunnelConfig, TunnelIdentity, DEFAULT_KEY_READY_TIMEOUT, KEY_EXCHANGE_SUB_CHANNEL,
    MAIN_SUB_CHANNEL,
};
use super::error::ChannelError;
use super::key_exchange::KeyExchange;
use super::payload::{Pipeline, Plain, Sealer};
use crate::crypto::SecretKey;
use crate::keystore::{KeyRecord, ParticipantId, ParticipantKeyStore};
use crate::transport::Transport;

/// Lifecycle of a [`TunnelChannel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Built, nothing sent to the broker yet
    Created,
    /// The broker knows the tunnel
    Provisioned,
    /// Own keypair generated and key exchange running
    KeyReady,
    /// Initialised without encryption
    Unencrypted,
    /// Receiving the data stream
    Streaming,
    /// Closed for good
    Closed,
}

#[derive(Debug, Clone)]
pub struct TunnelChannelBuilder {
    tunnel_id: String,
    /// defaults to "main"
    sub_channel: Option<String>,
    config: TunnelConfig,
    key_ready_timeout: Option<Duration>,
    /// generated if not set
    participant_id: Option<ParticipantId>,
}

impl TunnelChannelBuilder {
    /// Start a builder for `tunnel_id`
    ///
    /// The id is ignored on create when the config asks for a random one.
    pub fn new(tunnel_id: impl Into<String>) -> Self {
        Self {
            tunnel_id: tunnel_id.into(),
            sub_channel: None,
            config: TunnelConfig::default(),
            key_ready_timeout: None,
            participant_id: None,
        }
    }

    pub fn sub_channel(mut self, sub_channel: impl Into<String>) -> Self {
        self.sub_channel = Some(sub_channel.into());
        self
    }

    pub fn config(mut self, config: TunnelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn key_ready_timeout(mut self, timeout: Duration) -> Self {
        self.key_ready_timeout = Some(timeout);
        self
    }

    pub fn participant_id(mut self, participant_id: ParticipantId) -> Self {
        self.participant_id = Some(participant_id);
        self
    }

    pub fn build(self, transport: Arc<dyn Transport>) -> TunnelChannel {
        let sub_channel = self
            .sub_channel
            .unwrap_or_else(|| MAIN_SUB_CHANNEL.to_string());
        let participant_id = self.participant_id.unwrap_or_else(ParticipantId::generate);

        TunnelChannel {
            identity: TunnelIdentity::new(self.tunnel_id, sub_channel),
            config: self.config,
            transport,
            participant_id,
            store: ParticipantKeyStore::new(),
            secret: None,
            key_exchange: None,
            subscription: SubscriptionHandle::default(),
            state: ChannelState::Created,
            key_ready_timeout: self.key_ready_timeout.unwrap_or(DEFAULT_KEY_READY_TIMEOUT),
        }
    }
}

/// A named multi-participant channel on top of a publish/subscribe broker
///
/// Typical use is `create -> init -> connect`, then `send` as often as
/// needed, and `close` at the end. With encryption on, `init` generates an
/// RSA keypair and runs a [`KeyExchange`] on the tunnel's `keyExchange`
/// sub-channel; every `send` then encrypts one copy of the message per
/// participant known at that moment.
#[derive(Debug)]
pub struct TunnelChannel {
    identity: TunnelIdentity,
    config: TunnelConfig,
    transport: Arc<dyn Transport>,
    participant_id: ParticipantId,
    store: ParticipantKeyStore,
    secret: Option<Arc<SecretKey>>,
    key_exchange: Option<KeyExchange>,
    subscription: SubscriptionHandle,
    state: ChannelState,
    key_ready_timeout: Duration,
}

impl TunnelChannel {
    pub fn builder(tunnel_id: impl Into<String>) -> TunnelChannelBuilder {
        TunnelChannelBuilder::new(tunnel_id)
    }

    pub fn identity(&self) -> &TunnelIdentity {
        &self.identity
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    pub fn participant_id(&self) -> &ParticipantId {
        &self.participant_id
    }

    /// Keys known to this participant, including its own
    pub fn store(&self) -> &ParticipantKeyStore {
        &self.store
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Provision the tunnel on the broker
    ///
    /// With `random` set the broker picks the id and it replaces ours.
    pub async fn create(&mut self) -> Result<TunnelIdentity, ChannelError> {
        match self.state {
            ChannelState::Closed => return Err(ChannelError::Closed),
            ChannelState::Streaming => return Err(ChannelError::AlreadyConnected),
            _ => {}
        }

        let requested = (!self.config.random).then_some(self.identity.tunnel_id.as_str());
        let tunnel_id = self
            .transport
            .create(requested)
            .await
            .map_err(ChannelError::CreateFailed)?;

        tracing::info!("tunnel {} provisioned", tunnel_id);
        self.identity.tunnel_id = tunnel_id;
        if self.state == ChannelState::Created {
            self.state = ChannelState::Provisioned;
        }
        Ok(self.identity.clone())
    }

    /// Prepare encryption: generate our keypair and join the key exchange
    ///
    /// Does nothing beyond a state change when encryption is off, and
    /// nothing at all when already initialised.
    pub async fn init(&mut self) -> Result<(), ChannelError> {
        if self.state == ChannelState::Closed {
            return Err(ChannelError::Closed);
        }
        if !self.config.encryption {
            if matches!(self.state, ChannelState::Created | ChannelState::Provisioned) {
                self.state = ChannelState::Unencrypted;
            }
            return Ok(());
        }
        if self.secret.is_some() {
            return Ok(());
        }

        // 2048-bit generation takes long enough to stall the runtime
        let secret = tokio::task::spawn_blocking(SecretKey::generate)
            .await
            .map_err(|e| ChannelError::KeyGenFailed(e.to_string()))?
            .map_err(|e| ChannelError::KeyGenFailed(e.to_string()))?;
        let record = KeyRecord::new(self.participant_id.clone(), &secret.public())
            .map_err(|e| ChannelError::KeyGenFailed(e.to_string()))?;
        tracing::debug!("generated keypair for {}", self.participant_id);

        let channel = Channel::new(
            self.identity.with_sub_channel(KEY_EXCHANGE_SUB_CHANNEL),
            self.transport.clone(),
            Plain,
        );
        let mut key_exchange = KeyExchange::new(
            channel,
            self.store.clone(),
            self.participant_id.clone(),
            self.key_ready_timeout,
        );
        key_exchange.connect().await?;

        // only stored once nothing can fail, a stored own key is never replaced
        self.store.insert(record);
        self.secret = Some(Arc::new(secret));
        self.key_exchange = Some(key_exchange.clone());
        if matches!(self.state, ChannelState::Created | ChannelState::Provisioned) {
            self.state = ChannelState::KeyReady;
        }

        if !self.config.first_user {
            key_exchange.announce().await?;
        }
        Ok(())
    }

    /// The data channel with the codec our config calls for
    fn data_channel(&self) -> Result<Channel<Pipeline>, ChannelError> {
        let sealer = if self.config.encryption {
            let secret = self.secret.clone().ok_or(ChannelError::NotInitialized)?;
            Some(Sealer::new(
                self.participant_id.clone(),
                secret,
                self.store.clone(),
            ))
        } else {
            None
        };

        Ok(Channel::new(
            self.identity.clone(),
            self.transport.clone(),
            Pipeline {
                compression: self.config.compression,
                sealer,
            },
        ))
    }

    /// Open the live data stream and feed decoded messages to `handler`
    ///
    /// Returns the existing handle if the stream is already open.
    pub async fn connect<H: EventHandler>(
        &mut self,
        handler: H,
    ) -> Result<SubscriptionHandle, ChannelError> {
        if self.state == ChannelState::Closed {
            return Err(ChannelError::Closed);
        }
        if self.subscription.is_active() {
            return Ok(self.subscription.clone());
        }

        let channel = self.data_channel()?;
        self.subscription = channel.subscribe(handler).await?;
        self.state = ChannelState::Streaming;
        tracing::debug!("{} streaming {}", self.participant_id, self.identity);
        Ok(self.subscription.clone())
    }

    /// Publish `data` to everyone on the tunnel
    ///
    /// Encrypted sends fail without touching the network if nobody else's
    /// key is known yet or `data` is too long for any recipient's key.
    pub async fn send(&self, data: &str) -> Result<(), ChannelError> {
        if self.state == ChannelState::Closed {
            return Err(ChannelError::Closed);
        }

        let channel = self.data_channel()?;
        if let Err(e) = channel.publish(data).await {
            tracing::error!("failed to send on {}: {}", self.identity, e);
            return Err(e);
        }
        Ok(())
    }

    /// Stop both streams and forget our keypair
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.subscription.close();
        if let Some(key_exchange) = self.key_exchange.take() {
            key_exchange.close();
        }
        self.secret = None;
        self.state = ChannelState::Closed;
        tracing::debug!("closed {}", self.identity);
    }
}

impl Drop for TunnelChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::channel::ChannelEvent;
    use crate::transport::MemoryBroker;

    fn channel(broker: &MemoryBroker, config: TunnelConfig) -> TunnelChannel {
        TunnelChannel::builder("room1")
            .config(config)
            .key_ready_timeout(Duration::from_secs(1))
            .build(Arc::new(broker.clone()))
    }

    #[tokio::test]
    async fn test_create_with_given_and_random_id() {
        let broker = MemoryBroker::new();

        let mut fixed = channel(&broker, TunnelConfig::default());
        let identity = fixed.create().await.unwrap();
        assert_eq!(identity, TunnelIdentity::new("room1", "main"));
        assert_eq!(fixed.state(), ChannelState::Provisioned);

        let mut random = channel(
            &broker,
            TunnelConfig {
                random: true,
                ..Default::default()
            },
        );
        let identity = random.create().await.unwrap();
        assert_ne!(identity.tunnel_id, "room1");
        assert!(broker.has_tunnel(&identity.tunnel_id));
        assert_eq!(random.identity(), &identity);
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let broker = MemoryBroker::new();
        let mut channel = TunnelChannel::builder("bad id").build(Arc::new(broker));
        assert!(matches!(
            channel.create().await,
            Err(ChannelError::CreateFailed(_))
        ));
        assert_eq!(channel.state(), ChannelState::Created);
    }

    #[tokio::test]
    async fn test_unencrypted_lifecycle() {
        let broker = MemoryBroker::new();
        let mut channel = channel(&broker, TunnelConfig::default());
        channel.create().await.unwrap();
        channel.init().await.unwrap();
        assert_eq!(channel.state(), ChannelState::Unencrypted);
        assert!(channel.store().is_empty());

        let (tx, rx) = flume::unbounded();
        let handle = channel
            .connect(move |event: ChannelEvent| {
                let _ = tx.send(event);
            })
            .await
            .unwrap();
        assert_eq!(channel.state(), ChannelState::Streaming);

        channel.send("hello").await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ChannelEvent::Message(data) if data == "hello"));
        assert_eq!(
            broker.published(channel.identity()),
            vec!["hello".to_string()]
        );

        channel.close();
        channel.close();
        assert!(!handle.is_active());
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(matches!(channel.send("late").await, Err(ChannelError::Closed)));
    }

    #[tokio::test]
    async fn test_encrypted_send_preconditions() {
        let broker = MemoryBroker::new();
        let config = TunnelConfig {
            encryption: true,
            first_user: true,
            ..Default::default()
        };
        let mut channel = channel(&broker, config);
        channel.create().await.unwrap();

        assert!(matches!(
            channel.send("hi").await,
            Err(ChannelError::NotInitialized)
        ));
        assert!(matches!(
            channel.connect(|_event: ChannelEvent| {}).await,
            Err(ChannelError::NotInitialized)
        ));

        channel.init().await.unwrap();
        assert_eq!(channel.state(), ChannelState::KeyReady);
        assert!(channel.store().contains(channel.participant_id()));
        // first user stays quiet until someone else shows up
        assert!(broker
            .published(&channel.identity().with_sub_channel(KEY_EXCHANGE_SUB_CHANNEL))
            .is_empty());

        assert!(matches!(
            channel.send("hi").await,
            Err(ChannelError::NoRecipients)
        ));
        assert!(broker.published(channel.identity()).is_empty());
    }

    #[tokio::test]
    async fn test_init_announces_unless_first_user() {
        let broker = MemoryBroker::new();
        let config = TunnelConfig {
            encryption: true,
            ..Default::default()
        };
        let mut channel = channel(&broker, config);
        channel.create().await.unwrap();
        channel.init().await.unwrap();
        // a second init keeps the first keypair
        channel.init().await.unwrap();

        let announcements =
            broker.published(&channel.identity().with_sub_channel(KEY_EXCHANGE_SUB_CHANNEL));
        assert_eq!(announcements.len(), 1);
        let record: KeyRecord = serde_json::from_str(&announcements[0]).unwrap();
        assert_eq!(&record.participant_id, channel.participant_id());
        assert_eq!(
            record,
            channel.store().get(channel.participant_id()).unwrap()
        );
    }
}

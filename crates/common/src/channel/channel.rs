use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::config::TunnelIdentity;
use super::error::ChannelError;
use super::payload::PayloadCodec;
use crate::transport::Transport;

/// What a subscription hands to its handler
#[derive(Debug)]
pub enum ChannelEvent {
    /// A decoded payload addressed to us
    Message(String),
    /// An inbound payload that could not be decoded; the stream goes on
    Dropped(ChannelError),
}

/// Receiver of channel events
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: ChannelEvent);
}

#[async_trait]
impl<F> EventHandler for F
where
    F: Fn(ChannelEvent) + Send + Sync + 'static,
{
    async fn handle(&self, event: ChannelEvent) {
        self(event)
    }
}

/// Handle on a running subscription task
///
/// Clones refer to the same task. Closing is idempotent.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SubscriptionHandle {
    fn new(task: JoinHandle<()>) -> Self {
        Self {
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Stop delivering events; a no-op if already closed
    pub fn close(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

/// One `(tunnel, sub-channel)` pair and the codec its payloads go through
pub struct Channel<C: PayloadCodec> {
    identity: TunnelIdentity,
    transport: Arc<dyn Transport>,
    codec: Arc<C>,
}

impl<C: PayloadCodec> Clone for Channel<C> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            transport: self.transport.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<C: PayloadCodec> std::fmt::Debug for Channel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("identity", &self.identity)
            .field("transport", &self.transport)
            .finish()
    }
}

impl<C: PayloadCodec> Channel<C> {
    pub fn new(identity: TunnelIdentity, transport: Arc<dyn Transport>, codec: C) -> Self {
        Self {
            identity,
            transport,
            codec: Arc::new(codec),
        }
    }

    pub fn identity(&self) -> &TunnelIdentity {
        &self.identity
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Encode `data` and publish it
    ///
    /// Nothing reaches the broker if encoding fails.
    pub async fn publish(&self, data: &str) -> Result<(), ChannelError> {
        let payload = self.codec.encode(data)?;
        self.transport.publish(&self.identity, payload).await?;
        Ok(())
    }

    /// Subscribe and feed every decoded payload to `handler`
    ///
    /// Payloads carrying nothing for us are skipped silently; payloads that
    /// fail to decode are logged and handed on as [`ChannelEvent::Dropped`].
    pub async fn subscribe<H: EventHandler>(
        &self,
        handler: H,
    ) -> Result<SubscriptionHandle, ChannelError> {
        let subscription = self.transport.subscribe(&self.identity).await?;
        let codec = self.codec.clone();
        let identity = self.identity.clone();

        let task = tokio::spawn(async move {
            while let Some(payload) = subscription.next().await {
                match codec.decode(&payload) {
                    Ok(Some(data)) => handler.handle(ChannelEvent::Message(data)).await,
                    Ok(None) => {
                        tracing::trace!("payload on {} not addressed to us", identity);
                    }
                    Err(e) => {
                        tracing::warn!("dropping payload on {}: {}", identity, e);
                        handler.handle(ChannelEvent::Dropped(e)).await;
                    }
                }
            }
            tracing::debug!("subscription to {} ended", identity);
        });

        Ok(SubscriptionHandle::new(task))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::channel::payload::Plain;
    use crate::transport::MemoryBroker;

    async fn recv(rx: &flume::Receiver<ChannelEvent>) -> ChannelEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .expect("timed out waiting for event")
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let broker = MemoryBroker::new();
        broker.create(Some("room1")).await.unwrap();
        let channel = Channel::new(
            TunnelIdentity::new("room1", "main"),
            Arc::new(broker.clone()),
            Plain,
        );

        let (tx, rx) = flume::unbounded();
        let handle = channel
            .subscribe(move |event: ChannelEvent| {
                let _ = tx.send(event);
            })
            .await
            .unwrap();
        assert!(handle.is_active());

        channel.publish("hello").await.unwrap();
        match recv(&rx).await {
            ChannelEvent::Message(data) => assert_eq!(data, "hello"),
            other => panic!("unexpected event {:?}", other),
        }

        handle.close();
        handle.close();
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_sub_channels_are_isolated() {
        let broker = MemoryBroker::new();
        broker.create(Some("room1")).await.unwrap();
        let main = Channel::new(
            TunnelIdentity::new("room1", "main"),
            Arc::new(broker.clone()),
            Plain,
        );
        let other = Channel::new(
            main.identity().with_sub_channel("keyExchange"),
            Arc::new(broker.clone()),
            Plain,
        );

        let (tx, rx) = flume::unbounded();
        let _handle = main
            .subscribe(move |event: ChannelEvent| {
                let _ = tx.send(event);
            })
            .await
            .unwrap();

        other.publish("not for main").await.unwrap();
        main.publish("for main").await.unwrap();
        match recv(&rx).await {
            ChannelEvent::Message(data) => assert_eq!(data, "for main"),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.is_empty());
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::provider::{Subscription, Transport, TransportError};
use crate::channel::TunnelIdentity;

/// In-process broker that fans payloads out to subscribers through channels
///
/// Behaves like the remote broker: creating an existing tunnel succeeds,
/// publishes reach only the subscribers present at publish time, and nothing
/// is replayed to late subscribers. Every publish is also kept in a log so
/// tests can inspect exactly what went over the wire.
///
/// Meant for tests and the [`testkit`](crate::testkit) only: the publish log
/// is never trimmed, so memory grows with every payload for as long as the
/// broker lives. Use [`HttpTransport`](super::HttpTransport) for real chats.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Mutex<MemoryBrokerInner>>,
}

#[derive(Debug, Default)]
struct MemoryBrokerInner {
    tunnels: HashSet<String>,
    subscribers: HashMap<TunnelIdentity, Vec<flume::Sender<String>>>,
    /// Every payload in publish order
    published: Vec<(TunnelIdentity, String)>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tunnel with this id has been created
    pub fn has_tunnel(&self, tunnel_id: &str) -> bool {
        self.inner.lock().tunnels.contains(tunnel_id)
    }

    /// Payloads published to `identity`, oldest first
    pub fn published(&self, identity: &TunnelIdentity) -> Vec<String> {
        self.inner
            .lock()
            .published
            .iter()
            .filter(|(target, _)| target == identity)
            .map(|(_, content)| content.clone())
            .collect()
    }

    /// Forget the publish log, returning how many payloads it held
    ///
    /// Long simulations call this between rounds to keep memory flat.
    pub fn clear_published(&self) -> usize {
        let mut inner = self.inner.lock();
        let cleared = inner.published.len();
        inner.published = Vec::new();
        cleared
    }

    /// Number of live subscribers on `identity`
    pub fn subscriber_count(&self, identity: &TunnelIdentity) -> usize {
        self.inner
            .lock()
            .subscribers
            .get(identity)
            .map(|subs| subs.iter().filter(|tx| !tx.is_disconnected()).count())
            .unwrap_or(0)
    }
}

fn random_tunnel_id() -> String {
    format!("{:08X}", rand::random::<u32>())
}

#[async_trait]
impl Transport for MemoryBroker {
    async fn create(&self, tunnel_id: Option<&str>) -> Result<String, TransportError> {
        let mut inner = self.inner.lock();

        let id = match tunnel_id {
            Some(id) => {
                if id.is_empty() || id.chars().any(char::is_whitespace) {
                    return Err(TransportError::Rejected(format!(
                        "invalid tunnel id '{}'",
                        id
                    )));
                }
                id.to_string()
            }
            None => loop {
                let id = random_tunnel_id();
                if !inner.tunnels.contains(&id) {
                    break id;
                }
            },
        };

        inner.tunnels.insert(id.clone());
        Ok(id)
    }

    async fn publish(
        &self,
        identity: &TunnelIdentity,
        content: String,
    ) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.published.push((identity.clone(), content.clone()));

        if let Some(subscribers) = inner.subscribers.get_mut(identity) {
            subscribers.retain(|tx| tx.send(content.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, identity: &TunnelIdentity) -> Result<Subscription, TransportError> {
        let (tx, rx) = flume::unbounded();
        self.inner
            .lock()
            .subscribers
            .entry(identity.clone())
            .or_default()
            .push(tx);
        Ok(Subscription::new(rx))
    }
}

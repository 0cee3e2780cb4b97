use std::fmt::Debug;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::channel::TunnelIdentity;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(reqwest::StatusCode, String),
    /// The broker refused the request for a reason of its own
    #[error("broker rejected request: {0}")]
    Rejected(String),
}

/// A live feed of payloads published to one `(tunnel, sub-channel)` pair
///
/// Payloads arrive verbatim, in whatever order the broker delivers them.
/// Dropping the subscription stops any background task feeding it.
#[derive(Debug)]
pub struct Subscription {
    events: flume::Receiver<String>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A subscription fed directly by the broker
    pub fn new(events: flume::Receiver<String>) -> Self {
        Self { events, pump: None }
    }

    /// A subscription fed by a background task owned by this handle
    pub fn with_pump(events: flume::Receiver<String>, pump: JoinHandle<()>) -> Self {
        Self {
            events,
            pump: Some(pump),
        }
    }

    /// Wait for the next payload, `None` once the feed has ended
    pub async fn next(&self) -> Option<String> {
        self.events.recv_async().await.ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// The publish/subscribe broker a tunnel runs on
///
/// The broker makes no ordering, dedup or persistence promises: a payload
/// reaches whoever is subscribed at the time it is published.
#[async_trait]
pub trait Transport: Send + Sync + Debug + 'static {
    /// Provision a tunnel
    ///
    /// # Arguments
    /// * `tunnel_id` - The id to create, or `None` to let the broker pick one
    ///
    /// # Returns
    /// * `Ok(String)` - The id of the provisioned tunnel
    /// * `Err(TransportError)` - The broker refused or could not be reached
    async fn create(&self, tunnel_id: Option<&str>) -> Result<String, TransportError>;

    /// Publish one payload to every current subscriber of `identity`
    async fn publish(&self, identity: &TunnelIdentity, content: String)
        -> Result<(), TransportError>;

    /// Open a live subscription to `identity`
    async fn subscribe(&self, identity: &TunnelIdentity) -> Result<Subscription, TransportError>;
}

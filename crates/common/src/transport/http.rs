use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;

use super::provider::{Subscription, Transport, TransportError};
use super::sse::SseParser;
use crate::channel::TunnelIdentity;

const CREATE_PATH: &str = "api/v3/tunnel/create";
const SEND_PATH: &str = "api/v3/tunnel/send";
const STREAM_PATH: &str = "api/v3/tunnel/stream";

/// Delay before reopening a dropped event stream
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// A single broker endpoint, described the way the broker expects it
pub trait BrokerRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, TransportError>;
}

/// Create a tunnel with a caller chosen id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub id: String,
}

/// Ask the broker to pick a tunnel id
#[derive(Debug, Clone)]
pub struct CreateRandomRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub id: String,
    pub sub_channel: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub identity: TunnelIdentity,
}

impl BrokerRequest for CreateRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, TransportError> {
        let full_url = base_url.join(CREATE_PATH)?;
        Ok(client.post(full_url).json(&self))
    }
}

impl BrokerRequest for CreateRandomRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, TransportError> {
        let full_url = base_url.join(CREATE_PATH)?;
        Ok(client.get(full_url))
    }
}

impl BrokerRequest for SendRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, TransportError> {
        let full_url = base_url.join(SEND_PATH)?;
        Ok(client.post(full_url).json(&self))
    }
}

impl BrokerRequest for StreamRequest {
    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, TransportError> {
        let mut full_url = base_url.join(STREAM_PATH)?;
        full_url
            .query_pairs_mut()
            .append_pair("id", &self.identity.tunnel_id)
            .append_pair("subChannel", &self.identity.sub_channel);
        Ok(client
            .get(full_url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream")))
    }
}

/// Broker client speaking the tunnel HTTP API
///
/// Create and publish are plain JSON requests; subscriptions are
/// server-sent-event streams pumped into a [`Subscription`] by a background
/// task that reopens the stream if the broker drops it.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    pub remote: Url,
    client: Client,
}

impl HttpTransport {
    pub fn new(remote: &Url) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(default_headers).build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// Get the base URL of the broker
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    async fn call<T: BrokerRequest>(&self, request: T) -> Result<Response, TransportError> {
        call(&self.remote, &self.client, request).await
    }
}

async fn call<T: BrokerRequest>(
    remote: &Url,
    client: &Client,
    request: T,
) -> Result<Response, TransportError> {
    let response = request.build_request(remote, client)?.send().await?;

    if response.status().is_success() {
        Ok(response)
    } else {
        Err(TransportError::HttpStatus(
            response.status(),
            response.text().await?,
        ))
    }
}

/// Forward events from `response` until the stream ends or errors
///
/// Returns `false` once nobody is listening anymore.
async fn pump_events(response: Response, tx: &flume::Sender<String>) -> bool {
    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for event in parser.feed(&bytes) {
                    if tx.send_async(event).await.is_err() {
                        return false;
                    }
                }
            }
            Err(e) => {
                tracing::warn!("event stream read failed: {}", e);
                break;
            }
        }
    }
    !tx.is_disconnected()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn create(&self, tunnel_id: Option<&str>) -> Result<String, TransportError> {
        match tunnel_id {
            Some(id) => {
                self.call(CreateRequest { id: id.to_string() }).await?;
                Ok(id.to_string())
            }
            None => {
                let response = self.call(CreateRandomRequest).await?;
                let created: CreateResponse = response.json().await?;
                Ok(created.id)
            }
        }
    }

    async fn publish(
        &self,
        identity: &TunnelIdentity,
        content: String,
    ) -> Result<(), TransportError> {
        self.call(SendRequest {
            id: identity.tunnel_id.clone(),
            sub_channel: identity.sub_channel.clone(),
            content,
        })
        .await?;
        Ok(())
    }

    async fn subscribe(&self, identity: &TunnelIdentity) -> Result<Subscription, TransportError> {
        // the first open is checked so a bad tunnel fails the caller
        let first = self
            .call(StreamRequest {
                identity: identity.clone(),
            })
            .await?;

        let (tx, rx) = flume::unbounded();
        let remote = self.remote.clone();
        let client = self.client.clone();
        let identity = identity.clone();

        let pump = tokio::spawn(async move {
            let mut response = first;
            loop {
                if !pump_events(response, &tx).await {
                    break;
                }

                tracing::debug!(
                    "event stream for {} closed, reopening in {:?}",
                    identity,
                    RECONNECT_DELAY
                );
                response = loop {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    if tx.is_disconnected() {
                        return;
                    }
                    let request = StreamRequest {
                        identity: identity.clone(),
                    };
                    match call(&remote, &client, request).await {
                        Ok(response) => break response,
                        Err(e) => tracing::warn!("failed to reopen event stream: {}", e),
                    }
                };
            }
        });

        Ok(Subscription::with_pump(rx, pump))
    }
}

//! Shared test utilities for tunnel integration tests
#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use common::channel::{ChannelEvent, TunnelChannel, TunnelConfig};
use common::transport::Transport;

static TRACING: Once = Once::new();

/// Route library logs to the test output, filtered by `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn encrypted(first_user: bool) -> TunnelConfig {
    TunnelConfig {
        encryption: true,
        first_user,
        ..Default::default()
    }
}

/// Build, create, init and connect a channel, forwarding its events to a receiver
pub async fn open_channel(
    transport: Arc<dyn Transport>,
    tunnel_id: &str,
    config: TunnelConfig,
) -> (TunnelChannel, flume::Receiver<ChannelEvent>) {
    let mut channel = TunnelChannel::builder(tunnel_id)
        .config(config)
        .key_ready_timeout(Duration::from_secs(5))
        .build(transport);
    channel.create().await.unwrap();
    channel.init().await.unwrap();

    let (tx, rx) = flume::unbounded();
    channel
        .connect(move |event: ChannelEvent| {
            let _ = tx.send(event);
        })
        .await
        .unwrap();
    (channel, rx)
}

/// Next event, failing the test after a few seconds
pub async fn next_event(rx: &flume::Receiver<ChannelEvent>) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
        .await
        .expect("timed out waiting for channel event")
        .unwrap()
}

/// Next decoded message, failing the test on anything else
pub async fn next_message(rx: &flume::Receiver<ChannelEvent>) -> String {
    match next_event(rx).await {
        ChannelEvent::Message(data) => data,
        ChannelEvent::Dropped(e) => panic!("expected a message, got notice: {}", e),
    }
}

/// Poll `condition` until it holds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

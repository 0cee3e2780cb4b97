//! Integration tests for per-recipient encrypted delivery

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use ::common::channel::{ChannelError, ChannelEvent, TunnelConfig};
use ::common::transport::{MemoryBroker, Transport};

use self::common::{encrypted, next_event, next_message, open_channel, wait_until};

#[tokio::test]
async fn test_fan_out_reaches_every_recipient() {
    common::init_tracing();
    let broker = MemoryBroker::new();
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());

    let (sender, sender_rx) = open_channel(transport.clone(), "room1", encrypted(true)).await;
    let (a, a_rx) = open_channel(transport.clone(), "room1", encrypted(false)).await;
    let (b, b_rx) = open_channel(transport, "room1", encrypted(false)).await;
    wait_until(|| sender.store().len() == 3 && a.store().len() == 3 && b.store().len() == 3).await;

    sender.send("m").await.unwrap();

    assert_eq!(next_message(&a_rx).await, "m");
    assert_eq!(next_message(&b_rx).await, "m");

    // one payload, one slice per recipient, none for the sender
    let published = broker.published(sender.identity());
    assert_eq!(published.len(), 1);
    let envelope: BTreeMap<String, String> = serde_json::from_str(&published[0]).unwrap();
    let mut slices: Vec<&str> = envelope.keys().map(String::as_str).collect();
    slices.sort();
    let mut expected = vec![a.participant_id().as_str(), b.participant_id().as_str()];
    expected.sort();
    assert_eq!(slices, expected);
    assert!(sender_rx.is_empty());
}

#[tokio::test]
async fn test_late_joiner_cannot_read_earlier_messages() {
    common::init_tracing();
    let broker = MemoryBroker::new();
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());

    let (alice, _alice_rx) = open_channel(transport.clone(), "room1", encrypted(true)).await;
    let (bob, bob_rx) = open_channel(transport.clone(), "room1", encrypted(false)).await;
    wait_until(|| alice.store().len() == 2).await;

    alice.send("before carol").await.unwrap();
    assert_eq!(next_message(&bob_rx).await, "before carol");

    let (carol, carol_rx) = open_channel(transport, "room1", encrypted(false)).await;
    wait_until(|| alice.store().len() == 3 && carol.store().len() == 3).await;

    alice.send("after carol").await.unwrap();
    assert_eq!(next_message(&bob_rx).await, "after carol");
    // the only payload carol ever saw was the second one
    assert_eq!(next_message(&carol_rx).await, "after carol");
    assert!(carol_rx.is_empty());
}

#[tokio::test]
async fn test_oversized_message_never_hits_the_wire() {
    common::init_tracing();
    let broker = MemoryBroker::new();
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());

    let (alice, _alice_rx) = open_channel(transport.clone(), "room1", encrypted(true)).await;
    let (bob, bob_rx) = open_channel(transport, "room1", encrypted(false)).await;
    wait_until(|| alice.store().len() == 2).await;

    let too_long = "x".repeat(191);
    match alice.send(&too_long).await {
        Err(ChannelError::PlaintextTooLarge {
            recipient,
            len,
            max,
        }) => {
            assert_eq!(&recipient, bob.participant_id());
            assert_eq!((len, max), (191, 190));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(broker.published(alice.identity()).is_empty());

    let just_fits = "x".repeat(190);
    alice.send(&just_fits).await.unwrap();
    assert_eq!(next_message(&bob_rx).await, just_fits);
}

#[tokio::test]
async fn test_compression_with_encryption() {
    common::init_tracing();
    let broker = MemoryBroker::new();
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());
    let config = |first_user| TunnelConfig {
        compression: true,
        ..encrypted(first_user)
    };

    let (alice, _alice_rx) = open_channel(transport.clone(), "room1", config(true)).await;
    let (_bob, bob_rx) = open_channel(transport, "room1", config(false)).await;
    wait_until(|| alice.store().len() == 2).await;

    alice.send("squeeze me").await.unwrap();
    assert_eq!(next_message(&bob_rx).await, "squeeze me");
}

#[tokio::test]
async fn test_undecryptable_slice_is_a_notice() {
    common::init_tracing();
    let broker = MemoryBroker::new();
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());

    let (alice, alice_rx) = open_channel(transport.clone(), "room1", encrypted(true)).await;

    let forged = format!(r#"{{"{}":"00ff00ff"}}"#, alice.participant_id());
    broker.publish(alice.identity(), forged).await.unwrap();
    broker
        .publish(alice.identity(), "not an envelope".to_string())
        .await
        .unwrap();

    assert!(matches!(
        next_event(&alice_rx).await,
        ChannelEvent::Dropped(ChannelError::DecryptFailed(_))
    ));
    assert!(matches!(
        next_event(&alice_rx).await,
        ChannelEvent::Dropped(ChannelError::MalformedPayload(_))
    ));

    // the stream survives both
    let (bob, _bob_rx) = open_channel(transport, "room1", encrypted(false)).await;
    wait_until(|| bob.store().len() == 2).await;
    bob.send("still here").await.unwrap();
    assert_eq!(next_message(&alice_rx).await, "still here");
}

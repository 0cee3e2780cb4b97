//! Integration tests for the flooding key exchange

mod common;

use std::time::Duration;

use ::common::channel::KEY_EXCHANGE_SUB_CHANNEL;
use ::common::keystore::KeyRecord;
use ::common::testkit::TestNetwork;

#[tokio::test]
async fn test_two_participants_learn_each_other() -> anyhow::Result<()> {
    common::init_tracing();
    let mut net = TestNetwork::new("room1");

    net.add_encrypted("alice").await?;
    // alice opened the tunnel and stays quiet
    let announcements = net
        .broker()
        .published(&::common::channel::TunnelIdentity::new("room1", KEY_EXCHANGE_SUB_CHANNEL));
    assert!(announcements.is_empty());

    net.add_encrypted("bob").await?;
    net.eventually(Duration::from_secs(5), || async { Ok(net.keys_converged()) })
        .await?;

    let alice = net.participant("alice").unwrap();
    let bob = net.participant("bob").unwrap();
    assert!(alice.knows(bob));
    assert!(bob.knows(alice));

    net.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_flood_converges_for_many_participants() -> anyhow::Result<()> {
    common::init_tracing();
    let mut net = TestNetwork::new("crowd");
    let names = ["p0", "p1", "p2", "p3", "p4"];

    for name in names {
        net.add_encrypted(name).await?;
    }

    net.eventually(Duration::from_secs(10), || async { Ok(net.keys_converged()) })
        .await?;
    for name in names {
        assert_eq!(net.participant(name).unwrap().known_keys(), names.len());
    }

    net.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_announced_keys_match_stored_keys() -> anyhow::Result<()> {
    common::init_tracing();
    let mut net = TestNetwork::new("room1");
    net.add_encrypted("alice").await?;
    net.add_encrypted("bob").await?;
    net.eventually(Duration::from_secs(5), || async { Ok(net.keys_converged()) })
        .await?;

    let identity = ::common::channel::TunnelIdentity::new("room1", KEY_EXCHANGE_SUB_CHANNEL);
    let announcements = net.broker().published(&identity);
    assert!(!announcements.is_empty());

    let alice = net.participant("alice").unwrap();
    for announcement in announcements {
        let record: KeyRecord = serde_json::from_str(&announcement)?;
        // whatever went over the wire is exactly what alice stored
        assert_eq!(alice.channel().store().get(&record.participant_id), Some(record));
    }

    Ok(())
}

#[tokio::test]
async fn test_garbage_on_key_exchange_is_ignored() -> anyhow::Result<()> {
    use ::common::transport::Transport;

    common::init_tracing();
    let mut net = TestNetwork::new("room1");
    net.add_encrypted("alice").await?;

    let identity = ::common::channel::TunnelIdentity::new("room1", KEY_EXCHANGE_SUB_CHANNEL);
    net.broker()
        .publish(&identity, "{not json".to_string())
        .await?;
    net.broker()
        .publish(
            &identity,
            r#"{"participantId":"mallory","publicKey":"00"}"#.to_string(),
        )
        .await?;

    net.add_encrypted("bob").await?;
    net.eventually(Duration::from_secs(5), || async { Ok(net.keys_converged()) })
        .await?;
    let alice = net.participant("alice").unwrap();
    assert_eq!(alice.known_keys(), 2);
    assert!(!alice.channel().store().contains(&"mallory".into()));

    Ok(())
}

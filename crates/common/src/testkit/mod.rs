/// Lightweight test harness for multi-participant integration tests
///
/// Runs any number of tunnel participants in-process over a shared
/// [`MemoryBroker`](crate::transport::MemoryBroker), without a real relay.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::TestNetwork;
///
/// #[tokio::test]
/// async fn test_key_exchange() -> anyhow::Result<()> {
///     let mut net = TestNetwork::new("room1");
///
///     net.add_encrypted("alice").await?;
///     net.add_encrypted("bob").await?;
///
///     net.eventually(Duration::from_secs(5), || async { Ok(net.keys_converged()) })
///         .await?;
///     net.participant("bob").unwrap().send("hi").await?;
///
///     net.shutdown();
///     Ok(())
/// }
/// ```
mod network;
mod participant;

pub use network::TestNetwork;
pub use participant::TestParticipant;

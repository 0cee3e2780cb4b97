use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;

use super::participant::TestParticipant;
use crate::channel::TunnelConfig;
use crate::transport::MemoryBroker;

/// A coordinator for participants sharing one tunnel on one broker
///
/// TestNetwork manages the lifecycle of its participants and provides
/// utilities for eventual consistency testing.
pub struct TestNetwork {
    broker: MemoryBroker,
    tunnel_id: String,
    key_ready_timeout: Duration,
    /// All participants, indexed by name
    participants: BTreeMap<String, TestParticipant>,
}

impl TestNetwork {
    /// Create a new test network for `tunnel_id`
    pub fn new(tunnel_id: impl Into<String>) -> Self {
        Self {
            broker: MemoryBroker::new(),
            tunnel_id: tunnel_id.into(),
            key_ready_timeout: Duration::from_secs(5),
            participants: BTreeMap::new(),
        }
    }

    pub fn broker(&self) -> &MemoryBroker {
        &self.broker
    }

    pub fn tunnel_id(&self) -> &str {
        &self.tunnel_id
    }

    /// Add a participant with an explicit configuration and connect it
    ///
    /// # Arguments
    /// * `name` - Unique name for this participant
    /// * `config` - Channel configuration
    pub async fn add_participant(
        &mut self,
        name: impl Into<String>,
        config: TunnelConfig,
    ) -> Result<()> {
        let name = name.into();

        if self.participants.contains_key(&name) {
            return Err(anyhow::anyhow!("Participant '{}' already exists", name));
        }

        let participant = TestParticipant::join(
            name.clone(),
            &self.broker,
            &self.tunnel_id,
            config,
            self.key_ready_timeout,
        )
        .await?;
        self.participants.insert(name, participant);

        Ok(())
    }

    /// Add an encrypting participant
    ///
    /// The first one added opens the tunnel as first user; everyone after
    /// announces their key on join.
    pub async fn add_encrypted(&mut self, name: impl Into<String>) -> Result<()> {
        let config = TunnelConfig {
            encryption: true,
            first_user: self.participants.is_empty(),
            ..Default::default()
        };
        self.add_participant(name, config).await
    }

    /// Get a participant by name
    pub fn participant(&self, name: &str) -> Option<&TestParticipant> {
        self.participants.get(name)
    }

    /// Get a mutable participant by name
    pub fn participant_mut(&mut self, name: &str) -> Option<&mut TestParticipant> {
        self.participants.get_mut(name)
    }

    /// Get all participant names
    pub fn participant_names(&self) -> Vec<String> {
        self.participants.keys().cloned().collect()
    }

    /// Whether every participant holds the key of every other one
    pub fn keys_converged(&self) -> bool {
        let total = self.participants.len();
        self.participants
            .values()
            .all(|participant| participant.known_keys() == total)
    }

    /// Remove a participant from the network and close it
    pub fn remove_participant(&mut self, name: &str) {
        if let Some(mut participant) = self.participants.remove(name) {
            participant.close();
        }
    }

    /// Close all participants
    pub fn shutdown(&mut self) {
        tracing::info!(
            "Shutting down test network with {} participants",
            self.participants.len()
        );

        for participant in self.participants.values_mut() {
            participant.close();
        }
        self.participants.clear();
    }

    /// Poll a condition until it succeeds or times out
    ///
    /// # Arguments
    /// * `timeout` - Maximum time to wait
    /// * `condition` - Async function that returns Ok(true) when the condition is met
    ///
    /// # Example
    /// ```rust,ignore
    /// net.eventually(Duration::from_secs(5), || async {
    ///     Ok(net.participant("bob").unwrap().has_received("hi"))
    /// }).await?;
    /// ```
    pub async fn eventually<F, Fut>(&self, timeout: Duration, condition: F) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<bool>>,
    {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(20);

        loop {
            match condition().await {
                Ok(true) => {
                    tracing::debug!("Eventual condition met after {:?}", start.elapsed());
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!("Eventual condition check error: {}", e);
                }
            }

            if start.elapsed() > timeout {
                return Err(anyhow::anyhow!(
                    "Condition not met within timeout ({:?})",
                    timeout
                ));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl Drop for TestNetwork {
    fn drop(&mut self) {
        tracing::debug!(
            "TestNetwork dropped, {} participants will be closed",
            self.participants.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_network_lifecycle() -> Result<()> {
        let mut net = TestNetwork::new("room1");

        net.add_participant("alice", TunnelConfig::default()).await?;
        net.add_participant("bob", TunnelConfig::default()).await?;
        assert!(net
            .add_participant("bob", TunnelConfig::default())
            .await
            .is_err());

        assert_eq!(net.participant_names(), vec!["alice", "bob"]);
        assert!(net.broker().has_tunnel("room1"));

        net.remove_participant("alice");
        assert_eq!(net.participant_names().len(), 1);
        assert!(net.participant("alice").is_none());

        net.shutdown();
        assert!(net.participant_names().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_eventually_success() -> Result<()> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let net = TestNetwork::new("room1");
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        net.eventually(Duration::from_secs(1), move || {
            let count = count_clone.clone();
            async move {
                let val = count.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(val >= 3)
            }
        })
        .await?;

        assert!(count.load(Ordering::SeqCst) >= 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_eventually_timeout() {
        let net = TestNetwork::new("room1");

        let result = net
            .eventually(Duration::from_millis(100), || async { Ok(false) })
            .await;

        assert!(result.unwrap_err().to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn test_plain_broadcast() -> Result<()> {
        let mut net = TestNetwork::new("room1");
        net.add_participant("alice", TunnelConfig::default()).await?;
        net.add_participant("bob", TunnelConfig::default()).await?;

        net.participant("alice").unwrap().send("hello").await?;
        net.eventually(Duration::from_secs(5), || async {
            Ok(net.participant("bob").unwrap().has_received("hello"))
        })
        .await?;

        Ok(())
    }
}

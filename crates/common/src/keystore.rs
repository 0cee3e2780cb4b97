use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::crypto::{KeyError, PublicKey};

/// Number of 32-bit draws concatenated into a participant id
const PARTICIPANT_ID_DRAWS: usize = 4;

/// Locally generated, opaque identifier of one participant
///
/// Rendered as the decimal concatenation of four random `u32`s. Nothing
/// verifies it; uniqueness is assumed from the amount of entropy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn generate() -> Self {
        let id = (0..PARTICIPANT_ID_DRAWS)
            .map(|_| rand::random::<u32>().to_string())
            .collect::<String>();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A participant's announced public key
///
/// This is also the key-exchange wire message: `{"participantId", "publicKey"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub participant_id: ParticipantId,
    /// Hex encoded SPKI DER
    pub public_key: String,
}

impl KeyRecord {
    pub fn new(participant_id: ParticipantId, public_key: &PublicKey) -> Result<Self, KeyError> {
        Ok(Self {
            participant_id,
            public_key: public_key.to_hex()?,
        })
    }

    /// Decode the announced key
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_hex(&self.public_key)
    }
}

/// In-memory mapping of participant id to announced key
///
/// Cheap to clone; all clones share the same records. Inserts are
/// idempotent: the first record seen for an id wins and later ones are
/// dropped, so a racing or malicious duplicate can never replace a key.
/// Records are never removed while the store is alive.
#[derive(Debug, Clone)]
pub struct ParticipantKeyStore {
    records: Arc<RwLock<BTreeMap<ParticipantId, KeyRecord>>>,
    /// Bumped after every successful insert
    changed: Arc<watch::Sender<u64>>,
}

impl Default for ParticipantKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantKeyStore {
    pub fn new() -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
            changed: Arc::new(changed),
        }
    }

    /// Insert a record unless one already exists for its id
    ///
    /// Returns `true` if the record was stored.
    pub fn insert(&self, record: KeyRecord) -> bool {
        {
            let mut records = self.records.write();
            if records.contains_key(&record.participant_id) {
                tracing::debug!(
                    participant = %record.participant_id,
                    "key already known, dropping duplicate"
                );
                return false;
            }
            records.insert(record.participant_id.clone(), record);
        }
        self.changed.send_modify(|version| *version += 1);
        true
    }

    pub fn get(&self, id: &ParticipantId) -> Option<KeyRecord> {
        self.records.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn ids(&self) -> Vec<ParticipantId> {
        self.records.read().keys().cloned().collect()
    }

    /// Every record except the one belonging to `own`
    pub fn recipients(&self, own: &ParticipantId) -> Vec<KeyRecord> {
        self.records
            .read()
            .values()
            .filter(|record| &record.participant_id != own)
            .cloned()
            .collect()
    }

    /// Wait until a record for `id` is present, for at most `timeout`
    ///
    /// Resolves immediately if the record is already stored.
    pub async fn wait_for(&self, id: &ParticipantId, timeout: Duration) -> Option<KeyRecord> {
        if self.wait_until(|store| store.contains(id), timeout).await {
            self.get(id)
        } else {
            None
        }
    }

    /// Wait until some participant other than `own` is known
    pub async fn wait_for_others(&self, own: &ParticipantId, timeout: Duration) -> bool {
        self.wait_until(|store| !store.recipients(own).is_empty(), timeout)
            .await
    }

    /// Re-check `condition` after every insert until it holds or `timeout` passes
    async fn wait_until<F>(&self, condition: F, timeout: Duration) -> bool
    where
        F: Fn(&Self) -> bool,
    {
        // subscribe before the first check so an insert in between is not missed
        let mut changes = self.changed.subscribe();
        let wait = async {
            loop {
                if condition(self) {
                    return;
                }
                if changes.changed().await.is_err() {
                    // we hold the sender, this cannot close underneath us
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

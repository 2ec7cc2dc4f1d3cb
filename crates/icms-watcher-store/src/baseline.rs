//! Per-account baseline persistence and the write-only-on-change policy.

use icms_watcher_core::record::{decode_observation, encode_observation};
use icms_watcher_core::{ObservationSet, UpdateSet, diff};
use tracing::{info, warn};

use crate::{BlobStore, StoreError};

/// Storage key of an account's baseline.
pub fn baseline_key(account: &str) -> String {
    format!("marks_{account}")
}

/// Baseline access for one store.
pub struct Baselines<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S: BlobStore + ?Sized> Baselines<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Load the account's baseline.
    ///
    /// Missing, unreadable and undecodable baselines all come back as `None`.
    pub async fn load(&self, account: &str) -> Option<ObservationSet> {
        let key = baseline_key(account);
        let bytes = match self.store.load(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!(account, "no baseline yet, treating every record as new");
                return None;
            }
            Err(e) => {
                warn!(account, error = %e, "baseline unreadable, treating every record as new");
                return None;
            }
        };
        match decode_observation(&bytes) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(account, error = %e, "baseline corrupt, treating every record as new");
                None
            }
        }
    }

    /// Overwrite the account's baseline.
    pub async fn save(&self, account: &str, set: &ObservationSet) -> Result<(), StoreError> {
        let bytes = encode_observation(set)?;
        self.store.store(&baseline_key(account), &bytes).await
    }

    /// Diff `current` against the stored baseline and persist `current` iff
    /// anything changed.
    ///
    /// A failed write is returned as an error: updates are never reported
    /// without having been persisted.
    pub async fn reconcile(
        &self,
        account: &str,
        current: &ObservationSet,
    ) -> Result<UpdateSet, StoreError> {
        let baseline = self.load(account).await;

        if current.is_empty() && baseline.as_ref().is_some_and(|b| !b.is_empty()) {
            warn!(
                account,
                previous = baseline.as_ref().map_or(0, |b| b.len()),
                "observation is empty but the baseline is not; the page layout may have changed"
            );
        }

        let updates = diff(current, baseline.as_ref());
        if updates.is_empty() {
            info!(account, records = current.len(), "no update occurred");
            return Ok(updates);
        }

        self.save(account, current).await?;
        info!(
            account,
            updates = updates.len(),
            records = current.len(),
            "baseline updated"
        );
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use async_trait::async_trait;
    use icms_watcher_core::Record;

    fn observation(marks: &[(&str, &str)]) -> ObservationSet {
        marks
            .iter()
            .map(|(name, mark)| {
                (
                    name.to_string(),
                    Record {
                        name: name.to_string(),
                        kind: "Modul".into(),
                        mark: mark.to_string(),
                        status: "bestanden".into(),
                    },
                )
            })
            .collect()
    }

    /// Reads fine, refuses every write.
    struct ReadOnly(MemoryStore);

    #[async_trait]
    impl BlobStore for ReadOnly {
        async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.0.load(key).await
        }
        async fn store(&self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("read-only filesystem")))
        }
    }

    #[tokio::test]
    async fn first_run_reports_everything_and_persists() {
        let store = MemoryStore::new();
        let baselines = Baselines::new(&store);
        let current = observation(&[("A", "1,0"), ("B", "2,0")]);

        let updates = baselines.reconcile("alice", &current).await.unwrap();
        assert_eq!(updates, current);
        assert_eq!(store.writes(), 1);
        assert_eq!(baselines.load("alice").await, Some(current));
    }

    #[tokio::test]
    async fn unchanged_rerun_does_not_write() {
        let store = MemoryStore::new();
        let baselines = Baselines::new(&store);
        let current = observation(&[("A", "1,0"), ("B", "2,0")]);

        baselines.reconcile("alice", &current).await.unwrap();
        let after_first = store.get("marks_alice").unwrap();

        let updates = baselines.reconcile("alice", &current).await.unwrap();
        assert!(updates.is_empty());
        assert_eq!(store.writes(), 1);
        assert_eq!(store.get("marks_alice").unwrap(), after_first);
    }

    #[tokio::test]
    async fn change_rewrites_whole_observation() {
        let store = MemoryStore::new();
        let baselines = Baselines::new(&store);
        baselines
            .reconcile("alice", &observation(&[("A", "1,0"), ("B", "")]))
            .await
            .unwrap();

        let current = observation(&[("A", "1,0"), ("B", "2,7")]);
        let updates = baselines.reconcile("alice", &current).await.unwrap();
        assert_eq!(updates.keys().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(store.writes(), 2);
        assert_eq!(baselines.load("alice").await, Some(current));
    }

    #[tokio::test]
    async fn corrupt_baseline_counts_as_absent() {
        let store = MemoryStore::new();
        store.insert("marks_alice", b"\x80\x04}\x94.".to_vec());
        let baselines = Baselines::new(&store);
        let current = observation(&[("A", "1,0")]);

        let updates = baselines.reconcile("alice", &current).await.unwrap();
        assert_eq!(updates, current);
    }

    #[tokio::test]
    async fn accounts_are_partitioned() {
        let store = MemoryStore::new();
        let baselines = Baselines::new(&store);
        baselines
            .reconcile("alice", &observation(&[("A", "1,0")]))
            .await
            .unwrap();

        let updates = baselines
            .reconcile("bob", &observation(&[("A", "1,0")]))
            .await
            .unwrap();
        assert_eq!(updates.len(), 1);
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let store = ReadOnly(MemoryStore::new());
        let baselines = Baselines::new(&store);
        let result = baselines
            .reconcile("alice", &observation(&[("A", "1,0")]))
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[tokio::test]
    async fn no_write_needed_when_store_is_read_only() {
        let inner = MemoryStore::new();
        let current = observation(&[("A", "1,0")]);
        inner.insert("marks_alice", encode_observation(&current).unwrap());
        let store = ReadOnly(inner);

        let updates = Baselines::new(&store)
            .reconcile("alice", &current)
            .await
            .unwrap();
        assert!(updates.is_empty());
    }
}

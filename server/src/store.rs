use std::path::Path;

use chrono::{DateTime, Utc};
use fleeting_common::{Generator, PasteId};
use rand::rngs::OsRng;
use rand::Rng;
use rocksdb::{IteratorMode, Options, TransactionDB, TransactionDBOptions};
use tracing::warn;

use crate::error::StoreError;
use crate::paste::{NewPaste, Paste};

/// Collisions in a 122-bit space mean the rng is broken, not unlucky.
const MAX_ID_ATTEMPTS: usize = 8;

/// Never a valid key: ids are 16 bytes long.
const PING_KEY: &[u8] = b"ping";

/// Durable paste storage. All methods block and are expected to run off the
/// async executor.
pub trait PasteStore: Send + Sync {
    /// Persists a validated paste under a fresh, unused id.
    fn insert(&self, paste: NewPaste) -> Result<Paste, StoreError>;

    /// Exact lookup. Never changes anything.
    fn find(&self, id: &PasteId) -> Result<Option<Paste>, StoreError>;

    /// Adds one view if, at the instant of the update, the paste exists and
    /// [`Paste::is_available`] holds for `now`. The check and the increment
    /// must be one indivisible step: with `max_views = 1` and any number of
    /// concurrent callers, exactly one gets `Some`.
    ///
    /// Returns the record as written, so its `view_count` is the new count.
    fn conditionally_increment_view(
        &self,
        id: &PasteId,
        now: DateTime<Utc>,
    ) -> Result<Option<Paste>, StoreError>;

    /// Deletes pastes whose expiry is at or before `now`. Returns how many
    /// were removed.
    fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Round trip to the backing storage, for health checks.
    fn ping(&self) -> Result<(), StoreError>;
}

/// [`PasteStore`] on a RocksDB transaction database. Records are bincode
/// encoded [`Paste`]s keyed by the raw id bytes.
pub struct RocksStore {
    db: TransactionDB,
}

impl RocksStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = TransactionDB::open(&opts, &TransactionDBOptions::default(), path)?;
        Ok(Self { db })
    }
}

impl PasteStore for RocksStore {
    fn insert(&self, paste: NewPaste) -> Result<Paste, StoreError> {
        let txn = self.db.transaction();

        // Locking the candidate key keeps a concurrent insert from claiming
        // the same id between our check and our put.
        let mut new_key = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let id: PasteId = OsRng.sample(Generator);
            if txn.get_for_update(id.as_bytes(), true)?.is_none() {
                new_key = Some(id);
                break;
            }
            warn!(%id, "paste id collision");
        }

        let id = new_key.ok_or(StoreError::IdExhausted(MAX_ID_ATTEMPTS))?;
        let paste = paste.into_paste(id);
        txn.put(id.as_bytes(), bincode::serialize(&paste)?)?;
        txn.commit()?;

        Ok(paste)
    }

    fn find(&self, id: &PasteId) -> Result<Option<Paste>, StoreError> {
        match self.db.get(id.as_bytes())? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn conditionally_increment_view(
        &self,
        id: &PasteId,
        now: DateTime<Utc>,
    ) -> Result<Option<Paste>, StoreError> {
        let key = id.as_bytes();
        let txn = self.db.transaction();

        // Exclusive row lock until commit or drop; concurrent callers queue
        // here and see our write once they get the lock.
        let data = match txn.get_for_update(key, true)? {
            Some(data) => data,
            None => return Ok(None),
        };

        let mut paste: Paste = bincode::deserialize(&data)?;
        if !paste.is_available(now) {
            // Dropping the transaction rolls it back and releases the lock.
            return Ok(None);
        }

        paste.view_count += 1;
        txn.put(key, bincode::serialize(&paste)?)?;
        txn.commit()?;

        Ok(Some(paste))
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0;

        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;

            let paste = match bincode::deserialize::<Paste>(&value) {
                Ok(paste) => paste,
                Err(e) => {
                    warn!("Skipping undecodable record during sweep: {}", e);
                    continue;
                }
            };

            // Expiry is terminal, so deleting outside a transaction cannot
            // race with a successful view.
            if paste.expired(now) {
                self.db.delete(&key)?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.db.get(PING_KEY)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    use super::*;
    use crate::paste::DEFAULT_MAX_CONTENT_BYTES;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn open() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn insert(store: &RocksStore, ttl: Option<i64>, max_views: Option<i64>) -> Paste {
        let new = NewPaste::new(
            "hello".to_string(),
            ttl,
            max_views,
            t0(),
            DEFAULT_MAX_CONTENT_BYTES,
        )
        .unwrap();
        store.insert(new).unwrap()
    }

    #[test]
    fn insert_assigns_fresh_ids() {
        let (store, _dir) = open();
        let a = insert(&store, None, None);
        let b = insert(&store, None, None);

        assert_ne!(a.id, b.id);
        assert_eq!(a.view_count, 0);
        assert_eq!(store.find(&a.id).unwrap(), Some(a));
    }

    #[test]
    fn find_missing_is_none() {
        let (store, _dir) = open();
        let id: PasteId = OsRng.sample(Generator);
        assert_eq!(store.find(&id).unwrap(), None);
        assert_eq!(store.conditionally_increment_view(&id, t0()).unwrap(), None);
    }

    #[test]
    fn find_has_no_side_effects() {
        let (store, _dir) = open();
        let paste = insert(&store, None, Some(1));

        for _ in 0..10 {
            assert_eq!(store.find(&paste.id).unwrap().unwrap().view_count, 0);
        }
    }

    #[test]
    fn increment_stops_at_max_views() {
        let (store, _dir) = open();
        let paste = insert(&store, None, Some(3));

        for expected in 1..=3 {
            let updated = store
                .conditionally_increment_view(&paste.id, t0())
                .unwrap()
                .unwrap();
            assert_eq!(updated.view_count, expected);
        }

        assert_eq!(store.conditionally_increment_view(&paste.id, t0()).unwrap(), None);
        assert_eq!(store.find(&paste.id).unwrap().unwrap().view_count, 3);
    }

    #[test]
    fn increment_refused_from_expiry_on() {
        let (store, _dir) = open();
        let paste = insert(&store, Some(5), None);

        let just_before = t0() + Duration::milliseconds(4_999);
        assert!(store
            .conditionally_increment_view(&paste.id, just_before)
            .unwrap()
            .is_some());

        let at_expiry = t0() + Duration::seconds(5);
        assert_eq!(store.conditionally_increment_view(&paste.id, at_expiry).unwrap(), None);
        assert_eq!(store.find(&paste.id).unwrap().unwrap().view_count, 1);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let paste = {
            let store = RocksStore::open(dir.path()).unwrap();
            let paste = insert(&store, Some(60), Some(5));
            store.conditionally_increment_view(&paste.id, t0()).unwrap();
            paste
        };

        let store = RocksStore::open(dir.path()).unwrap();
        let found = store.find(&paste.id).unwrap().unwrap();
        assert_eq!(found.view_count, 1);
        assert_eq!(found.expires_at, paste.expires_at);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (store, _dir) = open();
        let short = insert(&store, Some(5), None);
        let long = insert(&store, Some(60), None);
        let forever = insert(&store, None, None);
        let used_up = insert(&store, None, Some(1));
        store.conditionally_increment_view(&used_up.id, t0()).unwrap();

        let removed = store.sweep_expired(t0() + Duration::seconds(10)).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.find(&short.id).unwrap(), None);
        assert!(store.find(&long.id).unwrap().is_some());
        assert!(store.find(&forever.id).unwrap().is_some());
        assert!(store.find(&used_up.id).unwrap().is_some());
    }

    #[test]
    fn ping_on_empty_store() {
        let (store, _dir) = open();
        store.ping().unwrap();
    }

    #[test]
    fn concurrent_increments_never_exceed_max_views() {
        const READERS: usize = 32;
        const MAX_VIEWS: u32 = 5;

        let (store, _dir) = open();
        let store = Arc::new(store);
        let paste = insert(&store, Some(60), Some(i64::from(MAX_VIEWS)));
        let barrier = Arc::new(Barrier::new(READERS));

        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let id = paste.id;
                thread::spawn(move || {
                    barrier.wait();
                    store.conditionally_increment_view(&id, t0()).unwrap()
                })
            })
            .collect();

        let mut counts: Vec<u32> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(|p| p.view_count)
            .collect();
        counts.sort_unstable();

        // Every winner saw a distinct count, 1 through K.
        assert_eq!(counts, (1..=MAX_VIEWS).collect::<Vec<_>>());
        assert_eq!(store.find(&paste.id).unwrap().unwrap().view_count, MAX_VIEWS);
    }
}

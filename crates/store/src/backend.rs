use crate::{Aggregate, StoreError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Key under which the aggregate lives when none is configured.
pub const DEFAULT_KEY: &str = "centroid:aggregate";

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored value matched `expected` and now holds `next`.
    Stored,
    /// The stored value did not match `expected`; nothing was written.
    Conflict,
}

/// Trait for a single-key aggregate store.
///
/// Every access to the persisted aggregate goes through this trait. Calls are
/// blocking; async callers run them on a blocking thread with a timeout.
pub trait AggregateStore: Send + Sync {
    /// Load the current aggregate, `None` when the key is absent.
    fn load(&self) -> Result<Option<Aggregate>, StoreError>;

    /// Atomically replace the aggregate with `next` only if the stored value
    /// equals `expected`, or the key is absent and `expected` is `None`.
    fn compare_and_store(
        &self,
        expected: Option<&Aggregate>,
        next: &Aggregate,
    ) -> Result<CasOutcome, StoreError>;

    /// Check that the store is reachable.
    fn ping(&self) -> Result<(), StoreError> {
        self.load().map(|_| ())
    }

    /// Short backend label for logs.
    fn name(&self) -> &'static str;
}

/// Configuration for selecting and building a backend.
///
/// ```
/// use store::StoreConfig;
/// use std::time::Duration;
///
/// // In-memory (for testing)
/// let config = StoreConfig::in_memory();
///
/// // Redb file on local disk
/// let config = StoreConfig::redb("/data/centroid.redb");
///
/// // Shared Redis instance, reachable by every replica
/// let config = StoreConfig::redis("127.0.0.1", 6379, Duration::from_millis(500))
///     .with_key("centroid:prod");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub enum StoreConfig {
    /// Process-local store. Lost on restart.
    #[default]
    InMemory,
    /// Redb database file. Requires the `backend-redb` feature.
    Redb { path: String, key: String },
    /// Redis server. Requires the `backend-redis` feature.
    Redis {
        url: String,
        key: String,
        timeout: Duration,
    },
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        StoreConfig::InMemory
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        StoreConfig::Redb {
            path: path.into(),
            key: DEFAULT_KEY.to_string(),
        }
    }

    pub fn redis(host: &str, port: u16, timeout: Duration) -> Self {
        StoreConfig::Redis {
            url: format!("redis://{host}:{port}/"),
            key: DEFAULT_KEY.to_string(),
            timeout,
        }
    }

    /// Override the key. Ignored by the in-memory backend.
    pub fn with_key<K: Into<String>>(mut self, new_key: K) -> Self {
        match &mut self {
            StoreConfig::InMemory => {}
            StoreConfig::Redb { key, .. } | StoreConfig::Redis { key, .. } => {
                *key = new_key.into();
            }
        }
        self
    }

    /// Build the backend described by this configuration.
    ///
    /// Each backend is only available if its feature flag is enabled at
    /// compile time; a disabled backend yields [`StoreError::Config`].
    pub fn build(&self) -> Result<Arc<dyn AggregateStore>, StoreError> {
        match self {
            StoreConfig::InMemory => Ok(Arc::new(InMemoryStore::new())),
            StoreConfig::Redb { path, key } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Arc::new(RedbStore::open(path, key)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = (path, key);
                    Err(StoreError::Config(
                        "redb backend disabled at compile time".into(),
                    ))
                }
            }
            StoreConfig::Redis { url, key, timeout } => {
                #[cfg(feature = "backend-redis")]
                {
                    Ok(Arc::new(RedisStore::open(url, key, *timeout)?))
                }
                #[cfg(not(feature = "backend-redis"))]
                {
                    let _ = (url, key, timeout);
                    Err(StoreError::Config(
                        "redis backend disabled at compile time".into(),
                    ))
                }
            }
        }
    }
}

/// An in-memory store using a `Mutex` around the single slot.
///
/// The mutex is the store's own atomicity primitive: compare and write happen
/// under one guard, exactly as a remote store would do them in one
/// transaction.
#[derive(Default)]
pub struct InMemoryStore {
    slot: Mutex<Option<Aggregate>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `aggregate`.
    pub fn with_aggregate(aggregate: Aggregate) -> Self {
        Self {
            slot: Mutex::new(Some(aggregate)),
        }
    }
}

impl AggregateStore for InMemoryStore {
    fn load(&self) -> Result<Option<Aggregate>, StoreError> {
        let guard = self
            .slot
            .lock()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        Ok(guard.clone())
    }

    fn compare_and_store(
        &self,
        expected: Option<&Aggregate>,
        next: &Aggregate,
    ) -> Result<CasOutcome, StoreError> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| StoreError::unavailable("poisoned lock"))?;
        if guard.as_ref() != expected {
            return Ok(CasOutcome::Conflict);
        }
        *guard = Some(next.clone());
        Ok(CasOutcome::Stored)
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// Decide a compare-and-store against the raw bytes currently stored.
///
/// Values are compared decoded, so two encodings of the same aggregate
/// (`0` versus `0.0`) are equal.
pub(crate) fn matches_expected(
    current: Option<&[u8]>,
    expected: Option<&Aggregate>,
) -> Result<bool, StoreError> {
    match (current, expected) {
        (None, None) => Ok(true),
        (Some(bytes), Some(expected)) => Ok(&Aggregate::decode(bytes)? == expected),
        _ => Ok(false),
    }
}

#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use self::redb::RedbStore;

#[cfg(feature = "backend-redis")]
pub mod redis;

#[cfg(feature = "backend-redis")]
pub use self::redis::RedisStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_starts_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.load().unwrap(), None);
        assert!(store.ping().is_ok());
    }

    #[test]
    fn in_memory_initializes_only_when_absent() {
        let store = InMemoryStore::new();
        let zero = Aggregate::zeros(2);
        assert_eq!(
            store.compare_and_store(None, &zero).unwrap(),
            CasOutcome::Stored
        );
        assert_eq!(
            store.compare_and_store(None, &zero).unwrap(),
            CasOutcome::Conflict
        );
    }

    #[test]
    fn in_memory_rejects_stale_expected() {
        let zero = Aggregate::zeros(1);
        let store = InMemoryStore::with_aggregate(zero.clone());
        let one = zero.apply(&[1.0], 1).unwrap();
        let two = one.apply(&[1.0], 1).unwrap();

        assert_eq!(
            store.compare_and_store(Some(&zero), &one).unwrap(),
            CasOutcome::Stored
        );
        // `zero` is now stale.
        assert_eq!(
            store.compare_and_store(Some(&zero), &two).unwrap(),
            CasOutcome::Conflict
        );
        assert_eq!(store.load().unwrap(), Some(one));
    }

    #[test]
    fn matches_expected_compares_decoded_values() {
        let zero = Aggregate::zeros(1);
        assert!(matches_expected(Some(b"[0, 0]"), Some(&zero)).unwrap());
        assert!(!matches_expected(Some(b"[1, 0]"), Some(&zero)).unwrap());
        assert!(matches_expected(None, None).unwrap());
        assert!(!matches_expected(None, Some(&zero)).unwrap());
        assert!(!matches_expected(Some(b"[0, 0]"), None).unwrap());
    }

    #[test]
    fn config_builds_in_memory() {
        let store = StoreConfig::in_memory().build().unwrap();
        assert_eq!(store.name(), "in_memory");
    }

    #[test]
    fn with_key_overrides_default() {
        let cfg = StoreConfig::redb("/tmp/a.redb").with_key("custom");
        assert_eq!(
            cfg,
            StoreConfig::Redb {
                path: "/tmp/a.redb".into(),
                key: "custom".into()
            }
        );
    }

    #[test]
    fn redis_config_formats_url() {
        let cfg = StoreConfig::redis("10.0.0.5", 6380, Duration::from_millis(250));
        match cfg {
            StoreConfig::Redis { url, key, timeout } => {
                assert_eq!(url, "redis://10.0.0.5:6380/");
                assert_eq!(key, DEFAULT_KEY);
                assert_eq!(timeout, Duration::from_millis(250));
            }
            other => panic!("unexpected config {other:?}"),
        }
    }
}

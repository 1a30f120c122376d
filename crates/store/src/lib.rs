//! Persistence for the centroid service's running aggregate.
//!
//! The aggregate lives under one fixed key in an external store and is only
//! ever read or written through the [`AggregateStore`] trait. Writers never
//! store unconditionally: [`AggregateStore::compare_and_store`] applies the
//! next value only if the store still holds the value the writer started
//! from, which is what keeps concurrent updates from being lost.
//!
//! ## Backends
//!
//! | Backend | Feature | Scope |
//! |---------|---------|-------|
//! | [`InMemoryStore`] | always | tests, ephemeral runs |
//! | `RedbStore` | `backend-redb` | single process, durable file |
//! | `RedisStore` | `backend-redis` | shared across processes and replicas |
//!
//! ## Example
//!
//! ```
//! use store::{Aggregate, AggregateStore, CasOutcome, StoreConfig};
//!
//! let store = StoreConfig::in_memory().build().unwrap();
//! let zero = Aggregate::zeros(3);
//! assert_eq!(store.compare_and_store(None, &zero).unwrap(), CasOutcome::Stored);
//!
//! let next = zero.apply(&[1.0, 2.0, 3.0], 1).unwrap();
//! assert_eq!(store.compare_and_store(Some(&zero), &next).unwrap(), CasOutcome::Stored);
//! assert_eq!(store.load().unwrap(), Some(next));
//! ```

mod aggregate;
mod backend;
mod error;

pub use crate::aggregate::{Aggregate, TotalOverflow};
pub use crate::backend::{AggregateStore, CasOutcome, InMemoryStore, StoreConfig, DEFAULT_KEY};
pub use crate::error::StoreError;

#[cfg(feature = "backend-redb")]
pub use crate::backend::RedbStore;

#[cfg(feature = "backend-redis")]
pub use crate::backend::RedisStore;

//! Redis backend for the aggregate.
//!
//! Compare-and-store is an optimistic Redis transaction:
//!
//! 1. `WATCH key`
//! 2. `GET key`, decode, compare with the expected aggregate
//! 3. `MULTI` / `SET key next` / `EXEC`
//!
//! If any other client writes the key between `WATCH` and `EXEC`, the server
//! discards the transaction and `EXEC` replies nil, which is reported as
//! [`CasOutcome::Conflict`]. A fresh connection is opened for every
//! operation so `WATCH` state is never shared between concurrent callers.
//!
//! The configured timeout is the budget of a whole operation, not of each
//! step: connect and every command share one deadline, so a
//! compare-and-store never outlives the timeout its caller waits on.

use crate::backend::matches_expected;
use crate::{Aggregate, AggregateStore, CasOutcome, StoreError};
use redis::{Client, Connection, Value};
use std::time::{Duration, Instant};
use tracing::debug;

/// Redis backend holding the aggregate under a single key.
pub struct RedisStore {
    client: Client,
    key: String,
    timeout: Duration,
}

impl RedisStore {
    /// Create a client for `url`. No connection is made until the first call.
    pub fn open(url: &str, key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self {
            client,
            key: key.to_string(),
            timeout,
        })
    }

    fn connect(&self, deadline: &Deadline) -> Result<Connection, StoreError> {
        let con = self
            .client
            .get_connection_with_timeout(deadline.remaining()?)
            .map_err(StoreError::unavailable)?;
        deadline.arm(&con)?;
        Ok(con)
    }

    fn get_raw(
        &self,
        con: &mut Connection,
        deadline: &Deadline,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        deadline.arm(con)?;
        redis::cmd("GET")
            .arg(&self.key)
            .query(con)
            .map_err(StoreError::unavailable)
    }
}

/// Time left for one operation.
struct Deadline(Instant);

impl Deadline {
    fn after(budget: Duration) -> Self {
        Deadline(Instant::now() + budget)
    }

    fn remaining(&self) -> Result<Duration, StoreError> {
        let left = self.0.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(StoreError::Unavailable(
                "redis operation ran out of time".to_string(),
            ));
        }
        Ok(left)
    }

    /// Bound the next command's socket reads and writes by the time left.
    fn arm(&self, con: &Connection) -> Result<(), StoreError> {
        let left = self.remaining()?;
        con.set_read_timeout(Some(left))
            .map_err(StoreError::unavailable)?;
        con.set_write_timeout(Some(left))
            .map_err(StoreError::unavailable)
    }
}

impl AggregateStore for RedisStore {
    fn load(&self) -> Result<Option<Aggregate>, StoreError> {
        let deadline = Deadline::after(self.timeout);
        let mut con = self.connect(&deadline)?;
        match self.get_raw(&mut con, &deadline)? {
            Some(bytes) => Aggregate::decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn compare_and_store(
        &self,
        expected: Option<&Aggregate>,
        next: &Aggregate,
    ) -> Result<CasOutcome, StoreError> {
        let payload = next.encode()?;
        let deadline = Deadline::after(self.timeout);
        let mut con = self.connect(&deadline)?;

        redis::cmd("WATCH")
            .arg(&self.key)
            .query::<()>(&mut con)
            .map_err(StoreError::unavailable)?;

        let current = self.get_raw(&mut con, &deadline)?;
        if !matches_expected(current.as_deref(), expected)? {
            deadline.arm(&con)?;
            redis::cmd("UNWATCH")
                .query::<()>(&mut con)
                .map_err(StoreError::unavailable)?;
            debug!(key = %self.key, "redis value changed before compare-and-store");
            return Ok(CasOutcome::Conflict);
        }

        deadline.arm(&con)?;
        let reply: Value = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&self.key)
            .arg(payload)
            .query(&mut con)
            .map_err(StoreError::unavailable)?;

        match reply {
            Value::Nil => {
                debug!(key = %self.key, "redis transaction discarded by concurrent write");
                Ok(CasOutcome::Conflict)
            }
            _ => Ok(CasOutcome::Stored),
        }
    }

    fn ping(&self) -> Result<(), StoreError> {
        let deadline = Deadline::after(self.timeout);
        let mut con = self.connect(&deadline)?;
        redis::cmd("PING")
            .query::<String>(&mut con)
            .map(|_| ())
            .map_err(StoreError::unavailable)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

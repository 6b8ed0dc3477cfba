//! Bounded pool of [`tokio_rusqlite`] connections.
//!
//! Every connection is opened up front. A semaphore bounds how many callers
//! hold one at a time; a caller that cannot get a permit within the
//! configured timeout fails with [`Error::PoolTimeout`]. The connection goes
//! back to the pool when its [`PooledConnection`] guard drops, whether or not
//! the work done with it succeeded.

use std::{
  ops::Deref,
  sync::atomic::{AtomicU64, Ordering},
  time::Duration,
};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio_rusqlite::Connection;
use tracing::{debug, trace};

use crate::{Error, Result, StoreConfig};

pub struct ConnectionPool {
  idle:            Mutex<Vec<Connection>>,
  permits:         Semaphore,
  acquire_timeout: Duration,
  size:            usize,
  acquired:        AtomicU64,
}

impl ConnectionPool {
  /// Open `config.pool_size()` connections to `config.connection`.
  pub async fn open(config: &StoreConfig) -> Result<Self> {
    let size = config.pool_size();
    let acquire_timeout = config.acquire_timeout_duration();

    debug!(
      connection = %config.connection,
      username = %config.username,
      size,
      "opening connection pool"
    );

    let mut idle = Vec::with_capacity(size);
    for _ in 0..size {
      let conn = if config.is_in_memory() {
        Connection::open_in_memory().await
      } else {
        Connection::open(&config.connection).await
      }
      .map_err(Error::Connection)?;

      conn
        .call(move |conn| {
          conn.busy_timeout(acquire_timeout)?;
          Ok(())
        })
        .await
        .map_err(Error::Connection)?;

      idle.push(conn);
    }

    Ok(Self {
      idle: Mutex::new(idle),
      permits: Semaphore::new(size),
      acquire_timeout,
      size,
      acquired: AtomicU64::new(0),
    })
  }

  /// Wait (up to the configured timeout) for a free connection.
  pub async fn acquire(&self) -> Result<PooledConnection<'_>> {
    let permit = tokio::time::timeout(self.acquire_timeout, self.permits.acquire())
      .await
      .map_err(|_| Error::PoolTimeout(self.acquire_timeout))?
      .map_err(|_| Error::PoolClosed)?;

    let conn = self.idle.lock().pop().ok_or(Error::PoolClosed)?;
    self.acquired.fetch_add(1, Ordering::Relaxed);
    trace!(available = self.permits.available_permits(), "connection acquired");

    Ok(PooledConnection {
      conn:    Some(conn),
      pool:    self,
      _permit: permit,
    })
  }

  pub fn size(&self) -> usize { self.size }

  pub fn acquire_timeout(&self) -> Duration { self.acquire_timeout }

  /// Total successful acquisitions since the pool opened.
  pub fn acquired_total(&self) -> u64 { self.acquired.load(Ordering::Relaxed) }

  /// Refuse further acquisitions and close every idle connection.
  ///
  /// Connections currently checked out are closed when dropped back into a
  /// closed pool.
  pub async fn close(&self) -> Result<()> {
    self.permits.close();
    let idle = std::mem::take(&mut *self.idle.lock());
    for conn in idle {
      conn.close().await.map_err(Error::Connection)?;
    }
    debug!("connection pool closed");
    Ok(())
  }
}

// ─── Guard ───────────────────────────────────────────────────────────────────

/// A connection checked out of a [`ConnectionPool`].
pub struct PooledConnection<'a> {
  conn:    Option<Connection>,
  pool:    &'a ConnectionPool,
  _permit: SemaphorePermit<'a>,
}

impl Deref for PooledConnection<'_> {
  type Target = Connection;

  fn deref(&self) -> &Connection {
    // Only `Drop` takes the connection out.
    self.conn.as_ref().expect("pooled connection already released")
  }
}

impl Drop for PooledConnection<'_> {
  fn drop(&mut self) {
    if let Some(conn) = self.conn.take() {
      if self.pool.permits.is_closed() {
        // Dropping the handle shuts the connection's thread down.
        drop(conn);
      } else {
        self.pool.idle.lock().push(conn);
      }
    }
  }
}

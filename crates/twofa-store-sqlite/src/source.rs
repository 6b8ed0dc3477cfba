//! [`SqliteUserDataSource`] — the SQLite implementation of [`UserDataSource`].

use std::sync::{Arc, Weak};

use rusqlite::OptionalExtension as _;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use twofa_core::{
  buffer::{PendingCounts, WriteBackBuffer},
  context::{SchedulingContext, ensure_off_primary},
  identity::encode_identity,
  record::{AuthRecord, DirtyObserver, RecordState},
  source::UserDataSource,
};

use crate::{
  Error, Result, StoreConfig,
  encode::{EncodedRow, RawRecord},
  pool::ConnectionPool,
  schema,
};

// ─── Data source ─────────────────────────────────────────────────────────────

/// Two-factor records in a SQLite database, with write-back buffering.
///
/// Lookups hit the database directly. Mutations are buffered and written by
/// [`save`](UserDataSource::save), which holds a pooled connection only for
/// the duration of the batch.
///
/// Writers are serialised by a single permit regardless of pool size, so
/// batches commit in the order they were taken.
pub struct SqliteUserDataSource {
  pool:              ConnectionPool,
  buffer:            Arc<WriteBackBuffer>,
  context:           Arc<dyn SchedulingContext>,
  pub(crate) writer: Mutex<()>,
}

impl SqliteUserDataSource {
  /// Open the pool described by `config` and bootstrap the schema.
  ///
  /// `context` decides which callers count as the primary scheduling
  /// context; lookups and flushes from there are refused.
  pub async fn open(config: &StoreConfig, context: Arc<dyn SchedulingContext>) -> Result<Self> {
    let pool = ConnectionPool::open(config).await?;
    let source = Self {
      pool,
      buffer: Arc::new(WriteBackBuffer::new()),
      context,
      writer: Mutex::new(()),
    };
    source.init_schema().await?;
    Ok(source)
  }

  /// Open a private in-memory store — useful for testing.
  pub async fn open_in_memory(context: Arc<dyn SchedulingContext>) -> Result<Self> {
    Self::open(&StoreConfig::in_memory(), context).await
  }

  async fn init_schema(&self) -> Result<()> {
    let _writer = self.lock_writer().await?;
    let conn = self.pool.acquire().await?;
    let created = conn
      .call(|conn| Ok(schema::bootstrap(conn)?))
      .await
      .map_err(Error::Schema)?;

    if created {
      info!(table = schema::TABLE, "created two-factor table");
    } else {
      debug!(table = schema::TABLE, "two-factor table present");
    }
    Ok(())
  }

  /// Take the writer permit, waiting no longer than the pool would.
  async fn lock_writer(&self) -> Result<MutexGuard<'_, ()>> {
    let timeout = self.pool.acquire_timeout();
    tokio::time::timeout(timeout, self.writer.lock())
      .await
      .map_err(|_| Error::PoolTimeout(timeout))
  }

  fn observer(&self) -> Weak<dyn DirtyObserver> {
    let weak: Weak<WriteBackBuffer> = Arc::downgrade(&self.buffer);
    weak
  }

  /// Counts of updates and deletions waiting for the next flush.
  pub fn pending(&self) -> PendingCounts { self.buffer.pending() }

  pub fn pool(&self) -> &ConnectionPool { &self.pool }

  /// Flush anything still pending, then close the pool.
  pub async fn close(self) -> Result<()> {
    self.save().await?;
    self.pool.close().await
  }
}

// ─── UserDataSource impl ─────────────────────────────────────────────────────

impl UserDataSource for SqliteUserDataSource {
  type Error = Error;

  async fn get_user(&self, identity: Uuid) -> Result<Option<AuthRecord>> {
    ensure_off_primary(self.context.as_ref(), "get_user")?;

    let id_str = encode_identity(identity);
    let conn = self.pool.acquire().await?;

    let raw: Option<RawRecord> = conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            schema::SELECT_BY_IDENTITY,
            rusqlite::params![id_str],
            RawRecord::from_row,
          )
          .optional()?)
      })
      .await?;
    drop(conn);

    trace!(%identity, found = raw.is_some(), "looked up two-factor record");
    raw.map(|raw| raw.into_record(self.observer())).transpose()
  }

  fn create_user(&self, identity: Uuid) -> AuthRecord {
    let record = AuthRecord::new(identity, RecordState::default(), self.observer());
    self.buffer.stage_update(&record);
    record
  }

  fn destroy_user(&self, identity: Uuid) { self.buffer.stage_deletion(identity); }

  async fn save(&self) -> Result<()> {
    ensure_off_primary(self.context.as_ref(), "save")?;

    if self.buffer.pending().is_empty() {
      trace!("nothing to flush");
      return Ok(());
    }

    // Swap only once the writer permit and connection are ours, so a timeout
    // leaves the staged work in place for the next attempt.
    let _writer = self.lock_writer().await?;
    let conn = self.pool.acquire().await?;
    let batch = self.buffer.take();
    if batch.is_empty() {
      return Ok(());
    }

    let dropped = batch.dropped;
    let deletions: Vec<String> = batch.deletions.into_iter().map(encode_identity).collect();
    let upserts: Vec<EncodedRow> = batch.upserts.into_iter().map(EncodedRow::from).collect();
    let (deleted, upserted) = (deletions.len(), upserts.len());

    let result = conn
      .call(move |conn| {
        let mut delete = conn.prepare(schema::DELETE_BY_IDENTITY)?;
        for id in &deletions {
          delete.execute(rusqlite::params![id])?;
        }

        let mut upsert = conn.prepare(schema::UPSERT)?;
        for row in &upserts {
          upsert.execute(rusqlite::params![
            row.identity,
            row.address,
            row.secret,
            row.locked,
          ])?;
        }
        Ok(())
      })
      .await;

    match result {
      Ok(()) => {
        debug!(deleted, upserted, dropped, "flushed two-factor records");
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, deleted, upserted, "flush failed; unapplied rows are discarded");
        Err(Error::Query(e))
      }
    }
  }

  fn invalidate_cache(&self) -> Result<()> {
    // Reads always go to the database; there is no cache to drop.
    Ok(())
  }
}

//! The `UserDataSource` trait.
//!
//! The trait is implemented by storage backends (e.g. `twofa-store-sqlite`).
//! Host code (login hooks, command handlers, admin tooling) depends on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::record::AuthRecord;

/// Abstraction over a durable store of two-factor records.
///
/// Mutations made through returned [`AuthRecord`]s, and the effects of
/// [`create_user`](Self::create_user) and
/// [`destroy_user`](Self::destroy_user), are buffered in memory until the
/// next [`save`](Self::save).
///
/// All async methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait UserDataSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up the record for `identity`. Returns `None` if no row exists.
  ///
  /// Fails immediately when invoked from the primary scheduling context.
  fn get_user(
    &self,
    identity: Uuid,
  ) -> impl Future<Output = Result<Option<AuthRecord>, Self::Error>> + Send + '_;

  /// Create a fresh, unenrolled record and stage it for the next flush.
  fn create_user(&self, identity: Uuid) -> AuthRecord;

  /// Stage `identity` for deletion. Handles to its record become stale.
  fn destroy_user(&self, identity: Uuid);

  /// Flush every staged update and deletion to the store.
  ///
  /// Safe to call with nothing staged.
  fn save(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Drop any read cache the backend keeps.
  fn invalidate_cache(&self) -> Result<(), Self::Error>;
}

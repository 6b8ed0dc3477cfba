//! Store configuration.

use std::{fmt, time::Duration};

use serde::Deserialize;

/// Connection string that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Connection settings for [`SqliteUserDataSource`](crate::SqliteUserDataSource).
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
  /// Database file path, or `:memory:`.
  pub connection:             String,
  /// Credentials for servers that require them. SQLite files carry no
  /// accounts, so these are only logged.
  #[serde(default)]
  pub username:               String,
  #[serde(default)]
  pub password:               String,
  /// Pool size. The default of one serialises every writer.
  #[serde(default = "default_max_connections")]
  pub max_connections:        usize,
  #[serde(default = "default_acquire_timeout_ms")]
  pub acquire_timeout_ms:     u64,
  #[serde(default = "default_autosave_interval_secs")]
  pub autosave_interval_secs: u64,
}

fn default_max_connections() -> usize { 1 }

fn default_acquire_timeout_ms() -> u64 { 5_000 }

fn default_autosave_interval_secs() -> u64 { 60 }

impl StoreConfig {
  pub fn new(connection: impl Into<String>) -> Self {
    Self {
      connection:             connection.into(),
      username:               String::new(),
      password:               String::new(),
      max_connections:        default_max_connections(),
      acquire_timeout_ms:     default_acquire_timeout_ms(),
      autosave_interval_secs: default_autosave_interval_secs(),
    }
  }

  pub fn in_memory() -> Self { Self::new(IN_MEMORY) }

  /// Builder: set credentials.
  pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
    self.username = username.into();
    self.password = password.into();
    self
  }

  /// Builder: set pool size.
  pub fn max_connections(mut self, n: usize) -> Self {
    self.max_connections = n;
    self
  }

  /// Builder: set the bound on waiting for a pooled connection.
  pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
    self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    self
  }

  pub fn is_in_memory(&self) -> bool { self.connection == IN_MEMORY }

  /// Effective pool size: at least one, and exactly one for in-memory
  /// stores, whose connections would otherwise each see a separate database.
  pub fn pool_size(&self) -> usize {
    if self.is_in_memory() { 1 } else { self.max_connections.max(1) }
  }

  pub fn acquire_timeout_duration(&self) -> Duration { Duration::from_millis(self.acquire_timeout_ms) }

  pub fn autosave_interval(&self) -> Duration { Duration::from_secs(self.autosave_interval_secs) }
}

impl fmt::Debug for StoreConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreConfig")
      .field("connection", &self.connection)
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("max_connections", &self.max_connections)
      .field("acquire_timeout_ms", &self.acquire_timeout_ms)
      .field("autosave_interval_secs", &self.autosave_interval_secs)
      .finish()
  }
}

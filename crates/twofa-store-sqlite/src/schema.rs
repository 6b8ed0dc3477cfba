//! SQL schema and statements for the two-factor table.
//!
//! [`bootstrap`] runs at data-source construction: it looks for the table,
//! creates it if absent, and stamps `PRAGMA user_version`. Future migrations
//! will be gated on that version number.

use rusqlite::Connection;

pub const TABLE: &str = "two_factor";
pub const INDEX: &str = "two_factor_identity_idx";
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_TABLE: &str = "
CREATE TABLE two_factor (
    identity  CHAR(32) PRIMARY KEY,   -- UUID, 32 hex chars, no hyphens
    address   VARCHAR(255),           -- last verified IP address
    secret    CHAR(16),               -- base32 TOTP secret
    locked    BIT NOT NULL DEFAULT 0
);
";

// Redundant with the primary key on SQLite; kept so the layout matches
// engines that do not index primary keys implicitly.
const CREATE_INDEX: &str =
  "CREATE INDEX IF NOT EXISTS two_factor_identity_idx ON two_factor (identity);";

pub const SELECT_BY_IDENTITY: &str =
  "SELECT identity, address, secret, locked FROM two_factor WHERE identity = ?1";

pub const UPSERT: &str = "
INSERT INTO two_factor (identity, address, secret, locked)
VALUES (?1, ?2, ?3, ?4)
ON CONFLICT (identity) DO UPDATE SET
    address = excluded.address,
    secret  = excluded.secret,
    locked  = excluded.locked
";

pub const DELETE_BY_IDENTITY: &str = "DELETE FROM two_factor WHERE identity = ?1";

/// Create the table and index if they are missing.
///
/// Returns `true` if the table had to be created.
pub fn bootstrap(conn: &Connection) -> rusqlite::Result<bool> {
  let tables = {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    stmt
      .query_map([], |row| row.get::<_, String>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let found = tables.iter().any(|name| name.eq_ignore_ascii_case(TABLE));
  if !found {
    conn.execute_batch(CREATE_TABLE)?;
  }
  conn.execute_batch(CREATE_INDEX)?;
  conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

  Ok(!found)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn index_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
      .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1")
      .unwrap();
    stmt
      .query_map([TABLE], |row| row.get(0))
      .unwrap()
      .collect::<rusqlite::Result<Vec<String>>>()
      .unwrap()
  }

  #[test]
  fn creates_table_and_index_once() {
    let conn = Connection::open_in_memory().unwrap();

    assert!(bootstrap(&conn).unwrap());
    assert!(!bootstrap(&conn).unwrap());

    assert!(index_names(&conn).iter().any(|name| name == INDEX));
    let version: i32 = conn
      .pragma_query_value(None, "user_version", |row| row.get(0))
      .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
  }

  #[test]
  fn existing_rows_survive_bootstrap() {
    let conn = Connection::open_in_memory().unwrap();
    bootstrap(&conn).unwrap();
    conn
      .execute(UPSERT, rusqlite::params!["0".repeat(32), None::<String>, None::<String>, true])
      .unwrap();

    bootstrap(&conn).unwrap();

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM two_factor", [], |row| row.get(0))
      .unwrap();
    assert_eq!(count, 1);
  }

  #[test]
  fn table_match_is_case_insensitive() {
    let conn = Connection::open_in_memory().unwrap();
    conn
      .execute_batch(
        "CREATE TABLE TWO_FACTOR (
           identity CHAR(32) PRIMARY KEY, address VARCHAR(255),
           secret CHAR(16), locked BIT NOT NULL DEFAULT 0
         );",
      )
      .unwrap();

    assert!(!bootstrap(&conn).unwrap());
  }

  #[test]
  fn locked_defaults_to_false() {
    let conn = Connection::open_in_memory().unwrap();
    bootstrap(&conn).unwrap();
    conn
      .execute("INSERT INTO two_factor (identity) VALUES (?1)", ["1".repeat(32)])
      .unwrap();

    let locked: bool = conn
      .query_row("SELECT locked FROM two_factor", [], |row| row.get(0))
      .unwrap();
    assert!(!locked);
  }
}

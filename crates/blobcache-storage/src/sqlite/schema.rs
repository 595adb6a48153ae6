//! Cache table DDL and schema migration.
//!
//! v1 predates `created_at`: `cache_entry` had no column recording when a
//! row was written. v2 adds it (not null, backfilled on migration) since
//! `get_created_at` and the typed API's freshness checks depend on it.
//! `ensure_schema` is run once when a connection opens and is idempotent.

use blobcache_core::ticks::now_ticks;
use rusqlite::{Connection, Result};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_info (version INTEGER NOT NULL)")?;
    let version: i32 = conn
        .query_row("SELECT version FROM schema_info LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    match version {
        0 => {
            create_v2_schema(conn)?;
            conn.execute(
                "INSERT INTO schema_info (version) VALUES (?1)",
                [CURRENT_SCHEMA_VERSION],
            )?;
        }
        1 => {
            migrate_v1_to_v2(conn)?;
            conn.execute(
                "UPDATE schema_info SET version = ?1",
                [CURRENT_SCHEMA_VERSION],
            )?;
        }
        v if v >= CURRENT_SCHEMA_VERSION => {}
        v => return Err(rusqlite::Error::InvalidParameterName(format!(
            "unsupported schema version {v}"
        ))),
    }
    Ok(())
}

fn create_v2_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cache_entry (
            key TEXT PRIMARY KEY,
            type_name TEXT,
            value BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_cache_entry_type ON cache_entry(type_name);
         CREATE INDEX IF NOT EXISTS idx_cache_entry_expires ON cache_entry(expires_at);",
    )
}

/// v1 lacks `created_at`. Per the documented upgrade path this renames the
/// old table, creates the v2 table, and copies rows with a synthesized
/// `created_at = now` — the affected rows' real insertion time is lost, so
/// "now" is the best available stand-in.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    let now = now_ticks();
    conn.execute_batch(&format!(
        "ALTER TABLE cache_entry RENAME TO cache_entry_v1;
         CREATE TABLE cache_entry (
             key TEXT PRIMARY KEY,
             type_name TEXT,
             value BLOB NOT NULL,
             created_at INTEGER NOT NULL,
             expires_at INTEGER NOT NULL
         );
         INSERT INTO cache_entry (key, type_name, value, created_at, expires_at)
         SELECT key, type_name, value, {now}, expires_at FROM cache_entry_v1;
         DROP TABLE cache_entry_v1;
         CREATE INDEX IF NOT EXISTS idx_cache_entry_type ON cache_entry(type_name);
         CREATE INDEX IF NOT EXISTS idx_cache_entry_expires ON cache_entry(expires_at);"
    ))
}

#[cfg(test)]
pub fn create_v1_schema_for_test(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE cache_entry (
            key TEXT PRIMARY KEY,
            type_name TEXT,
            value BLOB NOT NULL,
            expires_at INTEGER NOT NULL
         );
         CREATE TABLE schema_info (version INTEGER NOT NULL);
         INSERT INTO schema_info (version) VALUES (1);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_lands_on_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        let version: i32 = conn
            .query_row("SELECT version FROM schema_info LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
        conn.execute(
            "INSERT INTO cache_entry (key, type_name, value, created_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params!["k", "User", vec![1u8], 0i64, i64::MAX],
        )
        .unwrap();
    }

    #[test]
    fn v1_database_migrates_and_backfills_created_at() {
        let conn = Connection::open_in_memory().unwrap();
        create_v1_schema_for_test(&conn).unwrap();
        conn.execute(
            "INSERT INTO cache_entry (key, type_name, value, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params!["k", "User", vec![1u8], i64::MAX],
        )
        .unwrap();

        let before_migration = now_ticks();
        ensure_schema(&conn).unwrap();
        let after_migration = now_ticks();

        let version: i32 = conn
            .query_row("SELECT version FROM schema_info LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);

        let (type_name, created_at): (Option<String>, i64) = conn
            .query_row(
                "SELECT type_name, created_at FROM cache_entry WHERE key = 'k'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(type_name, Some("User".to_string()));
        assert!(created_at >= before_migration && created_at <= after_migration);
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
    }
}

//! Local SQLite settings layer for Sufra Desk.
//!
//! Uses rusqlite with WAL mode. Holds only non-sensitive client-side state:
//! categorized key/value settings (selected branch filter, viewport mode,
//! last report range) and a cache of the branch list for offline display.
//! Secrets live in the OS keyring (`storage`), never here.

use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

/// Shared state holding the database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Initialize the database at `{data_dir}/sufra-desk.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<DbState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = data_dir.join("sufra-desk.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                let wal = db_path.with_extension("db-wal");
                let shm = db_path.with_extension("db-shm");
                let _ = fs::remove_file(&wal);
                let _ = fs::remove_file(&shm);
            }
            open_and_configure(&db_path)
                .map_err(|e| format!("Database open failed after retry: {e}"))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn record_migration(conn: &Connection, version: i32) -> Result<(), String> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        params![version],
    )
    .map_err(|e| format!("record migration v{version}: {e}"))?;
    Ok(())
}

/// v1: categorized key/value settings.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS local_settings (
            category TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (category, key)
        );",
    )
    .map_err(|e| format!("migrate v1: {e}"))?;
    record_migration(conn, 1)
}

/// v2: cached branch list for offline display of the filter control.
fn migrate_v2(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cached_branches (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            payload TEXT,
            updated_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("migrate v2: {e}"))?;
    record_migration(conn, 2)
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Read one setting, `None` when absent.
pub fn get_setting(conn: &Connection, category: &str, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT value FROM local_settings WHERE category = ?1 AND key = ?2",
        params![category, key],
        |row| row.get::<_, Option<String>>(0),
    )
    .ok()
    .flatten()
}

/// Upsert one setting.
pub fn set_setting(conn: &Connection, category: &str, key: &str, value: &str) -> Result<(), String> {
    conn.execute(
        "INSERT INTO local_settings (category, key, value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT (category, key) DO UPDATE SET value = ?3, updated_at = datetime('now')",
        params![category, key, value],
    )
    .map_err(|e| format!("set setting {category}/{key}: {e}"))?;
    Ok(())
}

/// Remove one setting. Succeeds when the row does not exist.
pub fn delete_setting(conn: &Connection, category: &str, key: &str) -> Result<(), String> {
    conn.execute(
        "DELETE FROM local_settings WHERE category = ?1 AND key = ?2",
        params![category, key],
    )
    .map_err(|e| format!("delete setting {category}/{key}: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Branch cache
// ---------------------------------------------------------------------------

/// Replace the cached branch list with the latest fetch.
pub fn replace_cached_branches(
    conn: &Connection,
    branches: &[(i64, String, String)],
) -> Result<(), String> {
    conn.execute("DELETE FROM cached_branches", [])
        .map_err(|e| format!("clear branch cache: {e}"))?;
    for (id, name, payload) in branches {
        conn.execute(
            "INSERT INTO cached_branches (id, name, payload, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))",
            params![id, name, payload],
        )
        .map_err(|e| format!("cache branch {id}: {e}"))?;
    }
    Ok(())
}

/// Load the cached branch list, newest write order.
pub fn load_cached_branches(conn: &Connection) -> Result<Vec<(i64, String, String)>, String> {
    let mut stmt = conn
        .prepare("SELECT id, name, COALESCE(payload, '') FROM cached_branches ORDER BY id")
        .map_err(|e| e.to_string())?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(|e| e.to_string())?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

/// Test seam: run migrations against an arbitrary (in-memory) connection.
pub fn run_migrations_for_test(conn: &Connection) {
    run_migrations(conn).expect("migrations must succeed on a fresh database");
}

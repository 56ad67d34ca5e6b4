pub mod migrations;
pub mod models;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::ApiError;

/// Type alias for the shared database connection.
/// rusqlite is synchronous, so the connection sits behind Arc<Mutex> and is used
/// from tokio::task::spawn_blocking.
pub type DbPool = Arc<Mutex<Connection>>;

/// Initialize the SQLite database: create data directory if needed,
/// open (or create) the database file, enable WAL mode, and run migrations.
pub fn init_db(data_dir: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("hauzflow.db");
    let mut conn = Connection::open(&db_path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    migrations::migrations().to_latest(&mut conn)?;

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(Arc::new(Mutex::new(conn)))
}

/// Lock the connection inside a blocking task.
pub fn lock(db: &DbPool) -> Result<MutexGuard<'_, Connection>, ApiError> {
    db.lock().map_err(|_| ApiError::LockPoisoned)
}

/// Migrated in-memory database for unit tests.
#[cfg(test)]
pub(crate) fn open_in_memory() -> Connection {
    let mut conn = Connection::open_in_memory().expect("open in-memory db");
    conn.pragma_update(None, "foreign_keys", "ON")
        .expect("enable foreign keys");
    migrations::migrations()
        .to_latest(&mut conn)
        .expect("run migrations");
    conn
}

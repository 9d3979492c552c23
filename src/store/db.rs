// Keyvault — SQLCipher Database Management
//
// Opens and initializes the encrypted SQLCipher file backing the on-disk
// blob store. The encryption key is derived from the master secret in the
// enclave module and is set via PRAGMA before any table is touched.

use rusqlite::Connection;

use super::StoreError;

/// Wrapper around a SQLCipher-encrypted SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) an encrypted database at the given path.
    /// `hex_key` is the hex-encoded 32-byte key derived with Argon2id.
    pub fn open(path: &std::path::Path, hex_key: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "key", format!("x'{}'", hex_key))?;

        // A wrong key surfaces here as "file is not a database"
        conn.execute_batch("SELECT count(*) FROM sqlite_master;")
            .map_err(|_| StoreError::InvalidKey)?;

        let db = Self { conn };
        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (unencrypted, for testing only).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS key_items (
                tag         TEXT PRIMARY KEY,
                family      TEXT NOT NULL,
                material    BLOB NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS blob_items (
                account     TEXT PRIMARY KEY,
                data        BLOB NOT NULL,
                updated_at  TEXT NOT NULL
            );
            ",
        )?;

        tracing::debug!("Store migrations completed successfully");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

//! Shared SQLite PRAGMA configuration
//!
//! Applied to every connection on open: WAL journal, NORMAL sync, in-memory
//! temp store, mmap, larger page cache, and a 1000-page autocheckpoint.

use rusqlite::Connection;

pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "mmap_size", 268_435_456_i64)?;
    conn.pragma_update(None, "cache_size", -64_000_i64)?;
    conn.pragma_update(None, "wal_autocheckpoint", 1_000_i64)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pragmas_applied() {
        let dir = tempdir().unwrap();
        let conn = Connection::open(dir.path().join("pragma.db")).unwrap();
        apply_optimized_pragmas(&conn).unwrap();

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let checkpoint: i32 = conn
            .query_row("PRAGMA wal_autocheckpoint", [], |row| row.get(0))
            .unwrap();
        assert_eq!(checkpoint, 1000);
    }
}

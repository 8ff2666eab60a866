use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    date TEXT NOT NULL,
    revenue REAL NOT NULL DEFAULT 0,
    cogs REAL NOT NULL DEFAULT 0,
    sales_commission REAL NOT NULL DEFAULT 0,
    sales_program REAL NOT NULL DEFAULT 0,
    customer_name TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT 'General',
    upload_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (upload_id) REFERENCES uploads(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    records_count INTEGER NOT NULL,
    file_size INTEGER,
    status TEXT NOT NULL DEFAULT 'success',
    error_message TEXT,
    checksum TEXT,
    uploaded_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Open the database at `db_path`, creating its parent directory and schema if needed.
pub fn open_initialized(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = get_connection(db_path)?;
    init_db(&conn)?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["transactions", "uploads"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_open_initialized_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("margo.db");
        let conn = open_initialized(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_category_defaults_to_general() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO transactions (date, customer_name) VALUES ('2024-01-01', 'Acme')",
            [],
        )
        .unwrap();
        let category: String = conn
            .query_row("SELECT category FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(category, "General");
    }
}

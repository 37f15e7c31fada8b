use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "hydrops.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bids (
    id INTEGER PRIMARY KEY,
    bid_number TEXT NOT NULL,
    project_name TEXT NOT NULL,
    client_name TEXT NOT NULL DEFAULT '',
    client_contact TEXT,
    client_email TEXT,
    client_phone TEXT,
    location TEXT,
    description TEXT,
    estimated_value REAL,
    estimated_duration_days INTEGER,
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'submitted', 'won', 'lost', 'cancelled')),
    import_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (import_id) REFERENCES imports(id)
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    format TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    skipped_count INTEGER,
    checksum TEXT,
    imported_by TEXT
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY,
    job_number TEXT NOT NULL,
    job_name TEXT NOT NULL,
    client_name TEXT NOT NULL DEFAULT '',
    location TEXT,
    bid_id INTEGER,
    contract_value REAL,
    status TEXT NOT NULL DEFAULT 'active',
    start_date TEXT,
    created_by TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (bid_id) REFERENCES bids(id)
);

CREATE TABLE IF NOT EXISTS cost_codes (
    id INTEGER PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    is_active INTEGER DEFAULT 1
);

CREATE TABLE IF NOT EXISTS job_cost_codes (
    id INTEGER PRIMARY KEY,
    job_id INTEGER NOT NULL,
    cost_code_id INTEGER NOT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE,
    FOREIGN KEY (cost_code_id) REFERENCES cost_codes(id)
);
";

// (code, name, description)
const DEFAULT_COST_CODES: &[(&str, &str, &str)] = &[
    ("01-100", "Mobilization", "Move crew and equipment to site"),
    ("02-200", "Hydrodemolition", "Robotic concrete removal"),
    ("02-210", "Hand Lancing", "Manual high-pressure removal at edges and obstructions"),
    ("03-300", "Debris Removal", "Vacuum truck and slurry cleanup"),
    ("04-400", "Water Treatment", "Runoff collection, filtration and pH control"),
    ("05-500", "Equipment", "Pumps, robots, hoses and rentals"),
    ("06-600", "Labor", "Operators and laborers"),
    ("07-700", "Per Diem & Travel", "Lodging, meals and mileage"),
    ("09-900", "Demobilization", "Tear down and return to yard"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM cost_codes", [], |row| row.get(0))?;
    if count == 0 {
        for (code, name, description) in DEFAULT_COST_CODES {
            conn.execute(
                "INSERT INTO cost_codes (code, name, description) VALUES (?1, ?2, ?3)",
                rusqlite::params![code, name, description],
            )?;
        }
    }
    Ok(())
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
        for expected in &["bids", "imports", "jobs", "cost_codes", "job_cost_codes"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT count(*) FROM cost_codes", [], |r| r.get(0)).unwrap();
        assert_eq!(count as usize, DEFAULT_COST_CODES.len());
    }

    #[test]
    fn test_bid_status_is_constrained() {
        let (_dir, conn) = test_db();
        let err = conn.execute(
            "INSERT INTO bids (bid_number, project_name, status) VALUES ('B-1', 'Deck', 'archived')",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_new_bid_defaults_to_draft() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO bids (bid_number, project_name) VALUES ('B-1', 'Deck')",
            [],
        ).unwrap();
        let status: String = conn.query_row("SELECT status FROM bids", [], |r| r.get(0)).unwrap();
        assert_eq!(status, "draft");
    }
}

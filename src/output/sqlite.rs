//! SQLite sink
//!
//! Results go to a `results` table; each result's outbound links go to a
//! `links` table keyed by the result row.

use crate::crawler::CrawlResult;
use crate::output::traits::{OutputResult, OutputSink};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema for the results database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    final_url TEXT,
    depth INTEGER NOT NULL,
    origin TEXT,
    status INTEGER,
    fields TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_results_url ON results(url);

CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    result_id INTEGER NOT NULL REFERENCES results(id),
    position INTEGER NOT NULL,
    url TEXT NOT NULL,
    UNIQUE(result_id, position)
);

CREATE INDEX IF NOT EXISTS idx_links_result ON links(result_id);
"#;

pub struct SqliteSink {
    conn: Connection,
    written: usize,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path`
    pub fn open(path: &Path) -> OutputResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        Self::with_connection(conn)
    }

    /// Creates an in-memory database
    pub fn in_memory() -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> OutputResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, written: 0 })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl OutputSink for SqliteSink {
    fn write(&mut self, result: CrawlResult) -> OutputResult<()> {
        let fields = serde_json::to_string(&result.fields)?;
        let error = result
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO results (url, final_url, depth, origin, status, fields, fetched_at, attempts, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.url,
                result.final_url,
                result.depth,
                result.origin,
                result.status,
                fields,
                result.fetched_at.to_rfc3339(),
                result.attempts,
                error,
            ],
        )?;
        let result_id = tx.last_insert_rowid();

        {
            let mut stmt =
                tx.prepare("INSERT INTO links (result_id, position, url) VALUES (?1, ?2, ?3)")?;
            for (position, link) in result.links.iter().enumerate() {
                stmt.execute(params![result_id, position as i64, link])?;
            }
        }

        tx.commit()?;
        self.written += 1;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

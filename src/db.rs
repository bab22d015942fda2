use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::parser::records::RowRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id         INTEGER PRIMARY KEY,
            source     TEXT UNIQUE NOT NULL,
            extractor  TEXT,
            status     TEXT NOT NULL CHECK(status IN ('parsed','failed')),
            error      TEXT,
            char_count INTEGER,
            parsed_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS allocation_rows (
            id                INTEGER PRIMARY KEY,
            document_id       INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            position          INTEGER NOT NULL,
            section_id        TEXT NOT NULL,
            priority          TEXT,
            objective         TEXT,
            funding_programme TEXT,
            scope             TEXT NOT NULL,
            dimension         TEXT NOT NULL,
            code              TEXT NOT NULL,
            description       TEXT NOT NULL,
            amount            REAL,
            keep              BOOLEAN NOT NULL DEFAULT 1,
            UNIQUE(document_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_rows_document ON allocation_rows(document_id);
        CREATE INDEX IF NOT EXISTS idx_rows_section ON allocation_rows(section_id);
        CREATE INDEX IF NOT EXISTS idx_rows_dimension ON allocation_rows(dimension);
        ",
    )?;
    Ok(())
}

// ── Ingest ──

pub struct DocumentRow<'a> {
    pub source: &'a str,
    pub extractor: Option<&'a str>,
    pub error: Option<&'a str>,
    pub char_count: Option<usize>,
}

impl DocumentRow<'_> {
    fn status(&self) -> &'static str {
        if self.error.is_some() {
            "failed"
        } else {
            "parsed"
        }
    }
}

/// Upsert one document and replace its rows. Returns the document id.
///
/// A failed document keeps its `documents` entry with the error and loses any
/// rows stored by an earlier successful run.
pub fn save_document(conn: &Connection, doc: &DocumentRow<'_>, records: &[RowRecord]) -> Result<i64> {
    let tx = conn.unchecked_transaction()?;
    let document_id: i64 = tx.query_row(
        "INSERT INTO documents (source, extractor, status, error, char_count)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(source) DO UPDATE SET
             extractor = excluded.extractor,
             status = excluded.status,
             error = excluded.error,
             char_count = excluded.char_count,
             parsed_at = datetime('now')
         RETURNING id",
        rusqlite::params![doc.source, doc.extractor, doc.status(), doc.error, doc.char_count],
        |row| row.get(0),
    )?;

    tx.execute("DELETE FROM allocation_rows WHERE document_id = ?1", [document_id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO allocation_rows
             (document_id, position, section_id, priority, objective, funding_programme,
              scope, dimension, code, description, amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for (position, r) in records.iter().enumerate() {
            stmt.execute(rusqlite::params![
                document_id, position, r.section_id, r.priority, r.objective,
                r.funding_programme, r.scope, r.dimension_label, r.code, r.description,
                r.amount_or_none(),
            ])?;
        }
    }
    tx.commit()?;
    Ok(document_id)
}

// ── Overview ──

pub struct StoredRow {
    pub source: String,
    pub section_id: String,
    pub dimension: String,
    pub code: String,
    pub description: String,
    pub amount: Option<f64>,
    pub keep: bool,
}

/// Stored rows in document order. `dimension` is a literal, case-sensitive
/// prefix, so "Dimension 1" also finds "Dimension 1 – Interventionsbereich".
pub fn fetch_rows(
    conn: &Connection,
    section: Option<&str>,
    dimension: Option<&str>,
    limit: usize,
) -> Result<Vec<StoredRow>> {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(s) = section {
        conditions.push(format!("r.section_id = ?{}", params.len() + 1));
        params.push(Box::new(s.to_string()));
    }
    if let Some(d) = dimension {
        let n = params.len() + 1;
        conditions.push(format!("substr(r.dimension, 1, length(?{n})) = ?{n}"));
        params.push(Box::new(d.to_string()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT d.source, r.section_id, r.dimension, r.code, r.description, r.amount, r.keep
         FROM allocation_rows r
         JOIN documents d ON d.id = r.document_id{}
         ORDER BY d.source, r.position
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(StoredRow {
                source: row.get(0)?,
                section_id: row.get(1)?,
                dimension: row.get(2)?,
                code: row.get(3)?,
                description: row.get(4)?,
                amount: row.get(5)?,
                keep: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub failed: usize,
    pub rows: usize,
    pub unparsed_amounts: usize,
    pub kept: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let failed: usize = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE status = 'failed'",
        [],
        |r| r.get(0),
    )?;
    let rows: usize = conn.query_row("SELECT COUNT(*) FROM allocation_rows", [], |r| r.get(0))?;
    let unparsed_amounts: usize = conn.query_row(
        "SELECT COUNT(*) FROM allocation_rows WHERE amount IS NULL",
        [],
        |r| r.get(0),
    )?;
    let kept: usize =
        conn.query_row("SELECT COUNT(*) FROM allocation_rows WHERE keep = 1", [], |r| r.get(0))?;
    Ok(Stats {
        documents,
        failed,
        rows,
        unparsed_amounts,
        kept,
    })
}

// 🗄️ Run Ledger - SQLite history of overlap runs
//
// Every run appends one row to `runs` plus one `run_issues` row per report
// row that carried issues. Append-only; nothing here feeds back into matching.

use crate::error::Result;
use crate::report::OverlapReport;
use crate::summary::RunSummary;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub roster_source: String,
    pub change_source: String,
    pub roster_sha256: String,
    pub report_sha256: String,
    pub total_records: i64,
    pub excluded_records: i64,
    pub duplicate_adds: i64,
    pub terms_without_match: i64,
}

impl RunEntry {
    pub fn new(summary: &RunSummary, roster_sha256: &str, report_sha256: &str) -> Self {
        RunEntry {
            run_id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            roster_source: summary.roster_source.clone(),
            change_source: summary.change_source.clone(),
            roster_sha256: roster_sha256.to_string(),
            report_sha256: report_sha256.to_string(),
            total_records: summary.total_records as i64,
            excluded_records: summary.excluded_records as i64,
            duplicate_adds: summary.adds_already_in_roster as i64,
            terms_without_match: summary.terms_not_in_roster as i64,
        }
    }
}

pub fn open_ledger(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_ledger(&conn)?;
    Ok(conn)
}

pub fn setup_ledger(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            recorded_at TEXT NOT NULL,
            roster_source TEXT NOT NULL,
            change_source TEXT NOT NULL,
            roster_sha256 TEXT NOT NULL,
            report_sha256 TEXT NOT NULL,
            total_records INTEGER NOT NULL,
            excluded_records INTEGER NOT NULL,
            duplicate_adds INTEGER NOT NULL,
            terms_without_match INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS run_issues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            issues TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_run_issues_run ON run_issues(run_id)",
        [],
    )?;

    Ok(())
}

/// Append a run and its flagged rows in one transaction.
pub fn record_run(conn: &mut Connection, entry: &RunEntry, report: &OverlapReport) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO runs (
            run_id, recorded_at, roster_source, change_source, roster_sha256,
            report_sha256, total_records, excluded_records, duplicate_adds, terms_without_match
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.run_id,
            entry.recorded_at.to_rfc3339(),
            entry.roster_source,
            entry.change_source,
            entry.roster_sha256,
            entry.report_sha256,
            entry.total_records,
            entry.excluded_records,
            entry.duplicate_adds,
            entry.terms_without_match,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO run_issues (run_id, position, issues) VALUES (?1, ?2, ?3)",
        )?;
        for row in report.rows.iter().filter(|r| !r.issues.is_empty()) {
            stmt.execute(params![
                entry.run_id,
                row.position as i64,
                row.issues.join(&report.separator),
            ])?;
        }
    }

    tx.commit()?;
    log::debug!("recorded run {} in ledger", entry.run_id);
    Ok(())
}

/// Most recent runs first.
pub fn list_runs(conn: &Connection, limit: usize) -> Result<Vec<RunEntry>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, recorded_at, roster_source, change_source, roster_sha256,
                report_sha256, total_records, excluded_records, duplicate_adds, terms_without_match
         FROM runs ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        let recorded_at: String = row.get(1)?;
        let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(RunEntry {
            run_id: row.get(0)?,
            recorded_at,
            roster_source: row.get(2)?,
            change_source: row.get(3)?,
            roster_sha256: row.get(4)?,
            report_sha256: row.get(5)?,
            total_records: row.get(6)?,
            excluded_records: row.get(7)?,
            duplicate_adds: row.get(8)?,
            terms_without_match: row.get(9)?,
        })
    })?;

    let mut runs = Vec::new();
    for run in rows {
        runs.push(run?);
    }
    Ok(runs)
}

/// (position, serialized issues) for every flagged row of a run
pub fn issues_for_run(conn: &Connection, run_id: &str) -> Result<Vec<(usize, String)>> {
    let mut stmt = conn.prepare(
        "SELECT position, issues FROM run_issues WHERE run_id = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map(params![run_id], |row| {
        let position: i64 = row.get(0)?;
        Ok((position as usize, row.get::<_, String>(1)?))
    })?;

    let mut issues = Vec::new();
    for row in rows {
        issues.push(row?);
    }
    Ok(issues)
}

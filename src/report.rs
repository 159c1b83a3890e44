// 📄 Report Assembler - original row + flags + issues, in input order
//
// Passthrough cells are copied byte-for-byte. Columns the engine owns
// (the four flags + ISSUES) are dropped from the input before appending, so
// re-checking an old report does not duplicate them.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::issues::IssueSet;
use crate::matcher::MatchFlags;
use crate::records::ChangeRecord;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

pub const ISSUES_COLUMN: &str = "ISSUES";

// ============================================================================
// REPORT ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// 1-based position in the change batch
    pub position: usize,

    /// Passthrough cells, verbatim
    pub fields: Vec<String>,

    /// None when the record was excluded from matching
    pub flags: Option<MatchFlags>,

    pub issues: IssueSet,
}

impl ReportRow {
    pub fn is_excluded(&self) -> bool {
        self.flags.is_none()
    }

    fn to_record(&self, separator: &str) -> Vec<String> {
        let mut record = self.fields.clone();
        match self.flags {
            Some(flags) => record.extend(flags.as_array().iter().map(|f| render_bool(*f))),
            None => record.extend(MatchFlags::COLUMNS.iter().map(|_| String::new())),
        }
        record.push(self.issues.join(separator));
        record
    }
}

/// Matches the True/False spelling reviewers already filter on
fn render_bool(value: bool) -> String {
    let rendered = if value { "True" } else { "False" };
    rendered.to_string()
}

// ============================================================================
// ASSEMBLER
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReportAssembler {
    passthrough: Vec<usize>,
    headers: Vec<String>,
    separator: String,
}

impl ReportAssembler {
    pub fn new(input_headers: &[String], config: &EngineConfig) -> Self {
        let is_engine_column =
            |h: &str| h == ISSUES_COLUMN || MatchFlags::COLUMNS.contains(&h);

        let passthrough: Vec<usize> = input_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !is_engine_column(h.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut headers: Vec<String> = passthrough
            .iter()
            .map(|&i| input_headers[i].clone())
            .collect();
        headers.extend(MatchFlags::COLUMNS.iter().map(|c| c.to_string()));
        headers.push(ISSUES_COLUMN.to_string());

        ReportAssembler {
            passthrough,
            headers,
            separator: config.issue_separator.clone(),
        }
    }

    /// Output header row
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn assemble(&self, change: &ChangeRecord<'_>, flags: MatchFlags, issues: IssueSet) -> ReportRow {
        ReportRow {
            position: change.position,
            fields: self.passthrough_cells(change.fields),
            flags: Some(flags),
            issues,
        }
    }

    /// Row for a record that never reached the matcher.
    pub fn assemble_excluded(&self, position: usize, fields: &[String], issues: IssueSet) -> ReportRow {
        ReportRow {
            position,
            fields: self.passthrough_cells(fields),
            flags: None,
            issues,
        }
    }

    fn passthrough_cells(&self, fields: &[String]) -> Vec<String> {
        self.passthrough
            .iter()
            .map(|&i| fields.get(i).cloned().unwrap_or_default())
            .collect()
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }
}

// ============================================================================
// OVERLAP REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapReport {
    pub headers: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub separator: String,
}

impl OverlapReport {
    pub fn new(assembler: &ReportAssembler, rows: Vec<ReportRow>) -> Self {
        OverlapReport {
            headers: assembler.headers().to_vec(),
            rows,
            separator: assembler.separator().to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row.to_record(&self.separator))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(buf)
    }

    /// Writes the CSV and returns its SHA-256 fingerprint.
    pub fn save(&self, path: &Path) -> Result<String> {
        let bytes = self.to_csv_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &bytes)?;
        Ok(sha256_hex(&bytes))
    }

    /// SHA-256 of the CSV rendering; equal for byte-identical reports.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(sha256_hex(&self.to_csv_bytes()?))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

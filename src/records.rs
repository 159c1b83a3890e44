// 📋 Typed records + CSV loading
//
// ChangeBatch keeps every cell verbatim (the report must echo them untouched);
// only the key columns are parsed into typed ChangeRecords.

use crate::config::ROSTER_KEY_FIELDS;
use crate::error::{OverlapError, Result};
use crate::identifier::{Identifier, IdentifierKind, KeyNormalizer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// ACTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "TERM")]
    Term,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Add => "ADD",
            Action::Term => "TERM",
        }
    }
}

impl FromStr for Action {
    type Err = OverlapError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ADD" => Ok(Action::Add),
            "TERM" => Ok(Action::Term),
            _ => Err(OverlapError::UnknownAction {
                raw: raw.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ROSTER
// ============================================================================

/// Roster row as it comes off disk, before normalization.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawRosterRecord {
    pub provider_npi: String,
    pub tax_id: String,
    pub contract_id: String,
}

impl RawRosterRecord {
    pub fn new(
        provider_npi: impl Into<String>,
        tax_id: impl Into<String>,
        contract_id: impl Into<String>,
    ) -> Self {
        RawRosterRecord {
            provider_npi: provider_npi.into(),
            tax_id: tax_id.into(),
            contract_id: contract_id.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.provider_npi.trim().is_empty()
            && self.tax_id.trim().is_empty()
            && self.contract_id.trim().is_empty()
    }

    pub fn normalize(&self, normalizer: &KeyNormalizer) -> Result<RosterRecord> {
        Ok(RosterRecord {
            npi: normalizer.normalize(&self.provider_npi, IdentifierKind::Npi)?,
            tax_id: normalizer.normalize(&self.tax_id, IdentifierKind::TaxId)?,
            contract_id: self.contract_id.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RosterRecord {
    pub npi: Identifier,
    pub tax_id: Identifier,
    pub contract_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct RosterBatch {
    pub source_name: String,
    pub records: Vec<RawRosterRecord>,
}

impl RosterBatch {
    pub fn new(source_name: impl Into<String>, records: Vec<RawRosterRecord>) -> Self {
        RosterBatch {
            source_name: source_name.into(),
            records,
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(path.display().to_string(), file)
    }

    /// Reads `provider_npi`, `tax_id`, `contract_id` by header; other columns
    /// are ignored. Rows with all three keys blank are skipped.
    pub fn from_reader<R: Read>(source_name: impl Into<String>, reader: R) -> Result<Self> {
        let source_name = source_name.into();
        let mut rdr = csv::ReaderBuilder::new().from_reader(reader);

        let headers = trimmed_headers(&mut rdr)?;
        rdr.set_headers(headers.iter().collect());
        check_columns(&source_name, &headers, ROSTER_KEY_FIELDS.iter().copied())?;

        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: RawRosterRecord = result?;
            if !record.is_blank() {
                records.push(record);
            }
        }

        Ok(RosterBatch {
            source_name,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// CHANGE BATCH
// ============================================================================

/// Sort key applied when several change files are aggregated
pub const AGGREGATE_SORT_COLUMNS: [&str; 3] = ["contract_id", "action", "provider_npi"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ChangeBatch {
    pub fn new(
        source_name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        ChangeBatch {
            source_name: source_name.into(),
            headers,
            rows,
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(path.display().to_string(), file)
    }

    /// Ragged rows are kept: short rows read as blank trailing cells, extra
    /// cells past the header are ignored.
    pub fn from_reader<R: Read>(source_name: impl Into<String>, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = trimmed_headers(&mut rdr)?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(ChangeBatch {
            source_name: source_name.into(),
            headers,
            rows,
        })
    }

    /// Merge several change files under the union of their headers and sort
    /// by contract, action, NPI. The sort is stable, so ties keep file order.
    pub fn concat(batches: Vec<ChangeBatch>) -> ChangeBatch {
        let mut headers: Vec<String> = Vec::new();
        for batch in &batches {
            for header in &batch.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let source_name = batches
            .iter()
            .map(|b| b.source_name.as_str())
            .collect::<Vec<_>>()
            .join("+");

        let mut rows = Vec::new();
        for batch in &batches {
            let mapping: Vec<Option<usize>> =
                headers.iter().map(|h| batch.column(h)).collect();
            for row in &batch.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                        .collect::<Vec<String>>(),
                );
            }
        }

        let sort_columns: Vec<usize> = AGGREGATE_SORT_COLUMNS
            .iter()
            .filter_map(|c| headers.iter().position(|h| h == c))
            .collect();
        rows.sort_by(|a, b| {
            let key_a = sort_columns.iter().map(|&i| &a[i]);
            let key_b = sort_columns.iter().map(|&i| &b[i]);
            key_a.cmp(key_b)
        });

        ChangeBatch {
            source_name,
            headers,
            rows,
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn require_columns(&self, required: &BTreeSet<String>) -> Result<()> {
        check_columns(&self.source_name, &self.headers, required.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve the key column positions once per batch.
    pub fn key_columns(&self) -> Result<ChangeColumns> {
        let lookup = |name: &str| {
            self.column(name).ok_or_else(|| OverlapError::MissingColumns {
                source_name: self.source_name.clone(),
                columns: vec![name.to_string()],
            })
        };

        Ok(ChangeColumns {
            npi: lookup("provider_npi")?,
            tax_id: lookup("tax_id")?,
            contract_id: lookup("contract_id")?,
            action: lookup("action")?,
            first_name: self.column("first_name"),
            last_name: self.column("last_name"),
            effective_date: self.column("effective_date"),
        })
    }
}

/// Column positions inside a `ChangeBatch` row.
#[derive(Debug, Clone, Copy)]
pub struct ChangeColumns {
    pub npi: usize,
    pub tax_id: usize,
    pub contract_id: usize,
    pub action: usize,
    pub first_name: Option<usize>,
    pub last_name: Option<usize>,
    pub effective_date: Option<usize>,
}

impl ChangeColumns {
    pub fn cell<'a>(&self, fields: &'a [String], idx: usize) -> &'a str {
        fields.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn optional_cell<'a>(&self, fields: &'a [String], idx: Option<usize>) -> &'a str {
        idx.map(|i| self.cell(fields, i)).unwrap_or("")
    }
}

// ============================================================================
// CHANGE RECORD
// ============================================================================

/// One normalized change row. Borrows the verbatim cells from its batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord<'a> {
    /// 1-based data row position in the change batch
    pub position: usize,
    pub npi: Identifier,
    pub tax_id: Identifier,
    pub contract_id: String,
    pub action: Action,
    pub fields: &'a [String],
}

impl<'a> ChangeRecord<'a> {
    /// Normalize one raw row. Every key problem is reported, not just the
    /// first, so the report can list them all.
    pub fn from_row(
        position: usize,
        fields: &'a [String],
        columns: &ChangeColumns,
        normalizer: &KeyNormalizer,
    ) -> std::result::Result<Self, Vec<OverlapError>> {
        let npi = normalizer.normalize(columns.cell(fields, columns.npi), IdentifierKind::Npi);
        let tax_id =
            normalizer.normalize(columns.cell(fields, columns.tax_id), IdentifierKind::TaxId);
        let action = columns.cell(fields, columns.action).parse::<Action>();

        match (npi, tax_id, action) {
            (Ok(npi), Ok(tax_id), Ok(action)) => Ok(ChangeRecord {
                position,
                npi,
                tax_id,
                contract_id: columns.cell(fields, columns.contract_id).trim().to_string(),
                action,
                fields,
            }),
            (npi, tax_id, action) => Err([npi.err(), tax_id.err(), action.err()]
                .into_iter()
                .flatten()
                .collect()),
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn trimmed_headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<Vec<String>> {
    Ok(rdr.headers()?.iter().map(|h| h.trim().to_string()).collect())
}

fn check_columns<'a>(
    source_name: &str,
    headers: &[String],
    required: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let missing: Vec<String> = required
        .filter(|col| !headers.iter().any(|h| h == col))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OverlapError::MissingColumns {
            source_name: source_name.to_string(),
            columns: missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANGES: &str = "\
contract_id,action,effective_date,provider_npi,tax_id,first_name,last_name,note
C010,add,2025-10-01,1234567890,12-3456789,John,Doe,
C001, TERM ,2025-10-15,0987654321,987654321,Jane,Smith,left practice
";

    #[test]
    fn test_action_parse() {
        assert_eq!("ADD".parse::<Action>().unwrap(), Action::Add);
        assert_eq!(" term ".parse::<Action>().unwrap(), Action::Term);
        assert!(matches!(
            "add & term".parse::<Action>(),
            Err(OverlapError::UnknownAction { .. })
        ));
        assert!("".parse::<Action>().is_err());
    }

    #[test]
    fn test_change_batch_keeps_cells_verbatim() {
        let batch = ChangeBatch::from_reader("changes.csv", CHANGES.as_bytes()).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.headers[0], "contract_id");
        assert_eq!(batch.rows[1][1], " TERM ");
        assert_eq!(batch.rows[0][4], "12-3456789");
        assert_eq!(batch.rows[1][7], "left practice");
    }

    #[test]
    fn test_require_columns() {
        let batch = ChangeBatch::from_reader("changes.csv", CHANGES.as_bytes()).unwrap();

        let mut required: BTreeSet<String> =
            ["provider_npi", "tax_id"].iter().map(|s| s.to_string()).collect();
        assert!(batch.require_columns(&required).is_ok());

        required.insert("specialty_1".to_string());
        match batch.require_columns(&required) {
            Err(OverlapError::MissingColumns { columns, .. }) => {
                assert_eq!(columns, vec!["specialty_1".to_string()]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_change_record_from_row() {
        let batch = ChangeBatch::from_reader("changes.csv", CHANGES.as_bytes()).unwrap();
        let columns = batch.key_columns().unwrap();
        let normalizer = KeyNormalizer::default();

        let record = ChangeRecord::from_row(2, &batch.rows[1], &columns, &normalizer).unwrap();
        assert_eq!(record.action, Action::Term);
        assert_eq!(record.npi.as_str(), "0987654321");
        assert_eq!(record.contract_id, "C001");
        assert_eq!(record.fields[1], " TERM ");
    }

    #[test]
    fn test_change_batch_accepts_ragged_rows() {
        let csv = "\
contract_id,action,effective_date,provider_npi,tax_id,first_name,last_name,note
C010,ADD,2025-10-01,1234567890,123456789,John,Doe,new hire
C010,ADD,2025-10-01,2222222222,222222222,Ann,Lee
C010,TERM,2025-10-15,3333333333
C010,TERM,2025-10-15,4444444444,444444444,Bo,Ray,,extra
";
        let batch = ChangeBatch::from_reader("changes.csv", csv.as_bytes()).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.rows[1].len(), 7);

        let columns = batch.key_columns().unwrap();
        let normalizer = KeyNormalizer::default();

        // missing trailing note is fine
        assert!(ChangeRecord::from_row(2, &batch.rows[1], &columns, &normalizer).is_ok());
        assert!(ChangeRecord::from_row(4, &batch.rows[3], &columns, &normalizer).is_ok());

        // row cut off before tax_id
        let errors =
            ChangeRecord::from_row(3, &batch.rows[2], &columns, &normalizer).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [OverlapError::InvalidIdentifier { kind: IdentifierKind::TaxId, .. }]
        ));
    }

    #[test]
    fn test_change_record_collects_every_error() {
        let headers: Vec<String> = ["contract_id", "action", "provider_npi", "tax_id"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row: Vec<String> = ["C010", "MOVE", "abc", ""].iter().map(|s| s.to_string()).collect();
        let batch = ChangeBatch::new("t", headers, vec![row]);
        let columns = batch.key_columns().unwrap();

        let errors =
            ChangeRecord::from_row(1, &batch.rows[0], &columns, &KeyNormalizer::default())
                .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.is_record_level()));
    }

    #[test]
    fn test_roster_batch_ignores_extra_columns_and_blank_rows() {
        let csv = "\
Provider_NPI_Unused,provider_npi,tax_id,contract_id,full_name
x,1234567890,123456789,C010,John Doe
,,,,
y,5555555555,555555555,C001,Jane Roe
";
        let roster = RosterBatch::from_reader("roster.csv", csv.as_bytes()).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.records[1].contract_id, "C001");
    }

    #[test]
    fn test_roster_batch_missing_column() {
        let csv = "provider_npi,contract_id\n1234567890,C010\n";
        let err = RosterBatch::from_reader("roster.csv", csv.as_bytes()).unwrap_err();
        assert!(matches!(err, OverlapError::MissingColumns { ref columns, .. } if columns == &vec!["tax_id".to_string()]));
    }

    #[test]
    fn test_roster_headers_are_trimmed() {
        let csv = " provider_npi , tax_id ,contract_id\n1234567890,123456789,C010\n";
        let roster = RosterBatch::from_reader("roster.csv", csv.as_bytes()).unwrap();
        assert_eq!(roster.records[0].provider_npi, "1234567890");
    }

    #[test]
    fn test_concat_unions_headers_and_sorts() {
        let a = ChangeBatch::from_reader(
            "a.csv",
            "contract_id,action,provider_npi,tax_id,note\nC010,TERM,2222222222,222222222,n1\nC001,ADD,3333333333,333333333,n2\n"
                .as_bytes(),
        )
        .unwrap();
        let b = ChangeBatch::from_reader(
            "b.csv",
            "provider_npi,tax_id,contract_id,action,tag\n1111111111,111111111,C010,ADD,t1\n"
                .as_bytes(),
        )
        .unwrap();

        let merged = ChangeBatch::concat(vec![a, b]);

        assert_eq!(merged.source_name, "a.csv+b.csv");
        assert_eq!(
            merged.headers,
            vec!["contract_id", "action", "provider_npi", "tax_id", "note", "tag"]
        );
        assert_eq!(merged.len(), 3);
        // C001/ADD < C010/ADD < C010/TERM
        assert_eq!(merged.rows[0][2], "3333333333");
        assert_eq!(merged.rows[1][2], "1111111111");
        assert_eq!(merged.rows[1][4], "");
        assert_eq!(merged.rows[1][5], "t1");
        assert_eq!(merged.rows[2][2], "2222222222");
    }
}

// 🚩 Issue Detector - business rules over {change record, match flags}
//
// Conflict rules (independent, a record may collect several issues):
//   ADD  + exact NPI/TIN/contract match  → DUPLICATE_ADD
//   TERM + NPI/TIN pair not on roster    → TERM_WITHOUT_MATCH
// Excluded records carry the tag of whatever kept them out of matching.
// Missing names only warn; identifiers are the load-bearing fields.

use crate::error::OverlapError;
use crate::identifier::IdentifierKind;
use crate::matcher::MatchFlags;
use crate::records::{Action, ChangeColumns, ChangeRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// ISSUE + SEVERITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Issue {
    DuplicateAdd,
    TermWithoutMatch,
    InvalidNpi,
    InvalidTaxId,
    UnknownAction,
    MissingName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Record could not be matched at all
    Warning,  // Record matched but looks wrong
}

impl Issue {
    pub fn tag(&self) -> &'static str {
        match self {
            Issue::DuplicateAdd => "DUPLICATE_ADD",
            Issue::TermWithoutMatch => "TERM_WITHOUT_MATCH",
            Issue::InvalidNpi => "INVALID_NPI",
            Issue::InvalidTaxId => "INVALID_TAX_ID",
            Issue::UnknownAction => "UNKNOWN_ACTION",
            Issue::MissingName => "MISSING_NAME",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Issue::InvalidNpi | Issue::InvalidTaxId | Issue::UnknownAction => Severity::Critical,
            Issue::DuplicateAdd | Issue::TermWithoutMatch | Issue::MissingName => {
                Severity::Warning
            }
        }
    }

    /// Map a per-record error to the tag shown in the report.
    pub fn from_error(error: &OverlapError) -> Option<Issue> {
        match error {
            OverlapError::InvalidIdentifier {
                kind: IdentifierKind::Npi,
                ..
            } => Some(Issue::InvalidNpi),
            OverlapError::InvalidIdentifier {
                kind: IdentifierKind::TaxId,
                ..
            } => Some(Issue::InvalidTaxId),
            OverlapError::UnknownAction { .. } => Some(Issue::UnknownAction),
            _ => None,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// ISSUE SET
// ============================================================================

/// Ordered so the serialized column is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IssueSet(BTreeSet<Issue>);

impl IssueSet {
    pub fn new() -> Self {
        IssueSet(BTreeSet::new())
    }

    pub fn insert(&mut self, issue: Issue) -> bool {
        self.0.insert(issue)
    }

    pub fn extend(&mut self, other: IssueSet) {
        self.0.extend(other.0);
    }

    pub fn contains(&self, issue: Issue) -> bool {
        self.0.contains(&issue)
    }

    pub fn iter(&self) -> impl Iterator<Item = Issue> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_critical(&self) -> bool {
        self.iter().any(|i| i.severity() == Severity::Critical)
    }

    pub fn join(&self, separator: &str) -> String {
        self.iter().map(|i| i.tag()).collect::<Vec<_>>().join(separator)
    }
}

impl FromIterator<Issue> for IssueSet {
    fn from_iter<T: IntoIterator<Item = Issue>>(iter: T) -> Self {
        IssueSet(iter.into_iter().collect())
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct IssueDetector;

impl IssueDetector {
    pub fn new() -> Self {
        IssueDetector
    }

    /// Conflict rules. Absence of an issue only means neither pattern fired.
    pub fn detect(&self, change: &ChangeRecord<'_>, flags: &MatchFlags) -> IssueSet {
        let mut issues = IssueSet::new();

        if change.action == Action::Add && flags.npi_tin_cid_match {
            issues.insert(Issue::DuplicateAdd);
        }

        if change.action == Action::Term && !flags.npi_and_tin_in_roster {
            issues.insert(Issue::TermWithoutMatch);
        }

        issues
    }

    /// Tags for a record that never reached the matcher. Fatal errors have
    /// no report tag and are skipped.
    pub fn from_errors(&self, errors: &[OverlapError]) -> IssueSet {
        errors
            .iter()
            .filter(|e| e.is_record_level())
            .filter_map(Issue::from_error)
            .collect()
    }

    /// Warning-only check; never excludes a record.
    pub fn name_warnings(&self, fields: &[String], columns: &ChangeColumns) -> IssueSet {
        // Only columns the batch actually carries are checked
        let missing = [columns.first_name, columns.last_name]
            .into_iter()
            .flatten()
            .any(|idx| is_blank(columns.cell(fields, idx)));

        let mut issues = IssueSet::new();
        if missing {
            issues.insert(Issue::MissingName);
        }
        issues
    }
}

/// Empty, or a spreadsheet null marker
fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || ["nan", "none", "null"].contains(&v.to_lowercase().as_str())
}

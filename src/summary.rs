// 📊 Run summary - counts, breakdowns, per-record errors
//
// Rendered as summary.txt for reviewers and as JSON for tooling.

use crate::identifier::Identifier;
use crate::issues::{Issue, IssueSet};
use crate::matcher::MatchFlags;
use crate::records::{Action, ChangeColumns};
use crate::roster_index::IndexStats;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// PER-RECORD OUTCOME (engine → summary)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RecordOutcome {
    pub position: usize,
    pub raw_action: String,
    pub contract_id: String,
    pub effective_date: String,
    pub action: Option<Action>,
    pub npi: Option<Identifier>,
    pub tax_id: Option<Identifier>,
    pub flags: Option<MatchFlags>,
    pub issues: IssueSet,
    pub errors: Vec<String>,
}

impl RecordOutcome {
    pub fn from_cells(position: usize, fields: &[String], columns: &ChangeColumns) -> Self {
        RecordOutcome {
            position,
            raw_action: columns.cell(fields, columns.action).trim().to_uppercase(),
            contract_id: columns.cell(fields, columns.contract_id).trim().to_string(),
            effective_date: columns
                .optional_cell(fields, columns.effective_date)
                .trim()
                .to_string(),
            ..RecordOutcome::default()
        }
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FlagCounts {
    pub npi_in_roster: usize,
    pub tin_in_roster: usize,
    pub npi_and_tin_in_roster: usize,
    pub npi_tin_cid_match: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActionBreakdown {
    pub total: usize,
    pub triple_matches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub roster_source: String,
    pub change_source: String,
    pub generated_at: DateTime<Utc>,
    pub roster: IndexStats,

    pub total_records: usize,
    pub matched_records: usize,
    pub excluded_records: usize,
    pub unique_npis: usize,
    pub unique_tax_ids: usize,
    pub unique_contracts: usize,

    pub flags: FlagCounts,
    pub by_action: BTreeMap<String, ActionBreakdown>,
    pub by_contract: BTreeMap<String, usize>,
    pub issue_counts: BTreeMap<String, usize>,
    pub adds_already_in_roster: usize,
    pub terms_not_in_roster: usize,
    pub effective_dates: Option<DateRange>,
    pub record_errors: Vec<RecordError>,

    /// SHA-256 of the written report, filled in once it is saved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_sha256: Option<String>,
}

impl RunSummary {
    pub fn build(
        roster_source: &str,
        change_source: &str,
        roster: IndexStats,
        outcomes: &[RecordOutcome],
    ) -> Self {
        let mut flags = FlagCounts::default();
        let mut by_action: BTreeMap<String, ActionBreakdown> = BTreeMap::new();
        let mut by_contract: BTreeMap<String, usize> = BTreeMap::new();
        let mut issue_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut npis: HashSet<&Identifier> = HashSet::new();
        let mut tax_ids: HashSet<&Identifier> = HashSet::new();
        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut record_errors = Vec::new();

        for outcome in outcomes {
            let action_key = match outcome.action {
                Some(action) => action.as_str().to_string(),
                None => outcome.raw_action.clone(),
            };
            let breakdown = by_action.entry(action_key).or_default();
            breakdown.total += 1;

            if let Some(f) = outcome.flags {
                flags.npi_in_roster += f.npi_in_roster as usize;
                flags.tin_in_roster += f.tin_in_roster as usize;
                flags.npi_and_tin_in_roster += f.npi_and_tin_in_roster as usize;
                flags.npi_tin_cid_match += f.npi_tin_cid_match as usize;
                breakdown.triple_matches += f.npi_tin_cid_match as usize;
            }

            *by_contract.entry(outcome.contract_id.clone()).or_insert(0) += 1;
            for issue in outcome.issues.iter() {
                *issue_counts.entry(issue.tag().to_string()).or_insert(0) += 1;
            }

            npis.extend(outcome.npi.as_ref());
            tax_ids.extend(outcome.tax_id.as_ref());
            dates.extend(parse_date(&outcome.effective_date));

            record_errors.extend(outcome.errors.iter().map(|message| RecordError {
                position: outcome.position,
                message: message.clone(),
            }));
        }

        let count = |issue: Issue| issue_counts.get(issue.tag()).copied().unwrap_or(0);
        let adds_already_in_roster = count(Issue::DuplicateAdd);
        let terms_not_in_roster = count(Issue::TermWithoutMatch);

        let effective_dates = match (dates.iter().min(), dates.iter().max()) {
            (Some(earliest), Some(latest)) => Some(DateRange {
                earliest: *earliest,
                latest: *latest,
            }),
            _ => None,
        };

        let excluded_records = outcomes.iter().filter(|o| o.flags.is_none()).count();

        RunSummary {
            roster_source: roster_source.to_string(),
            change_source: change_source.to_string(),
            generated_at: Utc::now(),
            roster,
            total_records: outcomes.len(),
            matched_records: outcomes.len() - excluded_records,
            excluded_records,
            unique_npis: npis.len(),
            unique_tax_ids: tax_ids.len(),
            unique_contracts: by_contract.len(),
            flags,
            by_action,
            by_contract,
            issue_counts,
            adds_already_in_roster,
            terms_not_in_roster,
            effective_dates,
            record_errors,
            report_sha256: None,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        self.adds_already_in_roster > 0 || self.terms_not_in_roster > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text summary for summary.txt
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(80);
        let pct = |n: usize| {
            if self.total_records == 0 {
                0.0
            } else {
                n as f64 / self.total_records as f64 * 100.0
            }
        };

        let mut lines = vec![
            rule.clone(),
            "ROSTER OVERLAP SUMMARY".to_string(),
            format!("Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("Roster: {} ({} rows)", self.roster_source, self.roster.rows),
            format!("Changes: {}", self.change_source),
            rule.clone(),
            String::new(),
            format!("Total Records: {}", self.total_records),
            format!("Checked: {}", self.matched_records),
            format!("Excluded: {}", self.excluded_records),
            format!("Unique Providers (NPI): {}", self.unique_npis),
            format!("Unique Tax IDs: {}", self.unique_tax_ids),
            format!("Unique Contracts: {}", self.unique_contracts),
            String::new(),
            "ACTION BREAKDOWN:".to_string(),
        ];

        for (action, breakdown) in &self.by_action {
            lines.push(format!(
                "  {}: {} ({:.1}%), {} exact matches",
                action,
                breakdown.total,
                pct(breakdown.total),
                breakdown.triple_matches
            ));
        }
        lines.push(String::new());

        lines.push("CONTRACT BREAKDOWN:".to_string());
        for (contract, count) in &self.by_contract {
            lines.push(format!("  {}: {}", contract, count));
        }
        lines.push(String::new());

        lines.push("OVERLAP ANALYSIS:".to_string());
        let flag_lines = [
            ("NPI in roster", self.flags.npi_in_roster),
            ("TIN in roster", self.flags.tin_in_roster),
            ("NPI+TIN in roster", self.flags.npi_and_tin_in_roster),
            ("NPI+TIN+CID match", self.flags.npi_tin_cid_match),
        ];
        for (label, n) in flag_lines {
            lines.push(format!("  {}: {} ({:.1}%)", label, n, pct(n)));
        }
        if self.adds_already_in_roster > 0 {
            lines.push(format!(
                "  ⚠ WARNING: {} ADD records already exist in roster",
                self.adds_already_in_roster
            ));
        }
        if self.terms_not_in_roster > 0 {
            lines.push(format!(
                "  ⚠ WARNING: {} TERM records not found in roster",
                self.terms_not_in_roster
            ));
        }
        lines.push(String::new());

        if !self.issue_counts.is_empty() {
            lines.push("ISSUES:".to_string());
            for (tag, count) in &self.issue_counts {
                lines.push(format!("  {}: {}", tag, count));
            }
            lines.push(String::new());
        }

        if let Some(range) = self.effective_dates {
            lines.push("EFFECTIVE DATE RANGE:".to_string());
            lines.push(format!("  Earliest: {}", range.earliest.format("%Y-%m-%d")));
            lines.push(format!("  Latest: {}", range.latest.format("%Y-%m-%d")));
            lines.push(String::new());
        }

        if !self.record_errors.is_empty() {
            lines.push(format!("RECORD ERRORS ({}):", self.record_errors.len()));
            for error in &self.record_errors {
                lines.push(format!("  row {}: {}", error.position, error.message));
            }
            lines.push(String::new());
        }

        if let Some(digest) = &self.report_sha256 {
            lines.push(format!("Report SHA-256: {}", digest));
        }
        lines.push(rule);

        lines.join("\n")
    }
}

/// Accepts YYYY-MM-DD and MM/DD/YYYY
fn parse_date(date_str: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%m/%d/%Y") {
        return Some(date);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{IdentifierKind, KeyNormalizer};

    fn outcome(
        position: usize,
        action: Option<Action>,
        contract: &str,
        date: &str,
        flags: Option<MatchFlags>,
        issues: &[Issue],
    ) -> RecordOutcome {
        let n = KeyNormalizer::default();
        RecordOutcome {
            position,
            raw_action: action.map(|a| a.as_str().to_string()).unwrap_or_else(|| "MOVE".to_string()),
            contract_id: contract.to_string(),
            effective_date: date.to_string(),
            action,
            npi: flags.map(|_| n.normalize(&format!("{:010}", position), IdentifierKind::Npi).unwrap()),
            tax_id: flags.map(|_| n.normalize("123456789", IdentifierKind::TaxId).unwrap()),
            flags,
            issues: issues.iter().copied().collect(),
            errors: if flags.is_none() {
                vec!["unknown action \"MOVE\" (expected ADD or TERM)".to_string()]
            } else {
                Vec::new()
            },
        }
    }

    fn sample() -> RunSummary {
        let all = MatchFlags {
            npi_in_roster: true,
            tin_in_roster: true,
            npi_and_tin_in_roster: true,
            npi_tin_cid_match: true,
        };
        let outcomes = vec![
            outcome(1, Some(Action::Add), "C010", "2025-10-01", Some(all), &[Issue::DuplicateAdd]),
            outcome(2, Some(Action::Term), "C010", "10/15/2025", Some(MatchFlags::default()), &[Issue::TermWithoutMatch]),
            outcome(3, Some(Action::Add), "C001", "", Some(MatchFlags::default()), &[]),
            outcome(4, None, "C001", "not a date", None, &[Issue::UnknownAction]),
        ];
        RunSummary::build("roster.csv", "changes.csv", IndexStats::default(), &outcomes)
    }

    #[test]
    fn test_counts() {
        let summary = sample();

        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.matched_records, 3);
        assert_eq!(summary.excluded_records, 1);
        assert_eq!(summary.unique_npis, 3);
        assert_eq!(summary.unique_tax_ids, 1);
        assert_eq!(summary.unique_contracts, 2);
        assert_eq!(summary.flags.npi_tin_cid_match, 1);
        assert_eq!(summary.adds_already_in_roster, 1);
        assert_eq!(summary.terms_not_in_roster, 1);
        assert!(summary.has_conflicts());

        assert_eq!(summary.by_action["ADD"], ActionBreakdown { total: 2, triple_matches: 1 });
        assert_eq!(summary.by_action["MOVE"].total, 1);
        assert_eq!(summary.issue_counts["UNKNOWN_ACTION"], 1);
        assert_eq!(summary.record_errors[0].position, 4);
    }

    #[test]
    fn test_effective_date_range_mixes_formats() {
        let range = sample().effective_dates.unwrap();
        assert_eq!(range.earliest, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
        assert_eq!(range.latest, NaiveDate::from_ymd_opt(2025, 10, 15).unwrap());
    }

    #[test]
    fn test_render_text() {
        let mut summary = sample();
        summary.report_sha256 = Some("abc123".to_string());
        let text = summary.render_text();

        assert!(text.contains("Total Records: 4"));
        assert!(text.contains("  NPI+TIN+CID match: 1 (25.0%)"));
        assert!(text.contains("⚠ WARNING: 1 ADD records already exist in roster"));
        assert!(text.contains("⚠ WARNING: 1 TERM records not found in roster"));
        assert!(text.contains("  row 4: unknown action"));
        assert!(text.contains("Earliest: 2025-10-01"));
        assert!(text.contains("Report SHA-256: abc123"));
    }

    #[test]
    fn test_empty_batch() {
        let summary = RunSummary::build("r", "c", IndexStats::default(), &[]);

        assert_eq!(summary.total_records, 0);
        assert!(summary.effective_dates.is_none());
        assert!(!summary.has_conflicts());
        assert!(summary.render_text().contains("NPI in roster: 0 (0.0%)"));
    }

    #[test]
    fn test_json() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["total_records"], 4);
        assert_eq!(value["by_action"]["TERM"]["total"], 1);
        assert!(value.get("report_sha256").is_none());
    }
}

// ⚖️ Overlap Engine - roster + change batch → report
//
// load roster → build index → match/detect/assemble every change row → report
//
// The index is immutable once built, so rows are matched on the rayon pool.
// `collect` on an indexed parallel iterator keeps input order; no re-sort.

use crate::config::EngineConfig;
use crate::error::{OverlapError, Result};
use crate::identifier::KeyNormalizer;
use crate::issues::IssueDetector;
use crate::matcher::OverlapMatcher;
use crate::records::{ChangeBatch, ChangeColumns, ChangeRecord, RosterBatch};
use crate::report::{OverlapReport, ReportAssembler, ReportRow};
use crate::roster_index::RosterIndex;
use crate::summary::{RecordOutcome, RunSummary};
use rayon::prelude::*;
use std::time::Instant;

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct OverlapRun {
    pub report: OverlapReport,
    pub summary: RunSummary,
}

pub struct OverlapEngine {
    config: EngineConfig,
    normalizer: KeyNormalizer,
    matcher: OverlapMatcher,
    detector: IssueDetector,
}

impl OverlapEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(OverlapEngine {
            normalizer: KeyNormalizer::new(config.identifier_formats),
            config,
            matcher: OverlapMatcher::new(),
            detector: IssueDetector::new(),
        })
    }

    /// Build the roster index with this engine's normalizer.
    pub fn build_index(&self, roster: &RosterBatch) -> Result<RosterIndex> {
        RosterIndex::build(roster, &self.normalizer)
    }

    /// Full batch run. Fails only on fatal errors (malformed roster, missing
    /// columns); bad change rows are reported, never dropped.
    pub fn run(&self, roster: &RosterBatch, changes: &ChangeBatch) -> Result<OverlapRun> {
        changes.require_columns(&self.config.required_fields)?;
        let index = self.build_index(roster)?;
        self.run_with_index(&index, roster, changes)
    }

    pub fn run_with_index(
        &self,
        index: &RosterIndex,
        roster: &RosterBatch,
        changes: &ChangeBatch,
    ) -> Result<OverlapRun> {
        let started = Instant::now();
        let columns = changes.key_columns()?;
        let assembler = ReportAssembler::new(&changes.headers, &self.config);

        let evaluated: Vec<(ReportRow, RecordOutcome)> = if self.config.parallel {
            changes
                .rows
                .par_iter()
                .enumerate()
                .map(|(i, fields)| self.evaluate(i + 1, fields, &columns, index, &assembler))
                .collect()
        } else {
            changes
                .rows
                .iter()
                .enumerate()
                .map(|(i, fields)| self.evaluate(i + 1, fields, &columns, index, &assembler))
                .collect()
        };
        let (rows, outcomes): (Vec<ReportRow>, Vec<RecordOutcome>) = evaluated.into_iter().unzip();

        let summary = RunSummary::build(
            &roster.source_name,
            &changes.source_name,
            index.stats(),
            &outcomes,
        );
        let report = OverlapReport::new(&assembler, rows);

        log::info!(
            "checked {} change records against {} roster rows ({} excluded)",
            summary.total_records,
            summary.roster.rows,
            summary.excluded_records
        );
        log::debug!("overlap pass finished in {:?}", started.elapsed());

        Ok(OverlapRun { report, summary })
    }

    /// One change row through normalize → match → detect → assemble.
    fn evaluate(
        &self,
        position: usize,
        fields: &[String],
        columns: &ChangeColumns,
        index: &RosterIndex,
        assembler: &ReportAssembler,
    ) -> (ReportRow, RecordOutcome) {
        let mut outcome = RecordOutcome::from_cells(position, fields, columns);
        let warnings = self.detector.name_warnings(fields, columns);

        match ChangeRecord::from_row(position, fields, columns, &self.normalizer) {
            Ok(record) => {
                let flags = self.matcher.match_record(&record, index);
                let mut issues = self.detector.detect(&record, &flags);
                issues.extend(warnings);

                outcome.action = Some(record.action);
                outcome.npi = Some(record.npi.clone());
                outcome.tax_id = Some(record.tax_id.clone());
                outcome.flags = Some(flags);
                outcome.issues = issues.clone();

                (assembler.assemble(&record, flags, issues), outcome)
            }
            Err(errors) => {
                for error in &errors {
                    log::warn!("change record {} excluded: {}", position, error);
                }
                let mut issues = self.detector.from_errors(&errors);
                issues.extend(warnings);

                outcome.issues = issues.clone();
                outcome.errors = errors.iter().map(OverlapError::to_string).collect();

                (assembler.assemble_excluded(position, fields, issues), outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::Issue;
    use crate::records::RawRosterRecord;

    const HEADER: &str =
        "contract_id,action,effective_date,provider_npi,tax_id,first_name,last_name,note\n";

    fn changes(body: &str) -> ChangeBatch {
        ChangeBatch::from_reader("changes.csv", format!("{}{}", HEADER, body).as_bytes()).unwrap()
    }

    fn roster(rows: &[(&str, &str, &str)]) -> RosterBatch {
        RosterBatch::new(
            "roster.csv",
            rows.iter()
                .map(|(n, t, c)| RawRosterRecord::new(*n, *t, *c))
                .collect(),
        )
    }

    fn engine() -> OverlapEngine {
        OverlapEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_mixed_batch() {
        let roster = roster(&[
            ("1234567890", "123456789", "C010"),
            ("5555555555", "555555555", "C001"),
        ]);
        let batch = changes(
            "C010,ADD,2025-10-01,1234567890,123456789,John,Doe,\n\
             C010,TERM,2025-10-15,5555555555,555555555,Jane,Roe,\n\
             C010,TERM,2025-10-15,abc,555555555,Jim,Poe,\n\
             C010,ADD,2025-10-01,7777777777,777777777,,Lee,\n",
        );

        let run = engine().run(&roster, &batch).unwrap();
        let rows = &run.report.rows;

        assert_eq!(rows.len(), 4);
        assert!(rows[0].issues.contains(Issue::DuplicateAdd));
        // pair is on the roster under C001, so terminating it under C010 is not flagged
        assert!(rows[1].issues.is_empty());
        assert!(rows[2].is_excluded());
        assert!(rows[2].issues.contains(Issue::InvalidNpi));
        assert_eq!(rows[3].issues.iter().collect::<Vec<_>>(), vec![Issue::MissingName]);

        assert_eq!(run.summary.excluded_records, 1);
        assert_eq!(run.summary.record_errors.len(), 1);
        assert_eq!(run.summary.record_errors[0].position, 3);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let batch = ChangeBatch::from_reader(
            "changes.csv",
            "contract_id,action,provider_npi,tax_id\nC010,ADD,1234567890,123456789\n".as_bytes(),
        )
        .unwrap();

        let err = engine().run(&roster(&[]), &batch).unwrap_err();
        assert!(matches!(err, OverlapError::MissingColumns { .. }));
    }

    #[test]
    fn test_malformed_roster_aborts() {
        let batch = changes("C010,ADD,2025-10-01,1234567890,123456789,John,Doe,\n");
        let err = engine()
            .run(&roster(&[("1234567890", "1234567890", "C010")]), &batch)
            .unwrap_err();

        assert!(matches!(err, OverlapError::RosterLoad { position: 1, .. }));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let roster = roster(&[("1234567890", "123456789", "C010")]);
        let mut body = String::new();
        for i in 0..200 {
            let action = if i % 2 == 0 { "ADD" } else { "TERM" };
            let npi = if i % 3 == 0 { "1234567890".to_string() } else { format!("{:010}", 1_000_000_000u64 + i) };
            body.push_str(&format!("C010,{},2025-10-01,{},123456789,A,B,\n", action, npi));
        }
        let batch = changes(&body);

        let parallel = engine().run(&roster, &batch).unwrap();
        let sequential = OverlapEngine::new(EngineConfig::default().sequential())
            .unwrap()
            .run(&roster, &batch)
            .unwrap();

        assert_eq!(
            parallel.report.to_csv_bytes().unwrap(),
            sequential.report.to_csv_bytes().unwrap()
        );
        let positions: Vec<usize> = parallel.report.rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, (1..=200).collect::<Vec<_>>());
    }

    #[test]
    fn test_relaxed_required_fields() {
        let config = EngineConfig::default()
            .with_required_fields(["contract_id", "action", "provider_npi", "tax_id"]);
        let batch = ChangeBatch::from_reader(
            "changes.csv",
            "contract_id,action,provider_npi,tax_id\nC010,TERM,1111111111,222222222\n".as_bytes(),
        )
        .unwrap();

        let run = OverlapEngine::new(config).unwrap().run(&roster(&[]), &batch).unwrap();
        // no name columns → no name warning
        assert_eq!(run.report.rows[0].issues.join(";"), "TERM_WITHOUT_MATCH");
    }
}

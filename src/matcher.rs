// 🎯 Overlap Matcher - one record against all four roster dimensions
//
// Every dimension is evaluated; nothing short-circuits on the most specific
// match. The flags feed different reviewers (identity reuse vs exact repeat).

use crate::records::ChangeRecord;
use crate::roster_index::RosterIndex;
use serde::{Deserialize, Serialize};

// ============================================================================
// MATCH FLAGS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MatchFlags {
    pub npi_in_roster: bool,
    pub tin_in_roster: bool,
    pub npi_and_tin_in_roster: bool,
    pub npi_tin_cid_match: bool,
}

impl MatchFlags {
    /// Report column names, in output order
    pub const COLUMNS: [&'static str; 4] = [
        "NPI_IN_ROSTER",
        "TIN_IN_ROSTER",
        "NPI_AND_TIN_IN_ROSTER",
        "NPI_TIN_CID_MATCH",
    ];

    pub fn as_array(&self) -> [bool; 4] {
        [
            self.npi_in_roster,
            self.tin_in_roster,
            self.npi_and_tin_in_roster,
            self.npi_tin_cid_match,
        ]
    }

    /// Stronger matches imply weaker ones. Holds for every flag set the
    /// matcher produces; used as a debug assertion and in tests.
    pub fn is_monotone(&self) -> bool {
        (!self.npi_tin_cid_match || self.npi_and_tin_in_roster)
            && (!self.npi_and_tin_in_roster || (self.npi_in_roster && self.tin_in_roster))
    }
}

// ============================================================================
// MATCHER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapMatcher;

impl OverlapMatcher {
    pub fn new() -> Self {
        OverlapMatcher
    }

    /// Pure lookup: O(1) amortized per dimension, independent of roster size.
    pub fn match_record(&self, change: &ChangeRecord<'_>, index: &RosterIndex) -> MatchFlags {
        let flags = MatchFlags {
            npi_in_roster: index.contains_npi(&change.npi),
            tin_in_roster: index.contains_tax_id(&change.tax_id),
            npi_and_tin_in_roster: index.contains_pair(&change.npi, &change.tax_id),
            npi_tin_cid_match: index.contains_triple(
                &change.npi,
                &change.tax_id,
                &change.contract_id,
            ),
        };
        debug_assert!(flags.is_monotone());
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::KeyNormalizer;
    use crate::records::{ChangeBatch, RawRosterRecord, RosterBatch};

    fn index(rows: &[(&str, &str, &str)]) -> RosterIndex {
        let batch = RosterBatch::new(
            "roster.csv",
            rows.iter()
                .map(|(n, t, c)| RawRosterRecord::new(*n, *t, *c))
                .collect(),
        );
        RosterIndex::build(&batch, &KeyNormalizer::default()).unwrap()
    }

    fn changes(rows: &[(&str, &str, &str, &str)]) -> ChangeBatch {
        ChangeBatch::new(
            "changes.csv",
            vec![
                "contract_id".to_string(),
                "action".to_string(),
                "provider_npi".to_string(),
                "tax_id".to_string(),
            ],
            rows.iter()
                .map(|(c, a, n, t)| vec![c.to_string(), a.to_string(), n.to_string(), t.to_string()])
                .collect(),
        )
    }

    fn flags_for(index: &RosterIndex, batch: &ChangeBatch, row: usize) -> MatchFlags {
        let columns = batch.key_columns().unwrap();
        let record =
            ChangeRecord::from_row(row + 1, &batch.rows[row], &columns, &KeyNormalizer::default())
                .unwrap();
        OverlapMatcher::new().match_record(&record, index)
    }

    #[test]
    fn test_exact_triple_sets_all_flags() {
        let index = index(&[("1234567890", "123456789", "C010")]);
        let batch = changes(&[("C010", "ADD", "1234567890", "123456789")]);

        let flags = flags_for(&index, &batch, 0);
        assert_eq!(flags.as_array(), [true; 4]);
    }

    #[test]
    fn test_npi_only() {
        let index = index(&[("1234567890", "123456789", "C010")]);
        let batch = changes(&[("C010", "ADD", "1234567890", "999999999")]);

        let flags = flags_for(&index, &batch, 0);
        assert_eq!(flags.as_array(), [true, false, false, false]);
    }

    #[test]
    fn test_tin_only() {
        let index = index(&[("1234567890", "123456789", "C010")]);
        let batch = changes(&[("C010", "ADD", "9999999999", "123456789")]);

        let flags = flags_for(&index, &batch, 0);
        assert_eq!(flags.as_array(), [false, true, false, false]);
    }

    #[test]
    fn test_npi_and_tin_from_different_rows_is_not_a_pair() {
        let index = index(&[
            ("1234567890", "111111111", "C010"),
            ("5555555555", "123456789", "C010"),
        ]);
        let batch = changes(&[("C010", "ADD", "1234567890", "123456789")]);

        let flags = flags_for(&index, &batch, 0);
        assert_eq!(flags.as_array(), [true, true, false, false]);
    }

    #[test]
    fn test_pair_under_other_contract() {
        let index = index(&[("1234567890", "123456789", "C010")]);
        let batch = changes(&[("C001", "TERM", "1234567890", "123456789")]);

        let flags = flags_for(&index, &batch, 0);
        assert_eq!(flags.as_array(), [true, true, true, false]);
        assert!(flags.is_monotone());
    }

    #[test]
    fn test_is_monotone_detects_violations() {
        let bad = MatchFlags {
            npi_tin_cid_match: true,
            ..MatchFlags::default()
        };
        assert!(!bad.is_monotone());
        assert!(MatchFlags::default().is_monotone());
    }
}

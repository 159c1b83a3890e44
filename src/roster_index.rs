// 🗂️ Roster Index - four exact-key lookups over the authoritative roster
//
// Built in one pass, read-only afterwards. Safe to share across matcher
// threads without locking.

use crate::error::{OverlapError, Result};
use crate::identifier::{Identifier, KeyNormalizer};
use crate::records::{RosterBatch, RosterRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

type PairKey = (Identifier, Identifier);
type TripleKey = (Identifier, Identifier, String);

#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    by_npi: HashMap<Identifier, usize>,
    by_tax_id: HashMap<Identifier, usize>,
    by_pair: HashMap<PairKey, usize>,
    by_triple: HashMap<TripleKey, usize>,
    rows: usize,
}

/// Bucket sizes, for logging and the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IndexStats {
    pub rows: usize,
    pub unique_npis: usize,
    pub unique_tax_ids: usize,
    pub unique_pairs: usize,
    pub unique_triples: usize,
}

impl RosterIndex {
    /// Normalize every roster row and index it.
    ///
    /// The first row that fails normalization aborts the build: a partial
    /// index would turn real overlaps into false negatives.
    pub fn build(batch: &RosterBatch, normalizer: &KeyNormalizer) -> Result<Self> {
        let started = Instant::now();
        let mut index = RosterIndex::default();

        for (i, raw) in batch.records.iter().enumerate() {
            let record = raw
                .normalize(normalizer)
                .map_err(|source| OverlapError::RosterLoad {
                    position: i + 1,
                    source: Box::new(source),
                })?;
            index.insert(record);
        }

        let stats = index.stats();
        log::info!(
            "indexed roster {}: {} rows, {} NPIs, {} tax IDs",
            batch.source_name,
            stats.rows,
            stats.unique_npis,
            stats.unique_tax_ids
        );
        log::debug!(
            "roster index: {} pairs, {} triples, built in {:?}",
            stats.unique_pairs,
            stats.unique_triples,
            started.elapsed()
        );

        Ok(index)
    }

    fn insert(&mut self, record: RosterRecord) {
        let RosterRecord {
            npi,
            tax_id,
            contract_id,
        } = record;

        *self.by_npi.entry(npi.clone()).or_insert(0) += 1;
        *self.by_tax_id.entry(tax_id.clone()).or_insert(0) += 1;
        *self
            .by_pair
            .entry((npi.clone(), tax_id.clone()))
            .or_insert(0) += 1;
        *self.by_triple.entry((npi, tax_id, contract_id)).or_insert(0) += 1;
        self.rows += 1;
    }

    // ========================================================================
    // LOOKUPS (count of roster rows under each key; 0 = absent)
    // ========================================================================

    pub fn npi_count(&self, npi: &Identifier) -> usize {
        self.by_npi.get(npi).copied().unwrap_or(0)
    }

    pub fn tax_id_count(&self, tax_id: &Identifier) -> usize {
        self.by_tax_id.get(tax_id).copied().unwrap_or(0)
    }

    pub fn pair_count(&self, npi: &Identifier, tax_id: &Identifier) -> usize {
        self.by_pair
            .get(&(npi.clone(), tax_id.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn triple_count(&self, npi: &Identifier, tax_id: &Identifier, contract_id: &str) -> usize {
        self.by_triple
            .get(&(npi.clone(), tax_id.clone(), contract_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn contains_npi(&self, npi: &Identifier) -> bool {
        self.by_npi.contains_key(npi)
    }

    pub fn contains_tax_id(&self, tax_id: &Identifier) -> bool {
        self.by_tax_id.contains_key(tax_id)
    }

    pub fn contains_pair(&self, npi: &Identifier, tax_id: &Identifier) -> bool {
        self.pair_count(npi, tax_id) > 0
    }

    pub fn contains_triple(&self, npi: &Identifier, tax_id: &Identifier, contract_id: &str) -> bool {
        self.triple_count(npi, tax_id, contract_id) > 0
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            rows: self.rows,
            unique_npis: self.by_npi.len(),
            unique_tax_ids: self.by_tax_id.len(),
            unique_pairs: self.by_pair.len(),
            unique_triples: self.by_triple.len(),
        }
    }
}

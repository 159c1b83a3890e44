// ⚠️ Error taxonomy for the overlap engine
//
// Fatal vs per-record:
//   RosterLoad, MissingColumns, Io, Csv, Json, Ledger, Config → abort the run
//   CheckpointNotFound                                       → checkpoint commands only
//   InvalidIdentifier, UnknownAction on a change record      → row excluded + flagged

use crate::identifier::IdentifierKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlapError {
    /// An NPI or tax ID did not reduce to its canonical digit form.
    #[error("invalid {kind}: {raw:?} ({reason})")]
    InvalidIdentifier {
        kind: IdentifierKind,
        raw: String,
        reason: String,
    },

    /// A roster record failed normalization. Always fatal.
    #[error("roster record {position} could not be loaded: {source}")]
    RosterLoad {
        /// 1-based data row position in the roster batch
        position: usize,
        #[source]
        source: Box<OverlapError>,
    },

    /// Action column did not normalize to ADD or TERM.
    #[error("unknown action {raw:?} (expected ADD or TERM)")]
    UnknownAction { raw: String },

    #[error("{source_name} is missing required columns: {}", columns.join(", "))]
    MissingColumns {
        source_name: String,
        columns: Vec<String>,
    },

    #[error("checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),
}

impl OverlapError {
    /// Per-record errors exclude a change record without aborting the batch.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            OverlapError::InvalidIdentifier { .. } | OverlapError::UnknownAction { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OverlapError>;

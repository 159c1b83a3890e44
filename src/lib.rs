// Roster Overlap - Core Library
// Reconciles proposed ADD/TERM roster changes against the authoritative roster

pub mod error;
pub mod config;
pub mod identifier;     // Key Normalizer
pub mod records;        // Typed records + CSV loading
pub mod roster_index;   // Roster Index
pub mod matcher;        // Overlap Matcher
pub mod issues;         // Issue Detector
pub mod report;         // Report Assembler
pub mod summary;
pub mod engine;
pub mod ledger;
pub mod checkpoint;

// Re-export commonly used types
pub use error::{OverlapError, Result};
pub use config::{EngineConfig, IdentifierFormat, IdentifierFormats};
pub use identifier::{Identifier, IdentifierKind, KeyNormalizer};
pub use records::{
    Action, ChangeBatch, ChangeColumns, ChangeRecord,
    RawRosterRecord, RosterBatch, RosterRecord,
};
pub use roster_index::{IndexStats, RosterIndex};
pub use matcher::{MatchFlags, OverlapMatcher};
pub use issues::{Issue, IssueDetector, IssueSet, Severity};
pub use report::{OverlapReport, ReportAssembler, ReportRow, ISSUES_COLUMN};
pub use summary::{RecordError, RecordOutcome, RunSummary};
pub use engine::{OverlapEngine, OverlapRun};
pub use ledger::{list_runs, open_ledger, record_run, setup_ledger, RunEntry};
pub use checkpoint::{create_checkpoint, list_checkpoints, restore_checkpoint, CheckpointMetadata};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

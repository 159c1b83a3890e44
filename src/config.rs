// ⚙️ Engine configuration
// Canonical field list + identifier formats, passed explicitly into the
// normalizer and the report assembler (no module-level globals).

use crate::error::{OverlapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

// ============================================================================
// IDENTIFIER FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierFormat {
    /// Exact digit count after normalization
    pub width: usize,

    /// Left-pad short values with zeros (spreadsheets drop leading zeros)
    #[serde(default)]
    pub zero_pad: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierFormats {
    pub npi: IdentifierFormat,
    pub tax_id: IdentifierFormat,
}

impl Default for IdentifierFormats {
    fn default() -> Self {
        IdentifierFormats {
            npi: IdentifierFormat {
                width: 10,
                zero_pad: false,
            },
            tax_id: IdentifierFormat {
                width: 9,
                zero_pad: true,
            },
        }
    }
}

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Columns every change batch must carry.
pub const DEFAULT_REQUIRED_FIELDS: [&str; 7] = [
    "contract_id",
    "action",
    "effective_date",
    "provider_npi",
    "tax_id",
    "first_name",
    "last_name",
];

/// Columns the roster batch must carry.
pub const ROSTER_KEY_FIELDS: [&str; 3] = ["provider_npi", "tax_id", "contract_id"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub required_fields: BTreeSet<String>,
    pub identifier_formats: IdentifierFormats,

    /// Joins issue tags in the ISSUES column
    pub issue_separator: String,

    /// Match change records on the rayon pool
    pub parallel: bool,
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig {
            required_fields: DEFAULT_REQUIRED_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            identifier_formats: IdentifierFormats::default(),
            issue_separator: ";".to_string(),
            parallel: true,
        }
    }

    /// Builder: run the matcher on the current thread only
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn with_required_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Load from a JSON file; absent keys fall back to defaults.
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let formats = [
            ("npi", self.identifier_formats.npi),
            ("tax_id", self.identifier_formats.tax_id),
        ];
        for (name, format) in formats {
            if format.width == 0 {
                return Err(OverlapError::Config(format!(
                    "identifier_formats.{} width must be positive",
                    name
                )));
            }
        }
        if self.issue_separator.is_empty() {
            return Err(OverlapError::Config(
                "issue_separator must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

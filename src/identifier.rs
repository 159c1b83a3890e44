// 🔑 Key Normalizer - canonical NPI / tax ID form
//
// Roster and change records MUST go through the same normalizer instance:
// matching is plain string equality on the output.

use crate::config::{IdentifierFormat, IdentifierFormats};
use crate::error::{OverlapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierKind {
    Npi,
    TaxId,
}

impl IdentifierKind {
    /// Report column the raw value is read from
    pub fn column(&self) -> &'static str {
        match self {
            IdentifierKind::Npi => "provider_npi",
            IdentifierKind::TaxId => "tax_id",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Npi => write!(f, "NPI"),
            IdentifierKind::TaxId => write!(f, "tax ID"),
        }
    }
}

/// Digits-only, fixed-width identifier. Only `KeyNormalizer` builds these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyNormalizer {
    formats: IdentifierFormats,
}

impl KeyNormalizer {
    pub fn new(formats: IdentifierFormats) -> Self {
        KeyNormalizer { formats }
    }

    pub fn format(&self, kind: IdentifierKind) -> IdentifierFormat {
        match kind {
            IdentifierKind::Npi => self.formats.npi,
            IdentifierKind::TaxId => self.formats.tax_id,
        }
    }

    /// Canonicalize a raw NPI or tax ID.
    ///
    /// Whitespace and punctuation (`-`, `.`, `/`, …) are stripped. A spreadsheet
    /// float rendering such as `1234567890.0` loses its zero fraction first.
    /// Letters are rejected outright rather than silently dropped.
    ///
    /// ```
    /// use roster_overlap::{IdentifierKind, KeyNormalizer};
    ///
    /// let normalizer = KeyNormalizer::default();
    /// let tin = normalizer.normalize(" 12-3456789 ", IdentifierKind::TaxId).unwrap();
    /// assert_eq!(tin.as_str(), "123456789");
    /// ```
    pub fn normalize(&self, raw: &str, kind: IdentifierKind) -> Result<Identifier> {
        let invalid = |reason: String| OverlapError::InvalidIdentifier {
            kind,
            raw: raw.to_string(),
            reason,
        };

        let trimmed = strip_zero_fraction(raw.trim());

        if trimmed.chars().any(|c| c.is_alphabetic()) {
            return Err(invalid("contains non-numeric characters".to_string()));
        }

        if decimal_parts(trimmed).is_some() {
            return Err(invalid("has a fractional part".to_string()));
        }

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(invalid("no digits".to_string()));
        }

        let format = self.format(kind);
        if digits.len() > format.width
            || (digits.len() < format.width && !format.zero_pad)
        {
            return Err(invalid(format!(
                "expected {} digits, got {}",
                format.width,
                digits.len()
            )));
        }

        Ok(Identifier(format!("{:0>width$}", digits, width = format.width)))
    }
}

/// `"1234567.0"` → `"1234567"`; anything else passes through untouched.
fn strip_zero_fraction(s: &str) -> &str {
    match decimal_parts(s) {
        Some((int, frac)) if frac.chars().all(|c| c == '0') => int,
        _ => s,
    }
}

/// Splits `digits.digits`; `None` for anything else (`12-34.56-78` included).
fn decimal_parts(s: &str) -> Option<(&str, &str)> {
    let (int, frac) = s.split_once('.')?;
    let all_digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
    (all_digits(int) && all_digits(frac)).then_some((int, frac))
}

//! Per-column text normalization: case folding, whitespace trimming, and
//! punctuation deletion. Numeric columns pass through untouched.

use crate::dataset::{Column, ColumnKind};
use crate::error::BackcheckError;
use crate::model::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFold {
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub case: Option<CaseFold>,
    pub trim: bool,
    pub strip_symbols: bool,
}

impl NormalizeOptions {
    /// Build from the four config flags. `lower` and `upper` are exclusive.
    pub fn from_flags(
        lower: bool,
        upper: bool,
        trim: bool,
        nosymbol: bool,
    ) -> Result<Self, BackcheckError> {
        let case = match (lower, upper) {
            (true, true) => {
                return Err(BackcheckError::Configuration(
                    "lower and upper are mutually exclusive".into(),
                ))
            }
            (true, false) => Some(CaseFold::Lower),
            (false, true) => Some(CaseFold::Upper),
            (false, false) => None,
        };
        Ok(Self {
            case,
            trim,
            strip_symbols: nosymbol,
        })
    }

    pub fn is_noop(&self) -> bool {
        self.case.is_none() && !self.trim && !self.strip_symbols
    }
}

/// Trim both ends and collapse internal whitespace runs to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Delete ASCII punctuation. Nothing is inserted in its place.
pub fn strip_symbols(s: &str) -> String {
    s.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Apply case fold, trim, then symbol deletion.
pub fn normalize_text(s: &str, opts: &NormalizeOptions) -> String {
    let mut out = match opts.case {
        Some(CaseFold::Lower) => s.to_lowercase(),
        Some(CaseFold::Upper) => s.to_uppercase(),
        None => s.to_string(),
    };
    if opts.trim {
        out = collapse_whitespace(&out);
    }
    if opts.strip_symbols {
        out = strip_symbols(&out);
        // "a - b" must not leave a double space behind when trimming is on
        if opts.trim {
            out = collapse_whitespace(&out);
        }
    }
    out
}

/// Normalize one column. Text that normalizes to nothing becomes missing.
pub fn normalize_column(column: &Column, opts: &NormalizeOptions) -> Column {
    if column.kind != ColumnKind::Text || opts.is_noop() {
        return column.clone();
    }

    let values = column
        .values
        .iter()
        .map(|v| match v {
            Value::Text(s) => {
                let normalized = normalize_text(s, opts);
                if normalized.trim().is_empty() {
                    Value::Missing
                } else {
                    Value::Text(normalized)
                }
            }
            other => other.clone(),
        })
        .collect();

    Column {
        name: column.name.clone(),
        kind: column.kind,
        values,
    }
}

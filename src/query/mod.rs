//! FASTA query validation.
//!
//! Everything here is pure: no filesystem, no processes. A [`Query`] can only
//! be built through [`validate`] or [`validate_bytes`], so holding one means
//! the text is non-empty, within the size ceiling, and starts with a header.

use crate::consts::HEADER_MARKER;

/// Why a submitted query was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no FASTA provided")]
    Empty,
    #[error("FASTA too large: {len} characters (max {max})")]
    TooLarge { len: usize, max: usize },
    #[error("FASTA must start with a '>' header line")]
    MalformedFormat,
    #[error("uploaded file is not UTF-8 text")]
    Encoding,
}

/// A validated FASTA query, trimmed of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    chars: usize,
}

impl Query {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.chars
    }

    /// Never true for a validated query.
    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    /// Number of FASTA records (header lines).
    pub fn record_count(&self) -> usize {
        self.text
            .lines()
            .filter(|line| line.trim_start().starts_with(HEADER_MARKER))
            .count()
    }
}

/// Validate pasted text against the size ceiling (`max_chars`).
pub fn validate(raw: &str, max_chars: usize) -> Result<Query, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }

    let chars = text.chars().count();
    if chars > max_chars {
        return Err(ValidationError::TooLarge {
            len: chars,
            max: max_chars,
        });
    }

    if !text.starts_with(HEADER_MARKER) {
        return Err(ValidationError::MalformedFormat);
    }

    Ok(Query {
        text: text.to_string(),
        chars,
    })
}

/// Validate uploaded file bytes. They must decode as strict UTF-8.
pub fn validate_bytes(raw: &[u8], max_chars: usize) -> Result<Query, ValidationError> {
    let text = std::str::from_utf8(raw).map_err(|_| ValidationError::Encoding)?;
    validate(text, max_chars)
}

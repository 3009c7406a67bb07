//! Typed grant serial numbers.
//!
//! A full grant identifier looks like `LCC-ABC-KA-0125-0001-003`:
//! a base serial (`LCC-ABC-KA-0125-0001`, whose own last segment is a
//! 4-digit sequence) plus an optional 3-digit workplan suffix. The
//! system stores the two parts as separate fields; formatting is
//! one-way. [`GrantSerial::parse`] exists only to import legacy
//! single-string serials, where the 3-vs-4-digit width of the trailing
//! segment is the recorded convention for telling a workplan suffix
//! apart from the base's own sequence.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SerialError {
    #[error("empty serial string")]
    Empty,
    #[error("workplan suffix {0} out of range (1..=999)")]
    SuffixOutOfRange(i64),
}

/// A grant serial split into its base pattern and optional
/// workplan-within-serial suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSerial {
    pub base: String,
    pub suffix: Option<u16>,
}

impl GrantSerial {
    /// A bare base serial with no workplan suffix.
    pub fn base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            suffix: None,
        }
    }

    /// A full serial with a minted workplan suffix.
    pub fn with_suffix(base: impl Into<String>, suffix: i64) -> Result<Self, SerialError> {
        if !(1..=999).contains(&suffix) {
            return Err(SerialError::SuffixOutOfRange(suffix));
        }
        Ok(Self {
            base: base.into(),
            suffix: Some(suffix as u16),
        })
    }

    /// Import a legacy formatted serial string.
    ///
    /// A trailing segment of exactly 3 digits is a workplan suffix and
    /// is split off; a trailing segment of exactly 4 digits is the base
    /// serial's own sequence and stays put. Any other shape is treated
    /// as part of the base.
    pub fn parse(s: &str) -> Result<Self, SerialError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SerialError::Empty);
        }
        if let Some((head, tail)) = s.rsplit_once('-') {
            if tail.len() == 3 && tail.bytes().all(|b| b.is_ascii_digit()) && !head.is_empty() {
                // Suffix "000" was never minted; fold it back into the base.
                let n: u16 = tail.parse().unwrap_or(0);
                if n > 0 {
                    return Ok(Self {
                        base: head.to_string(),
                        suffix: Some(n),
                    });
                }
            }
        }
        Ok(Self::base(s))
    }
}

impl fmt::Display for GrantSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suffix {
            Some(n) => write!(f, "{}-{:03}", self.base, n),
            None => f.write_str(&self.base),
        }
    }
}
